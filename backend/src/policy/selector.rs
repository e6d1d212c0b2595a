//! Quote Selector
//!
//! Screens competing quotes for one transaction and ranks the survivors.
//!
//! # Filters
//!
//! A quote is a candidate only if all of these hold:
//! 1. `validity_tick > now`
//! 2. `amount > 0`
//! 3. `(price / amount) / unit_market_price <= 1 + max_price_margin`
//! 4. `amount <= requested` and `requested / amount <= 1 + min_amount_margin`
//! 5. `proposed_delivery_tick <= rfq.latest_delivery_tick`
//!
//! # Ranking
//!
//! Candidates are ordered lexicographically over price, proposed delivery
//! tick and distance from the buyer, in one of six fixed key orders
//! ([`CriteriaOrder`]). The minimal candidate wins; on a full tie the first
//! one offered wins.

use crate::core::time::Tick;
use crate::models::message::TradeMessage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Position on the simulation map
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance_to(&self, other: &Location) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Read-only market knowledge the selector needs
pub trait MarketView {
    /// Location of an agent, if known
    fn location_of(&self, agent_id: &str) -> Option<Location>;

    /// Reference market price of one unit of a product (cents)
    fn unit_market_price(&self, product_id: &str) -> Option<f64>;
}

/// In-memory [`MarketView`]
#[derive(Debug, Clone, Default)]
pub struct MarketDirectory {
    locations: HashMap<String, Location>,
    prices: HashMap<String, f64>,
}

impl MarketDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, agent_id: impl Into<String>, location: Location) -> Self {
        self.set_location(agent_id, location);
        self
    }

    pub fn with_price(mut self, product_id: impl Into<String>, unit_price: f64) -> Self {
        self.set_price(product_id, unit_price);
        self
    }

    pub fn set_location(&mut self, agent_id: impl Into<String>, location: Location) {
        self.locations.insert(agent_id.into(), location);
    }

    pub fn set_price(&mut self, product_id: impl Into<String>, unit_price: f64) {
        self.prices.insert(product_id.into(), unit_price);
    }
}

impl MarketView for MarketDirectory {
    fn location_of(&self, agent_id: &str) -> Option<Location> {
        self.locations.get(agent_id).copied()
    }

    fn unit_market_price(&self, product_id: &str) -> Option<f64> {
        self.prices.get(product_id).copied()
    }
}

/// One ranking key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Price,
    DeliveryDate,
    Distance,
}

/// Order in which ranking keys are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaOrder {
    #[default]
    PriceDateDistance,
    PriceDistanceDate,
    DatePriceDistance,
    DateDistancePrice,
    DistancePriceDate,
    DistanceDatePrice,
}

impl CriteriaOrder {
    pub const ALL: [CriteriaOrder; 6] = [
        CriteriaOrder::PriceDateDistance,
        CriteriaOrder::PriceDistanceDate,
        CriteriaOrder::DatePriceDistance,
        CriteriaOrder::DateDistancePrice,
        CriteriaOrder::DistancePriceDate,
        CriteriaOrder::DistanceDatePrice,
    ];

    pub const fn keys(self) -> [Criterion; 3] {
        use Criterion::*;
        match self {
            CriteriaOrder::PriceDateDistance => [Price, DeliveryDate, Distance],
            CriteriaOrder::PriceDistanceDate => [Price, Distance, DeliveryDate],
            CriteriaOrder::DatePriceDistance => [DeliveryDate, Price, Distance],
            CriteriaOrder::DateDistancePrice => [DeliveryDate, Distance, Price],
            CriteriaOrder::DistancePriceDate => [Distance, Price, DeliveryDate],
            CriteriaOrder::DistanceDatePrice => [Distance, DeliveryDate, Price],
        }
    }
}

/// Selector tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Accept unit prices up to `(1 + margin)` times the market price
    pub max_price_margin: f64,

    /// Accept partial amounts down to `requested / (1 + margin)`
    pub min_amount_margin: f64,

    pub criteria: CriteriaOrder,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_price_margin: 0.2,
            min_amount_margin: 0.0,
            criteria: CriteriaOrder::default(),
        }
    }
}

/// Why a quote failed screening
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Message is not a quote answering an RFQ
    Malformed,
    Expired { validity_tick: Tick },
    ZeroAmount,
    UnknownMarketPrice { product_id: String },
    TooExpensive { price_ratio: f64 },
    AmountMismatch { offered: u64, requested: u64 },
    LateDelivery { proposed: Tick, latest: Tick },
}

/// A received quote paired with the RFQ it answers
#[derive(Debug, Clone, Copy)]
pub struct QuoteCandidate<'a> {
    pub quote: &'a TradeMessage,
    pub rfq: &'a TradeMessage,
}

/// Screens and ranks quotes
#[derive(Debug, Clone, Default)]
pub struct QuoteSelector {
    config: SelectorConfig,
}

impl QuoteSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Check a candidate against every filter
    pub fn screen(
        &self,
        candidate: &QuoteCandidate<'_>,
        now: Tick,
        market: &dyn MarketView,
    ) -> Result<(), RejectReason> {
        let (Some(quote), Some(rfq)) = (candidate.quote.quote_terms(), candidate.rfq.rfq_terms())
        else {
            return Err(RejectReason::Malformed);
        };

        if quote.validity_tick <= now {
            return Err(RejectReason::Expired {
                validity_tick: quote.validity_tick,
            });
        }

        if quote.amount == 0 {
            return Err(RejectReason::ZeroAmount);
        }

        let Some(market_price) = market.unit_market_price(&quote.product_id) else {
            return Err(RejectReason::UnknownMarketPrice {
                product_id: quote.product_id.clone(),
            });
        };
        let price_ratio = (quote.price as f64 / quote.amount as f64) / market_price;
        if price_ratio.is_nan() || price_ratio > 1.0 + self.config.max_price_margin {
            return Err(RejectReason::TooExpensive { price_ratio });
        }

        let amount_ratio = rfq.amount as f64 / quote.amount as f64;
        if quote.amount > rfq.amount || amount_ratio > 1.0 + self.config.min_amount_margin {
            return Err(RejectReason::AmountMismatch {
                offered: quote.amount,
                requested: rfq.amount,
            });
        }

        if quote.proposed_delivery_tick > rfq.latest_delivery_tick {
            return Err(RejectReason::LateDelivery {
                proposed: quote.proposed_delivery_tick,
                latest: rfq.latest_delivery_tick,
            });
        }

        Ok(())
    }

    /// Best candidate under the configured criteria order
    ///
    /// Returns `None` when no candidate passes screening.
    pub fn select_best<'a, I>(
        &self,
        candidates: I,
        owner_location: Location,
        now: Tick,
        market: &dyn MarketView,
    ) -> Option<QuoteCandidate<'a>>
    where
        I: IntoIterator<Item = QuoteCandidate<'a>>,
    {
        let keys = self.config.criteria.keys();

        candidates
            .into_iter()
            .filter(|c| self.screen(c, now, market).is_ok())
            .map(|c| (ranking(&c, owner_location, market), c))
            .min_by(|(a, _), (b, _)| compare(a, b, &keys))
            .map(|(_, c)| c)
    }
}

struct Ranking {
    price: i64,
    delivery: Tick,
    distance: f64,
}

fn ranking(candidate: &QuoteCandidate<'_>, owner: Location, market: &dyn MarketView) -> Ranking {
    let (price, delivery) = candidate
        .quote
        .quote_terms()
        .map(|q| (q.price, q.proposed_delivery_tick))
        .unwrap_or((i64::MAX, Tick::MAX));

    // Unknown senders sort last on distance
    let distance = market
        .location_of(candidate.quote.sender_id())
        .map(|loc| owner.distance_to(&loc))
        .unwrap_or(f64::INFINITY);

    Ranking {
        price,
        delivery,
        distance,
    }
}

fn compare(a: &Ranking, b: &Ranking, keys: &[Criterion; 3]) -> Ordering {
    keys.iter()
        .map(|key| match key {
            Criterion::Price => a.price.cmp(&b.price),
            Criterion::DeliveryDate => a.delivery.cmp(&b.delivery),
            Criterion::Distance => a.distance.total_cmp(&b.distance),
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
