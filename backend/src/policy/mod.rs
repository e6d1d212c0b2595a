//! Quote Policy Module
//!
//! Decides when a buyer has heard enough quotes for a transaction and which
//! one to turn into an order.
//!
//! # Overview
//!
//! Both policies are driven by arriving quotes and share one [`QuoteDecider`],
//! whose `decide` routine runs at most once per transaction:
//!
//! ```text
//! WAITING ──(all quotes in | decide timer fired)──► DECIDED (order | no quote)
//! ```
//!
//! 1. **WaitForAll**: decide once every sent RFQ has a received quote
//! 2. **WaitForDeadline**: on the first quote, schedule a decide timer at the
//!    RFQ cutoff; decide early if every quote arrives before it
//!
//! Policies never send anything themselves. A chosen quote comes back as
//! [`Decision::Order`] and the owning agent performs the send.
//!
//! # Example
//!
//! ```rust
//! use trade_negotiation_core_rs::policy::{create_policy, QuotePolicyConfig, SelectorConfig};
//!
//! let policy = create_policy(&QuotePolicyConfig::WaitForDeadline {
//!     selector: SelectorConfig::default(),
//! });
//! assert_eq!(policy.name(), "wait_for_deadline");
//! ```

pub mod selector;
pub mod wait_for_all;
pub mod wait_for_deadline;

pub use selector::{
    CriteriaOrder, Criterion, Location, MarketDirectory, MarketView, QuoteCandidate,
    QuoteSelector, RejectReason, SelectorConfig,
};
pub use wait_for_all::WaitForAllPolicy;
pub use wait_for_deadline::WaitForDeadlinePolicy;

use crate::core::scheduler::Scheduler;
use crate::core::time::Tick;
use crate::models::event::Event;
use crate::models::message::{Direction, LogicalKind, MessageBody, OrderTerms, TradeMessage};
use crate::store::MessageStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Everything a policy may touch while handling one callback
pub struct PolicyContext<'a> {
    pub store: &'a mut MessageStore,
    pub scheduler: &'a mut dyn Scheduler,
    pub market: &'a dyn MarketView,
    pub owner_location: Location,
    pub now: Tick,
}

/// Outcome of feeding a quote or timer to a policy
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Not enough information yet
    Waiting,

    /// Quote chosen; the order must be sent by the owner
    Order(TradeMessage),

    /// Nothing passed screening; the transaction is left to expire
    NoValidQuote,

    /// Transaction was decided earlier
    AlreadyDecided,
}

/// Shared once-per-transaction decision routine
#[derive(Debug, Clone, Default)]
pub struct QuoteDecider {
    selector: QuoteSelector,
    decided: BTreeSet<String>,
}

impl QuoteDecider {
    pub fn new(selector: SelectorConfig) -> Self {
        Self {
            selector: QuoteSelector::new(selector),
            decided: BTreeSet::new(),
        }
    }

    pub fn selector(&self) -> &QuoteSelector {
        &self.selector
    }

    pub fn is_decided(&self, demand_id: &str) -> bool {
        self.decided.contains(demand_id)
    }

    /// Transactions decided so far, in sorted order
    pub fn decided(&self) -> impl Iterator<Item = &str> {
        self.decided.iter().map(|s| s.as_str())
    }

    /// Mark a transaction decided without running selection (restore path)
    pub fn mark_decided(&mut self, demand_id: String) {
        self.decided.insert(demand_id);
    }

    /// Pick the best received quote and build the order for it
    ///
    /// Runs selection at most once per transaction. Later calls return
    /// [`Decision::AlreadyDecided`].
    pub fn decide(&mut self, demand_id: &str, ctx: &mut PolicyContext<'_>) -> Decision {
        if !self.decided.insert(demand_id.to_string()) {
            return Decision::AlreadyDecided;
        }

        let owner = ctx.store.owner_id().to_string();
        let quotes = ctx
            .store
            .query(demand_id, LogicalKind::Quote, Some(Direction::Received));
        let candidates: Vec<QuoteCandidate<'_>> = quotes
            .into_iter()
            .filter_map(|quote| {
                let rfq = ctx.store.predecessor_of(quote)?;
                Some(QuoteCandidate { quote, rfq })
            })
            .collect();
        let considered = candidates.len();

        let chosen = self
            .selector
            .select_best(candidates, ctx.owner_location, ctx.now, ctx.market)
            .map(|c| c.quote.clone());

        let Some(quote) = chosen else {
            warn!(agent = %owner, demand = demand_id, considered, "no valid quote found");
            ctx.store.log_event(Event::NoValidQuote {
                tick: ctx.now,
                agent_id: owner,
                demand_id: demand_id.to_string(),
                quotes_considered: considered,
            });
            return Decision::NoValidQuote;
        };

        let Some(terms) = quote.quote_terms() else {
            return Decision::NoValidQuote;
        };
        let body = MessageBody::OrderBasedOnQuote(OrderTerms {
            product_id: terms.product_id.clone(),
            amount: terms.amount,
            price: terms.price,
            delivery_tick: terms.proposed_delivery_tick,
        });
        let price = terms.price;

        let order = match TradeMessage::reply(
            &quote,
            owner.clone(),
            quote.sender_id().to_string(),
            ctx.now,
            body,
        ) {
            Ok(order) => order,
            Err(err) => {
                warn!(agent = %owner, demand = demand_id, %err, "could not build order");
                return Decision::NoValidQuote;
            }
        };

        info!(
            agent = %owner,
            demand = demand_id,
            supplier = quote.sender_id(),
            price,
            considered,
            "quote selected"
        );
        ctx.store.log_event(Event::QuoteSelected {
            tick: ctx.now,
            agent_id: owner.clone(),
            demand_id: demand_id.to_string(),
            quote_id: quote.id().to_string(),
            supplier_id: quote.sender_id().to_string(),
            price,
            candidates: considered,
        });
        ctx.store.log_event(Event::OrderEmitted {
            tick: ctx.now,
            agent_id: owner,
            demand_id: demand_id.to_string(),
            order_id: order.id().to_string(),
            quote_id: quote.id().to_string(),
            supplier_id: quote.sender_id().to_string(),
        });

        Decision::Order(order)
    }
}

/// True once every RFQ sent for the transaction has a received quote
pub fn all_quotes_in(store: &MessageStore, demand_id: &str) -> bool {
    let ledger = store.ledger();
    let sent = ledger.count(demand_id, LogicalKind::RequestForQuote, Some(Direction::Sent));
    let received = ledger.count(demand_id, LogicalKind::Quote, Some(Direction::Received));
    sent > 0 && received >= sent
}

/// Buyer-side quote handling
///
/// Implementations must route every decision through their
/// [`QuoteDecider`] so a transaction is decided at most once.
pub trait QuotePolicy: Send {
    /// Called after a received quote has been recorded in the store
    fn on_quote(&mut self, quote: &TradeMessage, ctx: &mut PolicyContext<'_>) -> Decision;

    /// Called when a previously scheduled decide timer fires
    fn on_decide_timer(&mut self, demand_id: &str, ctx: &mut PolicyContext<'_>) -> Decision;

    /// Schedule any timers the policy lost across a snapshot restore
    fn rearm(&mut self, _ctx: &mut PolicyContext<'_>) {}

    fn name(&self) -> &'static str;

    fn decider(&self) -> &QuoteDecider;

    fn decider_mut(&mut self) -> &mut QuoteDecider;
}

/// Policy selection for a buyer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuotePolicyConfig {
    /// Decide only once every RFQ has been answered
    WaitForAll {
        #[serde(default)]
        selector: SelectorConfig,
    },

    /// Decide at the RFQ cutoff after the first quote, or earlier if all are in
    WaitForDeadline {
        #[serde(default)]
        selector: SelectorConfig,
    },
}

impl Default for QuotePolicyConfig {
    fn default() -> Self {
        QuotePolicyConfig::WaitForDeadline {
            selector: SelectorConfig::default(),
        }
    }
}

/// Build the policy described by `config`
pub fn create_policy(config: &QuotePolicyConfig) -> Box<dyn QuotePolicy> {
    match config {
        QuotePolicyConfig::WaitForAll { selector } => {
            Box::new(WaitForAllPolicy::new(selector.clone()))
        }
        QuotePolicyConfig::WaitForDeadline { selector } => {
            Box::new(WaitForDeadlinePolicy::new(selector.clone()))
        }
    }
}
