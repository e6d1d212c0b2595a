//! Expiry rules
//!
//! Each logical kind maps to an [`ExpiryRule`] that says (a) when an
//! unanswered message of that kind should leave the live index and (b) what
//! else leaves with it when the deadline fires.
//!
//! | Kind            | Deadline                                                   | Cascade on fire            |
//! |-----------------|------------------------------------------------------------|----------------------------|
//! | InternalDemand  | `latest_delivery`                                          | root only; purge if idle   |
//! | RequestForQuote | received: `cutoff`; sent: `cutoff + grace`                 | RFQ only                   |
//! | Quote           | `proposed_delivery`, `rfq.cutoff + grace`, `rfq.latest`    | Quote and its RFQ          |
//! | Order           | `delivery`, `quote.proposed_delivery`, `rfq.latest`        | Order and its Quote        |
//! | everything else | no timer                                                   | -                          |
//!
//! Every deadline is clamped to the current tick, so a deadline is never in
//! the past when it is scheduled. Formula terms that depend on a predecessor
//! the ledger does not hold are skipped.

use crate::core::time::Tick;
use crate::models::message::{Direction, LogicalKind, TradeMessage};
use crate::store::ledger::TransactionLedger;
use serde::{Deserialize, Serialize};

/// Expiry tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// Grace period granted to the other side (one simulated day)
    pub grace_ticks: Tick,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self { grace_ticks: 24 }
    }
}

/// Timeout behavior of one logical kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryRule {
    /// No independent timer; removed only by answers or purges
    Untimed,
    /// Transaction root: firing ends the transaction
    Root,
    /// Timed message; firing also removes `cascade` predecessors up the chain
    Timed { cascade: usize },
}

impl ExpiryRule {
    pub const fn for_kind(kind: LogicalKind) -> Self {
        match kind {
            LogicalKind::InternalDemand => ExpiryRule::Root,
            LogicalKind::RequestForQuote => ExpiryRule::Timed { cascade: 0 },
            LogicalKind::Quote => ExpiryRule::Timed { cascade: 1 },
            LogicalKind::Order => ExpiryRule::Timed { cascade: 1 },
            LogicalKind::OrderConfirmation
            | LogicalKind::Shipment
            | LogicalKind::Bill
            | LogicalKind::Payment
            | LogicalKind::YellowPageRequest
            | LogicalKind::YellowPageAnswer
            | LogicalKind::ProductionOrder => ExpiryRule::Untimed,
        }
    }

    /// Number of predecessors removed together with the expired message
    pub fn cascade_depth(&self) -> usize {
        match self {
            ExpiryRule::Timed { cascade } => *cascade,
            ExpiryRule::Untimed | ExpiryRule::Root => 0,
        }
    }
}

/// Computes deadlines for freshly recorded messages
#[derive(Debug, Clone, Default)]
pub struct ExpiryPolicy {
    config: ExpiryConfig,
}

impl ExpiryPolicy {
    pub fn new(config: ExpiryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExpiryConfig {
        &self.config
    }

    /// Deadline at which `message` should be purged if still unanswered
    ///
    /// Returns `None` for kinds without an independent timer. The result is
    /// always `>= now`.
    pub fn deadline(
        &self,
        message: &TradeMessage,
        direction: Direction,
        now: Tick,
        ledger: &TransactionLedger,
    ) -> Option<Tick> {
        let grace = self.config.grace_ticks;

        let raw = match ExpiryRule::for_kind(message.logical_kind()) {
            ExpiryRule::Untimed => return None,
            ExpiryRule::Root => message.demand_terms()?.latest_delivery_tick,
            ExpiryRule::Timed { .. } => match message.logical_kind() {
                LogicalKind::RequestForQuote => {
                    let rfq = message.rfq_terms()?;
                    match direction {
                        Direction::Received => rfq.cutoff_tick,
                        Direction::Sent => rfq.cutoff_tick.saturating_add(grace),
                    }
                }
                LogicalKind::Quote => {
                    let quote = message.quote_terms()?;
                    let mut deadline = quote.proposed_delivery_tick;
                    if let Some(rfq) = predecessor(message, ledger).and_then(|m| m.rfq_terms()) {
                        deadline = deadline
                            .max(rfq.cutoff_tick.saturating_add(grace))
                            .max(rfq.latest_delivery_tick);
                    }
                    deadline
                }
                LogicalKind::Order => {
                    let order = message.order_terms()?;
                    let mut deadline = order.delivery_tick;
                    let quote = predecessor(message, ledger).filter(|m| m.quote_terms().is_some());
                    if let Some(quote) = quote {
                        if let Some(terms) = quote.quote_terms() {
                            deadline = deadline.max(terms.proposed_delivery_tick);
                        }
                        if let Some(rfq) = predecessor(quote, ledger).and_then(|m| m.rfq_terms()) {
                            deadline = deadline.max(rfq.latest_delivery_tick);
                        }
                    }
                    deadline
                }
                _ => return None,
            },
        };

        Some(raw.max(now))
    }
}

fn predecessor<'a>(message: &TradeMessage, ledger: &'a TransactionLedger) -> Option<&'a TradeMessage> {
    let id = message.predecessor_id()?;
    ledger
        .find(message.internal_demand_id(), id)
        .map(|entry| &entry.message)
}
