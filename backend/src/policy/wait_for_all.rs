//! Wait-For-All Policy
//!
//! Stays silent until every RFQ sent for a transaction has been answered by a
//! quote, then decides.
//!
//! # Behavior
//!
//! - Counts received quotes against sent RFQs on every arriving quote
//! - Never schedules a timer; a silent supplier means the transaction is left
//!   to the store's expiry rules

use super::{all_quotes_in, Decision, PolicyContext, QuoteDecider, QuotePolicy, SelectorConfig};
use crate::models::message::TradeMessage;

#[derive(Debug, Clone, Default)]
pub struct WaitForAllPolicy {
    decider: QuoteDecider,
}

impl WaitForAllPolicy {
    pub fn new(selector: SelectorConfig) -> Self {
        Self {
            decider: QuoteDecider::new(selector),
        }
    }
}

impl QuotePolicy for WaitForAllPolicy {
    fn on_quote(&mut self, quote: &TradeMessage, ctx: &mut PolicyContext<'_>) -> Decision {
        let demand_id = quote.internal_demand_id();
        if self.decider.is_decided(demand_id) {
            return Decision::AlreadyDecided;
        }
        if !all_quotes_in(ctx.store, demand_id) {
            return Decision::Waiting;
        }
        self.decider.decide(demand_id, ctx)
    }

    fn on_decide_timer(&mut self, demand_id: &str, ctx: &mut PolicyContext<'_>) -> Decision {
        self.decider.decide(demand_id, ctx)
    }

    fn name(&self) -> &'static str {
        "wait_for_all"
    }

    fn decider(&self) -> &QuoteDecider {
        &self.decider
    }

    fn decider_mut(&mut self) -> &mut QuoteDecider {
        &mut self.decider
    }
}
