//! Wait-For-Deadline Policy
//!
//! The first quote of a transaction arms a decide timer at
//! `max(now, rfq.cutoff_tick)`. Whichever comes first, the timer or the last
//! outstanding quote, triggers the decision; the other trigger is then a
//! no-op.
//!
//! # Use Case
//!
//! - Buyers that cannot wait on suppliers who may never answer
//! - Deterministic decision tick (the cutoff) regardless of arrival order

use super::{all_quotes_in, Decision, PolicyContext, QuoteDecider, QuotePolicy, SelectorConfig};
use crate::core::scheduler::{Timer, TimerHandle};
use crate::core::time::Tick;
use crate::models::message::{Direction, LogicalKind, TradeMessage};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct WaitForDeadlinePolicy {
    decider: QuoteDecider,
    /// Armed decide timers by transaction
    pending: BTreeMap<String, TimerHandle>,
}

impl WaitForDeadlinePolicy {
    pub fn new(selector: SelectorConfig) -> Self {
        Self {
            decider: QuoteDecider::new(selector),
            pending: BTreeMap::new(),
        }
    }

    /// Tick of the armed decide timer for a transaction
    pub fn pending_deadline(&self, demand_id: &str) -> Option<Tick> {
        self.pending.get(demand_id).map(|h| h.tick())
    }

    fn arm(&mut self, demand_id: &str, quote: &TradeMessage, ctx: &mut PolicyContext<'_>) {
        let cutoff = ctx
            .store
            .predecessor_of(quote)
            .and_then(|rfq| rfq.rfq_terms())
            .map(|rfq| rfq.cutoff_tick)
            .unwrap_or(ctx.now);
        let deadline = cutoff.max(ctx.now);

        let handle = ctx.scheduler.schedule_at(
            deadline,
            Timer::Decide {
                demand_id: demand_id.to_string(),
            },
        );
        debug!(demand = demand_id, deadline, "decide timer armed");
        self.pending.insert(demand_id.to_string(), handle);
    }
}

impl QuotePolicy for WaitForDeadlinePolicy {
    fn on_quote(&mut self, quote: &TradeMessage, ctx: &mut PolicyContext<'_>) -> Decision {
        let demand_id = quote.internal_demand_id();
        if self.decider.is_decided(demand_id) {
            return Decision::AlreadyDecided;
        }

        if all_quotes_in(ctx.store, demand_id) {
            if let Some(handle) = self.pending.remove(demand_id) {
                ctx.scheduler.cancel(handle);
            }
            return self.decider.decide(demand_id, ctx);
        }

        if !self.pending.contains_key(demand_id) {
            self.arm(demand_id, quote, ctx);
        }
        Decision::Waiting
    }

    fn on_decide_timer(&mut self, demand_id: &str, ctx: &mut PolicyContext<'_>) -> Decision {
        self.pending.remove(demand_id);
        self.decider.decide(demand_id, ctx)
    }

    /// Re-arm a decide timer for every undecided transaction holding quotes
    fn rearm(&mut self, ctx: &mut PolicyContext<'_>) {
        let waiting: Vec<TradeMessage> = ctx
            .store
            .ledger()
            .transaction_ids()
            .filter(|id| !self.decider.is_decided(id))
            .filter_map(|id| {
                ctx.store
                    .query(id, LogicalKind::Quote, Some(Direction::Received))
                    .first()
                    .map(|q| (*q).clone())
            })
            .collect();

        self.pending.clear();
        for quote in waiting {
            let demand_id = quote.internal_demand_id().to_string();
            self.arm(&demand_id, &quote, ctx);
        }
    }

    fn name(&self) -> &'static str {
        "wait_for_deadline"
    }

    fn decider(&self) -> &QuoteDecider {
        &self.decider
    }

    fn decider_mut(&mut self) -> &mut QuoteDecider {
        &mut self.decider
    }
}
