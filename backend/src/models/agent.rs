//! Agent model
//!
//! A trading party (buyer or supplier). Each agent owns:
//! - A location on the simulation map
//! - Its own [`MessageStore`] (no other agent ever mutates it)
//! - An optional [`QuotePolicy`] (buyers only)
//!
//! Agents never transport messages themselves. Every entry point returns the
//! messages the agent wants sent; the caller delivers them.

use crate::core::scheduler::{Scheduler, Timer};
use crate::core::time::Tick;
use crate::models::message::{DemandTerms, Direction, LogicalKind, TradeMessage};
use crate::policy::{Decision, Location, MarketView, PolicyContext, QuotePolicy};
use crate::store::{ExpiryConfig, MessageStore};
use std::fmt;

/// A trading party with its own negotiation state
pub struct Agent {
    id: String,
    location: Location,
    store: MessageStore,
    policy: Option<Box<dyn QuotePolicy>>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("policy", &self.policy.as_ref().map(|p| p.name()))
            .field("open_transactions", &self.store.ledger().len())
            .finish()
    }
}

impl Agent {
    /// Create an agent with an empty store bound to `id`
    ///
    /// # Example
    /// ```
    /// use trade_negotiation_core_rs::{Agent, ExpiryConfig, Location};
    ///
    /// let agent = Agent::new("BUYER".to_string(), Location::new(0.0, 0.0), ExpiryConfig::default());
    /// assert_eq!(agent.id(), "BUYER");
    /// assert!(agent.store().ledger().is_empty());
    /// ```
    pub fn new(id: String, location: Location, expiry: ExpiryConfig) -> Self {
        Self {
            store: MessageStore::with_owner(id.clone(), expiry),
            id,
            location,
            policy: None,
        }
    }

    /// Rebuild an agent around an existing store
    pub fn from_store(id: String, location: Location, store: MessageStore) -> Self {
        Self {
            id,
            location,
            store,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn QuotePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MessageStore {
        &mut self.store
    }

    pub fn policy(&self) -> Option<&dyn QuotePolicy> {
        self.policy.as_deref()
    }

    pub fn policy_mut(&mut self) -> Option<&mut (dyn QuotePolicy + 'static)> {
        self.policy.as_deref_mut()
    }

    /// Start a new transaction
    ///
    /// The demand is recorded as received (the agent hands it to itself) and
    /// returned so the caller can derive RFQs from it.
    pub fn raise_demand(
        &mut self,
        terms: DemandTerms,
        now: Tick,
        scheduler: &mut dyn Scheduler,
    ) -> TradeMessage {
        let demand = TradeMessage::internal_demand(self.id.clone(), terms, now);
        self.store
            .record(demand.clone(), Direction::Received, now, scheduler);
        demand
    }

    /// Record an outgoing message
    ///
    /// Returns the expiry deadline scheduled for it, if any.
    pub fn send(
        &mut self,
        message: TradeMessage,
        now: Tick,
        scheduler: &mut dyn Scheduler,
    ) -> Option<Tick> {
        self.store.record(message, Direction::Sent, now, scheduler)
    }

    /// Record an incoming message and let the quote policy react
    ///
    /// Returns any orders the policy decided to send. They are already
    /// recorded as sent.
    pub fn receive(
        &mut self,
        message: TradeMessage,
        now: Tick,
        scheduler: &mut dyn Scheduler,
        market: &dyn MarketView,
    ) -> Vec<TradeMessage> {
        let is_quote = message.logical_kind() == LogicalKind::Quote;
        self.store
            .record(message.clone(), Direction::Received, now, scheduler);

        if !is_quote {
            return Vec::new();
        }

        let Some(policy) = self.policy.as_mut() else {
            return Vec::new();
        };
        let mut ctx = PolicyContext {
            store: &mut self.store,
            scheduler: &mut *scheduler,
            market,
            owner_location: self.location,
            now,
        };
        let decision = policy.on_quote(&message, &mut ctx);
        self.dispatch(decision, now, scheduler)
    }

    /// Handle a timer previously scheduled by this agent's store or policy
    pub fn on_timer(
        &mut self,
        timer: Timer,
        now: Tick,
        scheduler: &mut dyn Scheduler,
        market: &dyn MarketView,
    ) -> Vec<TradeMessage> {
        match timer {
            Timer::Expire {
                demand_id,
                message_id,
                kind,
                direction,
            } => {
                self.store
                    .on_expire(&demand_id, &message_id, kind, direction, now);
                Vec::new()
            }
            Timer::Decide { demand_id } => {
                let Some(policy) = self.policy.as_mut() else {
                    return Vec::new();
                };
                let mut ctx = PolicyContext {
                    store: &mut self.store,
                    scheduler: &mut *scheduler,
                    market,
                    owner_location: self.location,
                    now,
                };
                let decision = policy.on_decide_timer(&demand_id, &mut ctx);
                self.dispatch(decision, now, scheduler)
            }
        }
    }

    /// Re-schedule store and policy timers after a restore
    pub fn rearm(&mut self, now: Tick, scheduler: &mut dyn Scheduler, market: &dyn MarketView) {
        self.store.rearm_timers(now, scheduler);
        if let Some(policy) = self.policy.as_mut() {
            let mut ctx = PolicyContext {
                store: &mut self.store,
                scheduler,
                market,
                owner_location: self.location,
                now,
            };
            policy.rearm(&mut ctx);
        }
    }

    fn dispatch(
        &mut self,
        decision: Decision,
        now: Tick,
        scheduler: &mut dyn Scheduler,
    ) -> Vec<TradeMessage> {
        match decision {
            Decision::Order(order) => {
                self.send(order.clone(), now, scheduler);
                vec![order]
            }
            Decision::Waiting | Decision::NoValidQuote | Decision::AlreadyDecided => Vec::new(),
        }
    }
}
