//! Message lifecycle store
//!
//! Owned by exactly one agent. Combines the [`TransactionLedger`] (full
//! history), the [`LiveIndex`] (what still awaits a reply), and the
//! [`ExpiryPolicy`] (when unanswered messages give up).
//!
//! # Flow
//!
//! ```text
//! record(msg, dir)
//!   ├─ ledger[demand][kind] += msg
//!   ├─ live[(dir, fold(kind))] += msg
//!   ├─ answers predecessor?  → remove predecessor from live (both sides)
//!   ├─ predecessor unknown?  → warn (counterparty roots excepted)
//!   ├─ concludes?            → purge transaction
//!   └─ deadline = expiry(msg) → scheduler.schedule_at(deadline, Expire)
//!
//! on_expire(timer)
//!   ├─ still live?  no → no-op
//!   ├─ root         → drop root; purge if nothing else is live
//!   └─ otherwise    → remove msg + cascade; purge if nothing but root is live
//! ```
//!
//! # Critical Invariants
//!
//! 1. Unknown transactions and absent messages are never errors
//! 2. Every removal is idempotent; a stale timer is a no-op
//! 3. Using a store before its owner is bound is a programming error (panic)

pub mod expiry;
pub mod ledger;
pub mod live_index;

pub use expiry::{ExpiryConfig, ExpiryPolicy, ExpiryRule};
pub use ledger::{LedgerEntry, TransactionLedger};
pub use live_index::LiveIndex;

use crate::core::scheduler::{Scheduler, Timer};
use crate::core::time::Tick;
use crate::models::event::{Event, EventLog, PurgeReason};
use crate::models::message::{Direction, LogicalKind, MessageKind, TradeMessage};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Per-agent negotiation message store
#[derive(Debug, Clone)]
pub struct MessageStore {
    owner_id: Option<String>,
    ledger: TransactionLedger,
    live: LiveIndex,
    expiry: ExpiryPolicy,
    event_log: EventLog,
}

impl MessageStore {
    /// Create a store with no owner yet
    ///
    /// [`bind_owner`](Self::bind_owner) must be called before the store is
    /// used.
    pub fn new(expiry: ExpiryConfig) -> Self {
        Self {
            owner_id: None,
            ledger: TransactionLedger::new(),
            live: LiveIndex::new(),
            expiry: ExpiryPolicy::new(expiry),
            event_log: EventLog::new(),
        }
    }

    /// Create a store already bound to `owner_id`
    pub fn with_owner(owner_id: String, expiry: ExpiryConfig) -> Self {
        let mut store = Self::new(expiry);
        store.bind_owner(owner_id);
        store
    }

    /// Rebuild a store from previously captured ledger and live entries
    ///
    /// Timers are not re-armed; call [`rearm_timers`](Self::rearm_timers).
    pub fn from_parts(
        owner_id: String,
        expiry: ExpiryConfig,
        ledger_entries: Vec<LedgerEntry>,
        live_entries: Vec<(Direction, TradeMessage)>,
    ) -> Self {
        let mut store = Self::with_owner(owner_id, expiry);
        for entry in ledger_entries {
            store.ledger.append(entry.message, entry.direction);
        }
        for (direction, message) in live_entries {
            store.live.insert(direction, message);
        }
        store
    }

    pub fn bind_owner(&mut self, owner_id: String) {
        self.owner_id = Some(owner_id);
    }

    /// Id of the owning agent
    ///
    /// # Panics
    /// Panics if no owner has been bound.
    pub fn owner_id(&self) -> &str {
        match &self.owner_id {
            Some(id) => id,
            None => panic!("message store used before its owner was bound"),
        }
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn live(&self) -> &LiveIndex {
        &self.live
    }

    pub fn expiry(&self) -> &ExpiryPolicy {
        &self.expiry
    }

    pub fn events(&self) -> &EventLog {
        &self.event_log
    }

    /// Take all events logged so far, leaving the store's log empty
    pub fn take_events(&mut self) -> EventLog {
        std::mem::take(&mut self.event_log)
    }

    /// Append an event produced on behalf of this store's owner
    pub fn log_event(&mut self, event: Event) {
        self.event_log.log(event);
    }

    /// Messages of `kind` recorded for a transaction
    pub fn query(
        &self,
        demand_id: &str,
        kind: LogicalKind,
        direction: Option<Direction>,
    ) -> Vec<&TradeMessage> {
        self.ledger.query(demand_id, kind, direction)
    }

    /// Look up a recorded message of a transaction
    pub fn find_message(&self, demand_id: &str, message_id: &str) -> Option<&TradeMessage> {
        self.ledger.find(demand_id, message_id).map(|e| &e.message)
    }

    /// Recorded predecessor of `message`, if the ledger holds it
    pub fn predecessor_of(&self, message: &TradeMessage) -> Option<&TradeMessage> {
        let id = message.predecessor_id()?;
        self.find_message(message.internal_demand_id(), id)
    }

    pub fn is_live(&self, direction: Direction, kind: LogicalKind, message_id: &str) -> bool {
        self.live.contains(direction, kind, message_id)
    }

    /// Record a message sent or received by the owner
    ///
    /// Returns the deadline scheduled for the message, if any.
    pub fn record(
        &mut self,
        message: TradeMessage,
        direction: Direction,
        now: Tick,
        scheduler: &mut dyn Scheduler,
    ) -> Option<Tick> {
        let owner = self.owner_id().to_string();
        let kind = message.kind();
        let link = kind.chain_link();

        if !self.ledger.append(message.clone(), direction) {
            debug!(agent = %owner, message = message.id(), ?kind, "message already recorded");
            return None;
        }
        self.live.insert(direction, message.clone());

        if let Some(expected) = link.predecessor {
            if link.answers_predecessor {
                self.answer_predecessor(&message, expected, now);
            } else if !(expected == LogicalKind::InternalDemand && direction == Direction::Received) {
                // A counterparty's root never reaches this ledger
                self.check_predecessor(&message, expected, now);
            }
        }

        if link.concludes_transaction {
            self.log_recorded(&owner, &message, direction, now, None);
            self.purge_with_reason(message.internal_demand_id(), now, PurgeReason::Concluded);
            return None;
        }

        let deadline = self.expiry.deadline(&message, direction, now, &self.ledger);
        if let Some(deadline) = deadline {
            scheduler.schedule_at(
                deadline,
                Timer::Expire {
                    demand_id: message.internal_demand_id().to_string(),
                    message_id: message.id().to_string(),
                    kind,
                    direction,
                },
            );
        }

        debug!(
            agent = %owner,
            message = message.id(),
            ?kind,
            ?direction,
            ?deadline,
            "recorded message"
        );
        self.log_recorded(&owner, &message, direction, now, deadline);
        deadline
    }

    /// Remove a whole transaction from the ledger and live index
    ///
    /// Returns the number of ledger entries removed. Purging an unknown (or
    /// already purged) transaction is a no-op.
    pub fn purge_transaction(&mut self, demand_id: &str, now: Tick) -> usize {
        self.purge_with_reason(demand_id, now, PurgeReason::Requested)
    }

    /// Handle a fired [`Timer::Expire`]
    ///
    /// Does nothing if the message was answered or purged in the meantime.
    pub fn on_expire(
        &mut self,
        demand_id: &str,
        message_id: &str,
        kind: MessageKind,
        direction: Direction,
        now: Tick,
    ) {
        let owner = self.owner_id().to_string();
        let logical = kind.fold();

        let Some(message) = self.live.remove(direction, logical, message_id) else {
            debug!(agent = %owner, message = message_id, ?kind, "expiry for settled message ignored");
            return;
        };

        if logical == LogicalKind::RequestForQuote && direction == Direction::Sent {
            warn!(
                agent = %owner,
                demand = demand_id,
                supplier = message.receiver_id(),
                "request for quote expired without a reply"
            );
        } else {
            info!(agent = %owner, demand = demand_id, message = message_id, ?kind, ?direction, "message expired");
        }
        self.event_log.log(Event::MessageExpired {
            tick: now,
            agent_id: owner.clone(),
            demand_id: demand_id.to_string(),
            message_id: message_id.to_string(),
            kind,
            direction,
        });

        let rule = ExpiryRule::for_kind(logical);
        if rule == ExpiryRule::Root {
            // Exchanges still in flight keep the transaction; the last of
            // them to settle purges it
            if self.live.for_demand(demand_id).next().is_none() {
                self.purge_with_reason(demand_id, now, PurgeReason::RootExpired);
            } else {
                debug!(agent = %owner, demand = demand_id, "root expired with exchanges in flight");
            }
            return;
        }

        let mut removed = BTreeSet::new();
        removed.insert(message_id.to_string());
        self.cascade_backward(&message, rule.cascade_depth(), now, &mut removed);
        self.sweep_successors(demand_id, &mut removed);

        if self.only_root_live(demand_id) {
            self.purge_with_reason(demand_id, now, PurgeReason::Idle);
        }
    }

    /// Schedule expiry timers for every live message again
    ///
    /// Used after restoring a store from a snapshot. Deadlines are recomputed
    /// from the ledger and clamped to `now`.
    pub fn rearm_timers(&self, now: Tick, scheduler: &mut dyn Scheduler) -> usize {
        let mut armed = 0;
        for (direction, message) in self.live.iter() {
            if let Some(deadline) = self.expiry.deadline(message, direction, now, &self.ledger) {
                scheduler.schedule_at(
                    deadline,
                    Timer::Expire {
                        demand_id: message.internal_demand_id().to_string(),
                        message_id: message.id().to_string(),
                        kind: message.kind(),
                        direction,
                    },
                );
                armed += 1;
            }
        }
        armed
    }

    fn answer_predecessor(&mut self, message: &TradeMessage, expected: LogicalKind, now: Tick) {
        let owner = self.owner_id().to_string();
        let demand_id = message.internal_demand_id().to_string();

        let Some(predecessor_id) = message.predecessor_id() else {
            return;
        };

        let removed = self.live.remove_everywhere(expected, predecessor_id);
        if !removed.is_empty() {
            debug!(agent = %owner, predecessor = predecessor_id, answered_by = message.id(), "predecessor answered");
            self.event_log.log(Event::MessageAnswered {
                tick: now,
                agent_id: owner,
                demand_id,
                message_id: predecessor_id.to_string(),
                kind: expected,
                answered_by: message.id().to_string(),
            });
        } else if self.ledger.find(&demand_id, predecessor_id).is_some() {
            debug!(agent = %owner, predecessor = predecessor_id, "late reply to a settled message");
        } else {
            self.warn_missing(&owner, &demand_id, message.id(), expected, now);
        }
    }

    fn check_predecessor(&mut self, message: &TradeMessage, expected: LogicalKind, now: Tick) {
        if self.predecessor_of(message).is_some() {
            return;
        }
        let owner = self.owner_id().to_string();
        let demand_id = message.internal_demand_id().to_string();
        self.warn_missing(&owner, &demand_id, message.id(), expected, now);
    }

    /// Walk `depth` steps up the causal chain, removing each predecessor
    fn cascade_backward(
        &mut self,
        message: &TradeMessage,
        depth: usize,
        now: Tick,
        removed: &mut BTreeSet<String>,
    ) {
        let owner = self.owner_id().to_string();
        let mut current = message.clone();

        for _ in 0..depth {
            let Some(expected) = current.kind().predecessor_kind() else {
                break;
            };
            let Some(predecessor) = self.predecessor_of(&current).cloned() else {
                self.warn_missing(&owner, current.internal_demand_id(), current.id(), expected, now);
                break;
            };
            if removed.insert(predecessor.id().to_string()) {
                self.live.remove_everywhere(predecessor.logical_kind(), predecessor.id());
            }
            current = predecessor;
        }
    }

    /// Remove live messages whose predecessor was just removed
    fn sweep_successors(&mut self, demand_id: &str, removed: &mut BTreeSet<String>) {
        loop {
            let dangling: Vec<(LogicalKind, String)> = self
                .live
                .for_demand(demand_id)
                .filter(|(_, m)| !removed.contains(m.id()))
                .filter(|(_, m)| m.predecessor_id().is_some_and(|p| removed.contains(p)))
                .map(|(_, m)| (m.logical_kind(), m.id().to_string()))
                .collect();

            if dangling.is_empty() {
                return;
            }
            for (kind, id) in dangling {
                self.live.remove_everywhere(kind, &id);
                removed.insert(id);
            }
        }
    }

    fn only_root_live(&self, demand_id: &str) -> bool {
        self.live
            .for_demand(demand_id)
            .all(|(_, m)| m.is_root())
    }

    fn purge_with_reason(&mut self, demand_id: &str, now: Tick, reason: PurgeReason) -> usize {
        let entries = self.ledger.remove_transaction(demand_id);
        if entries.is_empty() {
            return 0;
        }

        for entry in &entries {
            self.live
                .remove(entry.direction, entry.message.logical_kind(), entry.message.id());
        }

        let owner = self.owner_id().to_string();
        info!(agent = %owner, demand = demand_id, messages = entries.len(), ?reason, "transaction purged");
        self.event_log.log(Event::TransactionPurged {
            tick: now,
            agent_id: owner,
            demand_id: demand_id.to_string(),
            messages: entries.len(),
            reason,
        });
        entries.len()
    }

    fn warn_missing(
        &mut self,
        owner: &str,
        demand_id: &str,
        message_id: &str,
        expected: LogicalKind,
        now: Tick,
    ) {
        warn!(
            agent = %owner,
            demand = demand_id,
            message = message_id,
            ?expected,
            "predecessor not found"
        );
        self.event_log.log(Event::MissingPredecessor {
            tick: now,
            agent_id: owner.to_string(),
            demand_id: demand_id.to_string(),
            message_id: message_id.to_string(),
            expected,
        });
    }

    fn log_recorded(
        &mut self,
        owner: &str,
        message: &TradeMessage,
        direction: Direction,
        now: Tick,
        deadline: Option<Tick>,
    ) {
        self.event_log.log(Event::MessageRecorded {
            tick: now,
            agent_id: owner.to_string(),
            demand_id: message.internal_demand_id().to_string(),
            message_id: message.id().to_string(),
            kind: message.kind(),
            direction,
            deadline,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::EventQueue;
    use crate::models::message::DemandTerms;

    #[test]
    #[should_panic(expected = "message store used before its owner was bound")]
    fn test_unbound_store_panics_on_record() {
        let mut store = MessageStore::new(ExpiryConfig::default());
        let mut queue: EventQueue<Timer> = EventQueue::new();
        let demand = TradeMessage::internal_demand(
            "BUYER".to_string(),
            DemandTerms {
                product_id: "P".to_string(),
                amount: 1,
                latest_delivery_tick: 10,
            },
            0,
        );
        store.record(demand, Direction::Received, 0, &mut queue);
    }

    #[test]
    fn test_purge_unknown_is_noop() {
        let mut store = MessageStore::with_owner("BUYER".to_string(), ExpiryConfig::default());
        assert_eq!(store.purge_transaction("missing", 0), 0);
        assert!(store.events().is_empty());
    }
}
