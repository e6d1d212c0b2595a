//! Discrete-event scheduling
//!
//! The negotiation subsystem never blocks: "waiting for a quote" is data not
//! yet present, and every piece of future work is a [`Timer`] handed to a
//! [`Scheduler`] for a specific tick.
//!
//! # Ordering
//!
//! [`EventQueue`] orders entries by `(tick, sequence)`. Two entries scheduled
//! for the same tick fire in the order they were scheduled, which keeps every
//! transaction's decisions deterministic.
//!
//! # Example
//!
//! ```rust
//! use trade_negotiation_core_rs::core::{EventQueue, Scheduler, Timer};
//!
//! let mut queue = EventQueue::new();
//! queue.schedule_at(10, Timer::Decide { demand_id: "d-1".to_string() });
//! queue.schedule_at(5, Timer::Decide { demand_id: "d-2".to_string() });
//!
//! assert!(queue.pop_due(4).is_none());
//! let (tick, timer) = queue.pop_due(10).unwrap();
//! assert_eq!(tick, 5);
//! assert_eq!(timer.demand_id(), "d-2");
//! ```

use crate::core::time::Tick;
use crate::models::message::{Direction, MessageKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle returned by [`Scheduler::schedule_at`], usable for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerHandle {
    tick: Tick,
    seq: u64,
}

impl TimerHandle {
    /// Tick the timer is scheduled for
    pub fn tick(&self) -> Tick {
        self.tick
    }
}

/// Callback request owned by a single agent
///
/// Timers are plain data. The owner re-checks liveness when one fires, so a
/// timer for a message that was already answered or purged is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timer {
    /// Purge `message_id` from the live index if it is still unanswered
    Expire {
        demand_id: String,
        message_id: String,
        kind: MessageKind,
        direction: Direction,
    },

    /// Run quote selection for a transaction (wait-for-deadline policy)
    Decide { demand_id: String },
}

impl Timer {
    /// Transaction this timer belongs to
    pub fn demand_id(&self) -> &str {
        match self {
            Timer::Expire { demand_id, .. } => demand_id,
            Timer::Decide { demand_id } => demand_id,
        }
    }
}

/// Scheduler collaborator consumed by the message store and quote policies
pub trait Scheduler {
    /// Request `timer` to be delivered back to its owner at `tick`
    fn schedule_at(&mut self, tick: Tick, timer: Timer) -> TimerHandle;

    /// Cancel a previously scheduled timer
    ///
    /// Returns `false` if the timer already fired or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

/// Tick-ordered queue with FIFO tie-breaking
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    entries: BTreeMap<(Tick, u64), T>,
    next_seq: u64,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> EventQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `item` for `tick`
    pub fn push(&mut self, tick: Tick, item: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((tick, seq), item);
        TimerHandle { tick, seq }
    }

    /// Remove a pending entry. Returns `false` if it is no longer queued.
    pub fn remove(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&(handle.tick, handle.seq)).is_some()
    }

    /// Tick of the earliest pending entry
    pub fn next_tick(&self) -> Option<Tick> {
        self.entries.keys().next().map(|(tick, _)| *tick)
    }

    /// Pop the earliest entry if it is due at or before `now`
    pub fn pop_due(&mut self, now: Tick) -> Option<(Tick, T)> {
        let (&(tick, _), _) = self.entries.first_key_value()?;
        if tick > now {
            return None;
        }
        self.entries
            .pop_first()
            .map(|((tick, _), item)| (tick, item))
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending entries in firing order
    pub fn iter(&self) -> impl Iterator<Item = (Tick, &T)> {
        self.entries.iter().map(|((tick, _), item)| (*tick, item))
    }
}

impl Scheduler for EventQueue<Timer> {
    fn schedule_at(&mut self, tick: Tick, timer: Timer) -> TimerHandle {
        self.push(tick, timer)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.remove(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(id: &str) -> Timer {
        Timer::Decide {
            demand_id: id.to_string(),
        }
    }

    #[test]
    fn test_equal_ticks_fire_in_scheduling_order() {
        let mut queue = EventQueue::new();
        queue.schedule_at(7, decide("first"));
        queue.schedule_at(3, decide("early"));
        queue.schedule_at(7, decide("second"));

        let order: Vec<String> = std::iter::from_fn(|| queue.pop_due(100))
            .map(|(_, t)| t.demand_id().to_string())
            .collect();

        assert_eq!(order, vec!["early", "first", "second"]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut queue = EventQueue::new();
        let handle = queue.schedule_at(5, decide("d"));

        assert!(queue.cancel(handle));
        assert!(!queue.cancel(handle));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_due_respects_now() {
        let mut queue = EventQueue::new();
        queue.schedule_at(5, decide("d"));

        assert!(queue.pop_due(4).is_none());
        assert_eq!(queue.next_tick(), Some(5));
        assert!(queue.pop_due(5).is_some());
        assert_eq!(queue.next_tick(), None);
    }
}
