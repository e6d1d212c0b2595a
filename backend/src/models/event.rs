//! Event logging for negotiation replay and auditing.
//!
//! Every state change of a message store or quote policy is captured as an
//! [`Event`]. Events enable:
//! - Debugging (why did a transaction disappear?)
//! - Auditing (which quote was chosen, and over which alternatives)
//! - Deterministic replay checks (same scenario = same event sequence)
//!
//! # Example
//!
//! ```rust
//! use trade_negotiation_core_rs::models::event::{Event, EventLog, PurgeReason};
//!
//! let mut log = EventLog::new();
//! log.log(Event::TransactionPurged {
//!     tick: 48,
//!     agent_id: "BUYER".to_string(),
//!     demand_id: "d-1".to_string(),
//!     messages: 4,
//!     reason: PurgeReason::RootExpired,
//! });
//!
//! assert_eq!(log.events_for_demand("d-1").len(), 1);
//! ```

use crate::core::time::Tick;
use crate::models::message::{Direction, LogicalKind, MessageKind};
use serde::{Deserialize, Serialize};

/// Why a transaction left the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeReason {
    /// A concluding message (payment) was recorded
    Concluded,
    /// The root demand's deadline fired with no exchange still open
    RootExpired,
    /// A timeout left nothing but the root live
    Idle,
    /// Purged on request of the owning agent
    Requested,
}

/// Negotiation event capturing a state change.
///
/// All events carry the tick at which they happened and the agent whose
/// store produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum Event {
    /// Message appended to the ledger and live index
    MessageRecorded {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        message_id: String,
        kind: MessageKind,
        direction: Direction,
        deadline: Option<Tick>,
    },

    /// Predecessor left the live index because a reply arrived
    MessageAnswered {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        message_id: String,
        kind: LogicalKind,
        answered_by: String,
    },

    /// Unanswered message reached its deadline
    MessageExpired {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        message_id: String,
        kind: MessageKind,
        direction: Direction,
    },

    /// Expected predecessor was not found (partially observed chain)
    MissingPredecessor {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        message_id: String,
        expected: LogicalKind,
    },

    /// Whole transaction removed from the ledger
    TransactionPurged {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        messages: usize,
        reason: PurgeReason,
    },

    /// Quote selection committed to a supplier
    QuoteSelected {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        quote_id: String,
        supplier_id: String,
        price: i64,
        candidates: usize,
    },

    /// Quote selection found no acceptable candidate
    NoValidQuote {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        quotes_considered: usize,
    },

    /// Order produced for transport to the chosen supplier
    OrderEmitted {
        tick: Tick,
        agent_id: String,
        demand_id: String,
        order_id: String,
        quote_id: String,
        supplier_id: String,
    },
}

impl Event {
    /// Get the tick number when this event occurred
    pub fn tick(&self) -> Tick {
        match self {
            Event::MessageRecorded { tick, .. } => *tick,
            Event::MessageAnswered { tick, .. } => *tick,
            Event::MessageExpired { tick, .. } => *tick,
            Event::MissingPredecessor { tick, .. } => *tick,
            Event::TransactionPurged { tick, .. } => *tick,
            Event::QuoteSelected { tick, .. } => *tick,
            Event::NoValidQuote { tick, .. } => *tick,
            Event::OrderEmitted { tick, .. } => *tick,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::MessageRecorded { .. } => "MessageRecorded",
            Event::MessageAnswered { .. } => "MessageAnswered",
            Event::MessageExpired { .. } => "MessageExpired",
            Event::MissingPredecessor { .. } => "MissingPredecessor",
            Event::TransactionPurged { .. } => "TransactionPurged",
            Event::QuoteSelected { .. } => "QuoteSelected",
            Event::NoValidQuote { .. } => "NoValidQuote",
            Event::OrderEmitted { .. } => "OrderEmitted",
        }
    }

    /// Transaction the event belongs to
    pub fn demand_id(&self) -> &str {
        match self {
            Event::MessageRecorded { demand_id, .. } => demand_id,
            Event::MessageAnswered { demand_id, .. } => demand_id,
            Event::MessageExpired { demand_id, .. } => demand_id,
            Event::MissingPredecessor { demand_id, .. } => demand_id,
            Event::TransactionPurged { demand_id, .. } => demand_id,
            Event::QuoteSelected { demand_id, .. } => demand_id,
            Event::NoValidQuote { demand_id, .. } => demand_id,
            Event::OrderEmitted { demand_id, .. } => demand_id,
        }
    }

    /// Agent whose store or policy produced the event
    pub fn agent_id(&self) -> &str {
        match self {
            Event::MessageRecorded { agent_id, .. } => agent_id,
            Event::MessageAnswered { agent_id, .. } => agent_id,
            Event::MessageExpired { agent_id, .. } => agent_id,
            Event::MissingPredecessor { agent_id, .. } => agent_id,
            Event::TransactionPurged { agent_id, .. } => agent_id,
            Event::QuoteSelected { agent_id, .. } => agent_id,
            Event::NoValidQuote { agent_id, .. } => agent_id,
            Event::OrderEmitted { agent_id, .. } => agent_id,
        }
    }
}

/// Event log for storing and querying negotiation events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Move every event of `other` to the end of this log
    pub fn append(&mut self, other: &mut EventLog) {
        self.events.append(&mut other.events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific transaction
    pub fn events_for_demand(&self, demand_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.demand_id() == demand_id)
            .collect()
    }

    /// Get events for a specific agent
    pub fn events_for_agent(&self, agent_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.agent_id() == agent_id)
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expired(tick: Tick, agent: &str, demand: &str) -> Event {
        Event::MessageExpired {
            tick,
            agent_id: agent.to_string(),
            demand_id: demand.to_string(),
            message_id: "m".to_string(),
            kind: MessageKind::RequestForQuote,
            direction: Direction::Sent,
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = expired(42, "BUYER", "d-7");
        assert_eq!(event.tick(), 42);
        assert_eq!(event.event_type(), "MessageExpired");
        assert_eq!(event.demand_id(), "d-7");
        assert_eq!(event.agent_id(), "BUYER");
    }

    #[test]
    fn test_event_log_filters() {
        let mut log = EventLog::new();
        log.log(expired(1, "BUYER", "d-1"));
        log.log(expired(2, "SUPPLIER", "d-1"));
        log.log(expired(3, "BUYER", "d-2"));

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_for_demand("d-1").len(), 2);
        assert_eq!(log.events_for_agent("BUYER").len(), 2);
        assert_eq!(log.events_of_type("MessageExpired").len(), 3);
        assert!(log.events_of_type("OrderEmitted").is_empty());
    }

    #[test]
    fn test_event_log_append_drains_other() {
        let mut a = EventLog::new();
        let mut b = EventLog::new();
        b.log(expired(1, "BUYER", "d-1"));

        a.append(&mut b);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }
}
