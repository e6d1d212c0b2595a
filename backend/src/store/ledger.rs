//! Transaction ledger
//!
//! Full history of every message an agent sent or received, grouped by
//! transaction (`internal_demand_id`) and logical kind. Entries are
//! append-only while the transaction lives; the whole transaction is removed
//! at once when it concludes or expires.
//!
//! Lookups on unknown transactions return empty results, never errors.

use crate::models::message::{Direction, LogicalKind, TradeMessage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A recorded message together with the side that recorded it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub message: TradeMessage,
    pub direction: Direction,
}

type KindMap = BTreeMap<LogicalKind, Vec<LedgerEntry>>;

/// Per-transaction message history
///
/// # Example
/// ```
/// use trade_negotiation_core_rs::models::message::*;
/// use trade_negotiation_core_rs::store::ledger::TransactionLedger;
///
/// let demand = TradeMessage::internal_demand(
///     "BUYER".to_string(),
///     DemandTerms { product_id: "P".to_string(), amount: 5, latest_delivery_tick: 50 },
///     0,
/// );
/// let id = demand.internal_demand_id().to_string();
///
/// let mut ledger = TransactionLedger::new();
/// ledger.append(demand, Direction::Received);
///
/// assert_eq!(ledger.query(&id, LogicalKind::InternalDemand, None).len(), 1);
/// assert!(ledger.query("unknown", LogicalKind::Quote, None).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionLedger {
    transactions: BTreeMap<String, KindMap>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its transaction's history
    ///
    /// Returns `false` (and leaves the ledger untouched) if the same message
    /// was already recorded in the same direction.
    pub fn append(&mut self, message: TradeMessage, direction: Direction) -> bool {
        let entries = self
            .transactions
            .entry(message.internal_demand_id().to_string())
            .or_default()
            .entry(message.logical_kind())
            .or_default();

        if entries
            .iter()
            .any(|e| e.direction == direction && e.message.id() == message.id())
        {
            return false;
        }

        entries.push(LedgerEntry { message, direction });
        true
    }

    /// Remove a whole transaction, returning every entry it held
    ///
    /// Unknown ids yield an empty vector.
    pub fn remove_transaction(&mut self, demand_id: &str) -> Vec<LedgerEntry> {
        self.transactions
            .remove(demand_id)
            .map(|kinds| kinds.into_values().flatten().collect())
            .unwrap_or_default()
    }

    /// Messages of `kind` recorded for a transaction, in recording order
    ///
    /// `direction = None` returns both sent and received messages.
    pub fn query(
        &self,
        demand_id: &str,
        kind: LogicalKind,
        direction: Option<Direction>,
    ) -> Vec<&TradeMessage> {
        self.transactions
            .get(demand_id)
            .and_then(|kinds| kinds.get(&kind))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| direction.map_or(true, |d| e.direction == d))
                    .map(|e| &e.message)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of messages `query` would return
    pub fn count(&self, demand_id: &str, kind: LogicalKind, direction: Option<Direction>) -> usize {
        self.query(demand_id, kind, direction).len()
    }

    /// Find a message by id within a transaction
    pub fn find(&self, demand_id: &str, message_id: &str) -> Option<&LedgerEntry> {
        self.entries(demand_id).find(|e| e.message.id() == message_id)
    }

    /// All entries of a transaction, grouped by kind
    pub fn entries<'a>(&'a self, demand_id: &str) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.transactions
            .get(demand_id)
            .into_iter()
            .flat_map(|kinds| kinds.values().flatten())
    }

    /// Every entry in the ledger
    pub fn all_entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.transactions
            .values()
            .flat_map(|kinds| kinds.values().flatten())
    }

    pub fn contains_transaction(&self, demand_id: &str) -> bool {
        self.transactions.contains_key(demand_id)
    }

    /// Ids of all open transactions, in sorted order
    pub fn transaction_ids(&self) -> impl Iterator<Item = &str> {
        self.transactions.keys().map(|k| k.as_str())
    }

    /// Number of open transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
