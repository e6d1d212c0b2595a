//! Checkpoint - Save/Load Simulation State
//!
//! Enables serialization and deserialization of the negotiation state for
//! pause/resume functionality.
//!
//! # Critical Invariants
//!
//! - **Live Integrity**: Every live message is also in its agent's ledger
//! - **Live Uniqueness**: No message is live twice in the same direction
//! - **Config Matching**: State can only be loaded with matching config
//!
//! Timers are not stored. Restoring re-derives every expiry deadline from the
//! ledger (clamped to the restore tick) and re-arms pending decide timers.

use crate::core::time::Tick;
use crate::models::message::{Direction, TradeMessage};
use crate::orchestrator::engine::{SimulationError, Wakeup};
use crate::store::{ExpiryConfig, LedgerEntry, MessageStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete orchestrator state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Current tick position
    pub current_tick: usize,

    /// Current day position
    pub current_day: usize,

    /// One snapshot per agent store
    pub agents: Vec<StoreSnapshot>,

    /// Queued demands, deliveries and planned sends (timers excluded)
    pub pending: Vec<PendingWakeup>,

    /// SHA256 hash of original config (for validation)
    pub config_hash: String,
}

/// Queued work item with its tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWakeup {
    pub tick: Tick,
    pub wakeup: Wakeup,
}

/// One live index slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEntrySnapshot {
    pub direction: Direction,
    pub message: TradeMessage,
}

/// Message store state of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub agent_id: String,

    /// Every ledger entry, grouped by transaction
    pub ledger: Vec<LedgerEntry>,

    /// Messages still awaiting a reply
    pub live: Vec<LiveEntrySnapshot>,

    /// Transactions whose quote decision already ran
    pub decided: Vec<String>,
}

impl StoreSnapshot {
    /// Capture a store together with its owner's decided transactions
    pub fn capture(store: &MessageStore, decided: Vec<String>) -> Self {
        Self {
            agent_id: store.owner_id().to_string(),
            ledger: store.ledger().all_entries().cloned().collect(),
            live: store
                .live()
                .iter()
                .map(|(direction, message)| LiveEntrySnapshot {
                    direction,
                    message: message.clone(),
                })
                .collect(),
            decided,
        }
    }

    /// Rebuild the store; the decided set is handed back for the policy
    pub fn restore(self, expiry: ExpiryConfig) -> (MessageStore, Vec<String>) {
        let store = MessageStore::from_parts(
            self.agent_id,
            expiry,
            self.ledger,
            self.live
                .into_iter()
                .map(|entry| (entry.direction, entry.message))
                .collect(),
        );
        (store, self.decided)
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on map iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validate state snapshot integrity
///
/// Checks:
/// - Agent ids are unique
/// - Every live entry references a message in the same agent's ledger,
///   recorded in the same direction
/// - No live entry appears twice
pub fn validate_snapshot(snapshot: &StateSnapshot) -> Result<(), SimulationError> {
    let mut agent_ids = HashSet::new();

    for agent in &snapshot.agents {
        if !agent_ids.insert(agent.agent_id.as_str()) {
            return Err(SimulationError::StateValidationError(format!(
                "Duplicate agent snapshot: {}",
                agent.agent_id
            )));
        }

        let recorded: HashSet<(Direction, &str)> = agent
            .ledger
            .iter()
            .map(|e| (e.direction, e.message.id()))
            .collect();

        let mut live_seen = HashSet::new();
        for entry in &agent.live {
            let key = (entry.direction, entry.message.id());
            if !recorded.contains(&key) {
                return Err(SimulationError::StateValidationError(format!(
                    "Orphaned live message in agent {}: {}",
                    agent.agent_id,
                    entry.message.id()
                )));
            }
            if !live_seen.insert(key) {
                return Err(SimulationError::StateValidationError(format!(
                    "Duplicate live message in agent {}: {}",
                    agent.agent_id,
                    entry.message.id()
                )));
            }
        }
    }

    Ok(())
}
