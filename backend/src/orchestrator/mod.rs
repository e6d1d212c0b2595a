//! Orchestrator - negotiation simulation loop
//!
//! Drives buyers and scripted suppliers through demands, RFQs, quotes and
//! orders on a deterministic event queue.
//!
//! See `engine.rs` for full implementation.

pub mod checkpoint;
pub mod engine;
pub mod scripts;

// Re-export main types for convenience
pub use engine::{
    BuyerConfig, DemandConfig, OfferConfig, Orchestrator, OrchestratorConfig, ProductConfig,
    SimulationError, SimulationSummary, SupplierConfig, TickResult, Wakeup,
};

// Re-export checkpoint types
pub use checkpoint::{
    compute_config_hash, validate_snapshot, LiveEntrySnapshot, PendingWakeup, StateSnapshot,
    StoreSnapshot,
};
