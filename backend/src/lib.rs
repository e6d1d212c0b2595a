//! Trade Negotiation Core - Rust Engine
//!
//! Message lifecycle store and quote-resolution protocol for a discrete-event
//! supply-chain negotiation simulator.
//!
//! # Architecture
//!
//! - **core**: Time management and callback scheduling
//! - **models**: Domain types (TradeMessage, Event, Agent)
//! - **store**: Per-agent ledger, live index and expiry rules
//! - **policy**: Quote selection and wait-for-all / wait-for-deadline policies
//! - **orchestrator**: Deterministic simulation harness and checkpoints
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (cents)
//! 2. Every scheduled deadline is `>= now`
//! 3. Removal is idempotent; unknown transactions are never errors
//! 4. A transaction's quote decision runs at most once

// Module declarations
pub mod core;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod store;

// Re-exports for convenience
pub use core::scheduler::{EventQueue, Scheduler, Timer, TimerHandle};
pub use core::time::{Tick, TimeManager};
pub use models::{
    agent::Agent,
    event::{Event, EventLog, PurgeReason},
    message::{Direction, LogicalKind, MessageBody, MessageError, MessageKind, TradeMessage},
};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, SimulationError, SimulationSummary, TickResult,
};
pub use policy::{
    create_policy, CriteriaOrder, Decision, Location, MarketDirectory, MarketView, QuotePolicy,
    QuotePolicyConfig, QuoteSelector, SelectorConfig,
};
pub use store::{ExpiryConfig, MessageStore};
