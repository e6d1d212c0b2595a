//! Domain models for trade negotiation

pub mod agent;
pub mod event;
pub mod message;

// Re-exports
pub use agent::Agent;
pub use event::{Event, EventLog, PurgeReason};
pub use message::{
    BillTerms, ChainLink, DemandTerms, Direction, LogicalKind, MessageBody, MessageError,
    MessageKind, OrderTerms, PaymentTerms, QuoteTerms, RfqTerms, ShipmentTerms, TradeMessage,
};
