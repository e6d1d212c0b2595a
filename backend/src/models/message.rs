//! Trade message model
//!
//! Every business message exchanged during a negotiation belongs to exactly
//! one transaction, identified by the `internal_demand_id` of the
//! `InternalDemand` that started it. Every message except that root points
//! at exactly one causal predecessor:
//!
//! ```text
//! InternalDemand ─┬─ RequestForQuote ── Quote ── OrderBasedOnQuote ─┐
//!                 ├─ OrderStandalone ───────────────────────────────┤
//!                 ├─ YellowPageRequest / YellowPageAnswer           │
//!                 └─ ProductionOrder                                │
//!                                                                   ▼
//!         Payment ── Bill ── Shipment ── OrderConfirmation ◄──── Order
//! ```
//!
//! The two order sub-kinds share one payload ([`OrderTerms`]) and fold to the
//! single logical kind [`LogicalKind::Order`] for storage and lookup.
//!
//! CRITICAL: All money values are i64 (cents)

use crate::core::time::Tick;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the owning agent sent or received a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    /// The other side of the exchange
    pub fn opposite(self) -> Self {
        match self {
            Direction::Sent => Direction::Received,
            Direction::Received => Direction::Sent,
        }
    }
}

/// Concrete message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    InternalDemand,
    RequestForQuote,
    Quote,
    OrderBasedOnQuote,
    OrderStandalone,
    OrderConfirmation,
    Shipment,
    Bill,
    Payment,
    YellowPageRequest,
    YellowPageAnswer,
    ProductionOrder,
}

/// Message kind after folding order sub-kinds together
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalKind {
    InternalDemand,
    RequestForQuote,
    Quote,
    Order,
    OrderConfirmation,
    Shipment,
    Bill,
    Payment,
    YellowPageRequest,
    YellowPageAnswer,
    ProductionOrder,
}

/// One row of the causal chain table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    /// Logical kind of the predecessor (`None` for the transaction root)
    pub predecessor: Option<LogicalKind>,

    /// Recording this kind answers its predecessor, removing it from the
    /// live index of the recording agent
    pub answers_predecessor: bool,

    /// Recording this kind concludes the whole transaction
    pub concludes_transaction: bool,
}

impl ChainLink {
    const fn root() -> Self {
        Self {
            predecessor: None,
            answers_predecessor: false,
            concludes_transaction: false,
        }
    }

    const fn follows(predecessor: LogicalKind) -> Self {
        Self {
            predecessor: Some(predecessor),
            answers_predecessor: false,
            concludes_transaction: false,
        }
    }

    const fn answers(predecessor: LogicalKind) -> Self {
        Self {
            predecessor: Some(predecessor),
            answers_predecessor: true,
            concludes_transaction: false,
        }
    }
}

impl MessageKind {
    /// Every concrete kind, in declaration order
    pub const ALL: [MessageKind; 12] = [
        MessageKind::InternalDemand,
        MessageKind::RequestForQuote,
        MessageKind::Quote,
        MessageKind::OrderBasedOnQuote,
        MessageKind::OrderStandalone,
        MessageKind::OrderConfirmation,
        MessageKind::Shipment,
        MessageKind::Bill,
        MessageKind::Payment,
        MessageKind::YellowPageRequest,
        MessageKind::YellowPageAnswer,
        MessageKind::ProductionOrder,
    ];

    /// Collapse order sub-kinds into [`LogicalKind::Order`]
    ///
    /// # Example
    /// ```
    /// use trade_negotiation_core_rs::models::message::{LogicalKind, MessageKind};
    ///
    /// assert_eq!(MessageKind::OrderBasedOnQuote.fold(), LogicalKind::Order);
    /// assert_eq!(MessageKind::OrderStandalone.fold(), LogicalKind::Order);
    /// assert_eq!(MessageKind::Quote.fold(), LogicalKind::Quote);
    /// ```
    pub const fn fold(self) -> LogicalKind {
        match self {
            MessageKind::InternalDemand => LogicalKind::InternalDemand,
            MessageKind::RequestForQuote => LogicalKind::RequestForQuote,
            MessageKind::Quote => LogicalKind::Quote,
            MessageKind::OrderBasedOnQuote | MessageKind::OrderStandalone => LogicalKind::Order,
            MessageKind::OrderConfirmation => LogicalKind::OrderConfirmation,
            MessageKind::Shipment => LogicalKind::Shipment,
            MessageKind::Bill => LogicalKind::Bill,
            MessageKind::Payment => LogicalKind::Payment,
            MessageKind::YellowPageRequest => LogicalKind::YellowPageRequest,
            MessageKind::YellowPageAnswer => LogicalKind::YellowPageAnswer,
            MessageKind::ProductionOrder => LogicalKind::ProductionOrder,
        }
    }

    /// Causal chain table entry for this kind
    pub const fn chain_link(self) -> ChainLink {
        match self {
            MessageKind::InternalDemand => ChainLink::root(),
            MessageKind::RequestForQuote => ChainLink::follows(LogicalKind::InternalDemand),
            MessageKind::Quote => ChainLink::answers(LogicalKind::RequestForQuote),
            MessageKind::OrderBasedOnQuote => ChainLink::answers(LogicalKind::Quote),
            MessageKind::OrderStandalone => ChainLink::follows(LogicalKind::InternalDemand),
            MessageKind::OrderConfirmation => ChainLink::answers(LogicalKind::Order),
            MessageKind::Shipment => ChainLink::answers(LogicalKind::OrderConfirmation),
            MessageKind::Bill => ChainLink::follows(LogicalKind::Shipment),
            MessageKind::Payment => ChainLink {
                concludes_transaction: true,
                ..ChainLink::answers(LogicalKind::Bill)
            },
            MessageKind::YellowPageRequest => ChainLink::follows(LogicalKind::InternalDemand),
            MessageKind::YellowPageAnswer => ChainLink::follows(LogicalKind::InternalDemand),
            MessageKind::ProductionOrder => ChainLink::follows(LogicalKind::InternalDemand),
        }
    }

    /// Logical kind of the expected predecessor
    pub const fn predecessor_kind(self) -> Option<LogicalKind> {
        self.chain_link().predecessor
    }
}

/// Errors raised while building messages
#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("{kind:?} cannot follow {found:?} (expected predecessor {expected:?})")]
    UnexpectedPredecessor {
        kind: MessageKind,
        expected: Option<LogicalKind>,
        found: LogicalKind,
    },
}

/// Demand raised internally by an agent; starts a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandTerms {
    pub product_id: String,
    pub amount: u64,
    pub latest_delivery_tick: Tick,
}

/// Request for quote sent to a prospective supplier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqTerms {
    pub product_id: String,
    pub amount: u64,
    /// Quotes arriving after this tick are not waited for
    pub cutoff_tick: Tick,
    pub latest_delivery_tick: Tick,
}

/// Supplier's offer answering an RFQ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTerms {
    pub product_id: String,
    pub amount: u64,
    /// Total price for `amount` units (cents)
    pub price: i64,
    pub proposed_delivery_tick: Tick,
    /// The quote is only valid strictly before this tick
    pub validity_tick: Tick,
}

/// Payload shared by both order sub-kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerms {
    pub product_id: String,
    pub amount: u64,
    /// Total price (cents)
    pub price: i64,
    pub delivery_tick: Tick,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentTerms {
    pub product_id: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillTerms {
    /// Amount owed (cents)
    pub amount_due: i64,
    pub due_tick: Tick,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTerms {
    /// Amount paid (cents)
    pub amount: i64,
}

/// Kind-specific message content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    InternalDemand(DemandTerms),
    RequestForQuote(RfqTerms),
    Quote(QuoteTerms),
    OrderBasedOnQuote(OrderTerms),
    OrderStandalone(OrderTerms),
    OrderConfirmation,
    Shipment(ShipmentTerms),
    Bill(BillTerms),
    Payment(PaymentTerms),
    YellowPageRequest { product_id: String },
    YellowPageAnswer { product_id: String, suppliers: Vec<String> },
    ProductionOrder { product_id: String, amount: u64 },
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::InternalDemand(_) => MessageKind::InternalDemand,
            MessageBody::RequestForQuote(_) => MessageKind::RequestForQuote,
            MessageBody::Quote(_) => MessageKind::Quote,
            MessageBody::OrderBasedOnQuote(_) => MessageKind::OrderBasedOnQuote,
            MessageBody::OrderStandalone(_) => MessageKind::OrderStandalone,
            MessageBody::OrderConfirmation => MessageKind::OrderConfirmation,
            MessageBody::Shipment(_) => MessageKind::Shipment,
            MessageBody::Bill(_) => MessageKind::Bill,
            MessageBody::Payment(_) => MessageKind::Payment,
            MessageBody::YellowPageRequest { .. } => MessageKind::YellowPageRequest,
            MessageBody::YellowPageAnswer { .. } => MessageKind::YellowPageAnswer,
            MessageBody::ProductionOrder { .. } => MessageKind::ProductionOrder,
        }
    }
}

/// Immutable business message
///
/// # Example
/// ```
/// use trade_negotiation_core_rs::models::message::*;
///
/// let demand = TradeMessage::internal_demand(
///     "BUYER".to_string(),
///     DemandTerms {
///         product_id: "WIDGET".to_string(),
///         amount: 10,
///         latest_delivery_tick: 96,
///     },
///     0,
/// );
///
/// let rfq = TradeMessage::reply(
///     &demand,
///     "BUYER".to_string(),
///     "SUPPLIER_A".to_string(),
///     0,
///     MessageBody::RequestForQuote(RfqTerms {
///         product_id: "WIDGET".to_string(),
///         amount: 10,
///         cutoff_tick: 48,
///         latest_delivery_tick: 96,
///     }),
/// )
/// .unwrap();
///
/// assert_eq!(rfq.internal_demand_id(), demand.id());
/// assert_eq!(rfq.predecessor_id(), Some(demand.id()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Unique message identifier (UUID)
    id: String,

    /// Transaction key: id of the root `InternalDemand`
    internal_demand_id: String,

    sender_id: String,

    receiver_id: String,

    /// Tick when the message was created
    created_tick: Tick,

    /// Causal predecessor (`None` only for `InternalDemand`)
    predecessor_id: Option<String>,

    body: MessageBody,
}

impl TradeMessage {
    /// Create the root message of a new transaction
    ///
    /// The demand is addressed from the owner to itself, and its unique id
    /// doubles as the transaction key.
    pub fn internal_demand(owner_id: String, terms: DemandTerms, tick: Tick) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            internal_demand_id: id.clone(),
            id,
            sender_id: owner_id.clone(),
            receiver_id: owner_id,
            created_tick: tick,
            predecessor_id: None,
            body: MessageBody::InternalDemand(terms),
        }
    }

    /// Create a message caused by `predecessor`
    ///
    /// # Errors
    /// `UnexpectedPredecessor` if `body`'s kind cannot follow the
    /// predecessor's kind in the causal chain.
    pub fn reply(
        predecessor: &TradeMessage,
        sender_id: String,
        receiver_id: String,
        tick: Tick,
        body: MessageBody,
    ) -> Result<Self, MessageError> {
        let kind = body.kind();
        let expected = kind.predecessor_kind();
        let found = predecessor.logical_kind();
        if expected != Some(found) {
            return Err(MessageError::UnexpectedPredecessor {
                kind,
                expected,
                found,
            });
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            internal_demand_id: predecessor.internal_demand_id.clone(),
            sender_id,
            receiver_id,
            created_tick: tick,
            predecessor_id: Some(predecessor.id.clone()),
            body,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn internal_demand_id(&self) -> &str {
        &self.internal_demand_id
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    pub fn created_tick(&self) -> Tick {
        self.created_tick
    }

    pub fn predecessor_id(&self) -> Option<&str> {
        self.predecessor_id.as_deref()
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn logical_kind(&self) -> LogicalKind {
        self.kind().fold()
    }

    /// True for the transaction root
    pub fn is_root(&self) -> bool {
        self.predecessor_id.is_none()
    }

    pub fn demand_terms(&self) -> Option<&DemandTerms> {
        match &self.body {
            MessageBody::InternalDemand(terms) => Some(terms),
            _ => None,
        }
    }

    pub fn rfq_terms(&self) -> Option<&RfqTerms> {
        match &self.body {
            MessageBody::RequestForQuote(terms) => Some(terms),
            _ => None,
        }
    }

    pub fn quote_terms(&self) -> Option<&QuoteTerms> {
        match &self.body {
            MessageBody::Quote(terms) => Some(terms),
            _ => None,
        }
    }

    /// Order payload, for either order sub-kind
    pub fn order_terms(&self) -> Option<&OrderTerms> {
        match &self.body {
            MessageBody::OrderBasedOnQuote(terms) | MessageBody::OrderStandalone(terms) => {
                Some(terms)
            }
            _ => None,
        }
    }

    pub fn bill_terms(&self) -> Option<&BillTerms> {
        match &self.body {
            MessageBody::Bill(terms) => Some(terms),
            _ => None,
        }
    }
}
