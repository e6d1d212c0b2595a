//! Tests for the TradeMessage model
//!
//! Causal chain construction, kind folding and serialization shape.
//! CRITICAL: All money values are i64 (cents)

use trade_negotiation_core_rs::models::message::*;

fn demand() -> TradeMessage {
    TradeMessage::internal_demand(
        "BUYER".to_string(),
        DemandTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            latest_delivery_tick: 96,
        },
        0,
    )
}

fn rfq(demand: &TradeMessage) -> TradeMessage {
    TradeMessage::reply(
        demand,
        "BUYER".to_string(),
        "SUPPLIER_A".to_string(),
        0,
        MessageBody::RequestForQuote(RfqTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            cutoff_tick: 48,
            latest_delivery_tick: 96,
        }),
    )
    .unwrap()
}

fn quote(rfq: &TradeMessage) -> TradeMessage {
    TradeMessage::reply(
        rfq,
        "SUPPLIER_A".to_string(),
        "BUYER".to_string(),
        2,
        MessageBody::Quote(QuoteTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            price: 5000, // $50.00
            proposed_delivery_tick: 72,
            validity_tick: 90,
        }),
    )
    .unwrap()
}

#[test]
fn test_internal_demand_is_its_own_transaction() {
    let d = demand();

    assert!(d.is_root());
    assert_eq!(d.id(), d.internal_demand_id());
    assert_eq!(d.sender_id(), "BUYER");
    assert_eq!(d.receiver_id(), "BUYER");
    assert_eq!(d.predecessor_id(), None);
    assert_eq!(d.kind(), MessageKind::InternalDemand);
}

#[test]
fn test_reply_inherits_transaction_key() {
    let d = demand();
    let r = rfq(&d);
    let q = quote(&r);

    assert_eq!(q.internal_demand_id(), d.id());
    assert_eq!(q.predecessor_id(), Some(r.id()));
    assert_eq!(q.created_tick(), 2);
    assert_ne!(q.id(), r.id());
}

#[test]
fn test_reply_rejects_wrong_predecessor() {
    let d = demand();

    // A quote must answer an RFQ, not the demand itself
    let result = TradeMessage::reply(
        &d,
        "SUPPLIER_A".to_string(),
        "BUYER".to_string(),
        0,
        MessageBody::Quote(QuoteTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            price: 5000,
            proposed_delivery_tick: 72,
            validity_tick: 90,
        }),
    );

    assert_eq!(
        result,
        Err(MessageError::UnexpectedPredecessor {
            kind: MessageKind::Quote,
            expected: Some(LogicalKind::RequestForQuote),
            found: LogicalKind::InternalDemand,
        })
    );
}

#[test]
fn test_standalone_order_follows_demand() {
    let d = demand();
    let order = TradeMessage::reply(
        &d,
        "BUYER".to_string(),
        "SUPPLIER_A".to_string(),
        1,
        MessageBody::OrderStandalone(OrderTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            price: 5000,
            delivery_tick: 50,
        }),
    )
    .unwrap();

    assert_eq!(order.logical_kind(), LogicalKind::Order);
    assert_eq!(order.order_terms().unwrap().delivery_tick, 50);
}

#[test]
fn test_order_sub_kinds_share_payload_accessor() {
    let d = demand();
    let q = quote(&rfq(&d));
    let order = TradeMessage::reply(
        &q,
        "BUYER".to_string(),
        "SUPPLIER_A".to_string(),
        48,
        MessageBody::OrderBasedOnQuote(OrderTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            price: 5000,
            delivery_tick: 72,
        }),
    )
    .unwrap();

    assert_eq!(order.kind(), MessageKind::OrderBasedOnQuote);
    assert_eq!(order.logical_kind(), LogicalKind::Order);
    assert_eq!(order.order_terms().unwrap().price, 5000);
    assert!(order.quote_terms().is_none());
}

#[test]
fn test_answering_kinds() {
    let answering: Vec<MessageKind> = MessageKind::ALL
        .into_iter()
        .filter(|k| k.chain_link().answers_predecessor)
        .collect();

    assert_eq!(
        answering,
        vec![
            MessageKind::Quote,
            MessageKind::OrderBasedOnQuote,
            MessageKind::OrderConfirmation,
            MessageKind::Shipment,
            MessageKind::Payment,
        ]
    );
}

#[test]
fn test_message_json_carries_kind_tag() {
    let d = demand();
    let q = quote(&rfq(&d));

    let json = serde_json::to_value(&q).unwrap();
    assert_eq!(json["body"]["kind"], "quote");
    assert_eq!(json["body"]["price"], 5000);

    let back: TradeMessage = serde_json::from_value(json).unwrap();
    assert_eq!(back, q);
}
