//! Scripted counterparties
//!
//! Suppliers and buyers in the harness follow fixed scripts so scenarios are
//! reproducible:
//!
//! - Supplier, on RFQ: quote after `response_delay` (or stay silent)
//! - Supplier, on order: confirm now, ship and bill at the delivery tick
//! - Buyer, on bill: pay the full amount immediately
//!
//! Every script returns planned sends as `(tick, message)`; the engine
//! records and transports them when their tick comes.

use crate::core::time::Tick;
use crate::models::message::{
    BillTerms, MessageBody, PaymentTerms, QuoteTerms, ShipmentTerms, TradeMessage,
};
use crate::orchestrator::engine::SupplierConfig;
use tracing::{debug, warn};

/// A message the script wants sent at a given tick
pub type PlannedSend = (Tick, TradeMessage);

/// Scripted supplier reaction to an incoming message
pub fn supplier_reply(
    supplier: &SupplierConfig,
    message: &TradeMessage,
    now: Tick,
    ticks_per_day: Tick,
) -> Vec<PlannedSend> {
    match message.body() {
        MessageBody::RequestForQuote(rfq) => {
            if supplier.silent {
                debug!(supplier = %supplier.id, demand = message.internal_demand_id(), "ignoring request for quote");
                return Vec::new();
            }
            let Some(offer) = supplier.offer_for(&rfq.product_id) else {
                return Vec::new();
            };

            let amount = offer.max_amount.map_or(rfq.amount, |max| rfq.amount.min(max));
            let send_tick = now.saturating_add(offer.response_delay);
            let body = MessageBody::Quote(QuoteTerms {
                product_id: rfq.product_id.clone(),
                amount,
                price: offer.unit_price * amount as i64,
                proposed_delivery_tick: send_tick.saturating_add(offer.lead_time),
                validity_tick: send_tick.saturating_add(offer.validity),
            });
            reply(supplier, message, send_tick, body)
                .map(|quote| (send_tick, quote))
                .into_iter()
                .collect()
        }

        MessageBody::OrderBasedOnQuote(order) | MessageBody::OrderStandalone(order) => {
            if !supplier.confirms_orders {
                return Vec::new();
            }
            let ship_tick = order.delivery_tick.max(now);

            let Some(confirmation) = reply(supplier, message, now, MessageBody::OrderConfirmation)
            else {
                return Vec::new();
            };
            let Some(shipment) = reply(
                supplier,
                &confirmation,
                ship_tick,
                MessageBody::Shipment(ShipmentTerms {
                    product_id: order.product_id.clone(),
                    amount: order.amount,
                }),
            ) else {
                return vec![(now, confirmation)];
            };
            let bill = reply(
                supplier,
                &shipment,
                ship_tick,
                MessageBody::Bill(BillTerms {
                    amount_due: order.price,
                    due_tick: ship_tick.saturating_add(ticks_per_day),
                }),
            );

            let mut planned = vec![(now, confirmation), (ship_tick, shipment)];
            planned.extend(bill.map(|b| (ship_tick, b)));
            planned
        }

        _ => Vec::new(),
    }
}

/// Scripted buyer reaction: settle every bill in full on receipt
pub fn buyer_reply(buyer_id: &str, message: &TradeMessage, now: Tick) -> Option<PlannedSend> {
    let bill = message.bill_terms()?;
    let payment = TradeMessage::reply(
        message,
        buyer_id.to_string(),
        message.sender_id().to_string(),
        now,
        MessageBody::Payment(PaymentTerms {
            amount: bill.amount_due,
        }),
    );
    match payment {
        Ok(payment) => Some((now, payment)),
        Err(err) => {
            warn!(buyer = buyer_id, %err, "could not build payment");
            None
        }
    }
}

fn reply(
    supplier: &SupplierConfig,
    predecessor: &TradeMessage,
    tick: Tick,
    body: MessageBody,
) -> Option<TradeMessage> {
    // Replies go back to whoever started the exchange with us
    let counterparty = if predecessor.sender_id() == supplier.id {
        predecessor.receiver_id()
    } else {
        predecessor.sender_id()
    };
    match TradeMessage::reply(
        predecessor,
        supplier.id.clone(),
        counterparty.to_string(),
        tick,
        body,
    ) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(supplier = %supplier.id, %err, "could not build reply");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{DemandTerms, RfqTerms};
    use crate::orchestrator::engine::OfferConfig;
    use crate::policy::Location;

    fn supplier(silent: bool) -> SupplierConfig {
        SupplierConfig {
            id: "SUP".to_string(),
            location: Location::default(),
            offers: vec![OfferConfig {
                product_id: "P".to_string(),
                unit_price: 5,
                lead_time: 10,
                validity: 30,
                response_delay: 2,
                max_amount: None,
            }],
            silent,
            confirms_orders: true,
        }
    }

    fn rfq() -> TradeMessage {
        let demand = TradeMessage::internal_demand(
            "BUYER".to_string(),
            DemandTerms {
                product_id: "P".to_string(),
                amount: 10,
                latest_delivery_tick: 100,
            },
            0,
        );
        TradeMessage::reply(
            &demand,
            "BUYER".to_string(),
            "SUP".to_string(),
            0,
            MessageBody::RequestForQuote(RfqTerms {
                product_id: "P".to_string(),
                amount: 10,
                cutoff_tick: 48,
                latest_delivery_tick: 100,
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_supplier_quotes_after_delay() {
        let planned = supplier_reply(&supplier(false), &rfq(), 1, 24);
        assert_eq!(planned.len(), 1);

        let (tick, quote) = &planned[0];
        assert_eq!(*tick, 3);
        assert_eq!(quote.receiver_id(), "BUYER");
        let terms = quote.quote_terms().unwrap();
        assert_eq!(terms.price, 50);
        assert_eq!(terms.proposed_delivery_tick, 13);
        assert_eq!(terms.validity_tick, 33);
    }

    #[test]
    fn test_huge_lead_time_saturates() {
        let mut sup = supplier(false);
        sup.offers[0].lead_time = usize::MAX;
        sup.offers[0].validity = usize::MAX;

        let planned = supplier_reply(&sup, &rfq(), 1, 24);
        let terms = planned[0].1.quote_terms().unwrap();
        assert_eq!(terms.proposed_delivery_tick, usize::MAX);
        assert_eq!(terms.validity_tick, usize::MAX);
    }

    #[test]
    fn test_silent_supplier_never_quotes() {
        assert!(supplier_reply(&supplier(true), &rfq(), 1, 24).is_empty());
    }
}
