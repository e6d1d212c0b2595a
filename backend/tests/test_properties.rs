//! Property-based tests for the message store and quote policies
//!
//! Invariants that must hold for arbitrary tick values and arrival orders:
//! scheduled deadlines never lie in the past, purging is idempotent, every
//! live message is recorded in the ledger, and a transaction is decided at
//! most once.

use proptest::prelude::*;
use trade_negotiation_core_rs::models::message::*;
use trade_negotiation_core_rs::policy::{
    Decision, Location, MarketDirectory, PolicyContext, QuoteCandidate, QuotePolicy, QuoteSelector,
    SelectorConfig, WaitForAllPolicy, WaitForDeadlinePolicy,
};
use trade_negotiation_core_rs::{EventQueue, ExpiryConfig, MessageStore, Timer};

// ============================================================================
// Strategies and helpers
// ============================================================================

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop::bool::ANY.prop_map(|b| if b { Direction::Sent } else { Direction::Received })
}

/// (price per unit, proposed delivery) for one supplier
fn offer_strategy() -> impl Strategy<Value = (i64, usize)> {
    (400i64..=700, 10usize..=120)
}

fn demand(latest: usize) -> TradeMessage {
    TradeMessage::internal_demand(
        "BUYER".to_string(),
        DemandTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            latest_delivery_tick: latest,
        },
        0,
    )
}

fn rfq(demand: &TradeMessage, supplier: usize, cutoff: usize, latest: usize) -> TradeMessage {
    TradeMessage::reply(
        demand,
        "BUYER".to_string(),
        format!("SUPPLIER_{}", supplier),
        0,
        MessageBody::RequestForQuote(RfqTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            cutoff_tick: cutoff,
            latest_delivery_tick: latest,
        }),
    )
    .unwrap()
}

fn quote(rfq: &TradeMessage, unit_price: i64, delivery: usize, tick: usize) -> TradeMessage {
    TradeMessage::reply(
        rfq,
        rfq.receiver_id().to_string(),
        "BUYER".to_string(),
        tick,
        MessageBody::Quote(QuoteTerms {
            product_id: "WIDGET".to_string(),
            amount: 10,
            price: unit_price * 10,
            proposed_delivery_tick: delivery,
            validity_tick: 1_000,
        }),
    )
    .unwrap()
}

fn market() -> MarketDirectory {
    MarketDirectory::new().with_price("WIDGET", 500.0)
}

fn store() -> MessageStore {
    MessageStore::with_owner("BUYER".to_string(), ExpiryConfig { grace_ticks: 24 })
}

/// Every live message must also be in the ledger, in the same direction
fn live_is_recorded(store: &MessageStore) -> bool {
    store.live().iter().all(|(direction, message)| {
        store
            .ledger()
            .find(message.internal_demand_id(), message.id())
            .is_some_and(|entry| entry.direction == direction)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: Every deadline handed to the scheduler is at or after `now`
    #[test]
    fn prop_deadline_never_in_the_past(
        cutoff in 0usize..200,
        latest in 0usize..200,
        delivery in 0usize..200,
        now in 0usize..400,
        direction in direction_strategy(),
    ) {
        let mut store = store();
        let mut queue: EventQueue<Timer> = EventQueue::new();
        let d = demand(latest);
        let r = rfq(&d, 0, cutoff, latest);
        let q = quote(&r, 500, delivery, now);

        for (message, dir) in [(d, Direction::Received), (r, Direction::Sent), (q, direction)] {
            if let Some(deadline) = store.record(message, dir, now, &mut queue) {
                prop_assert!(deadline >= now);
            }
        }
        while let Some((tick, _)) = queue.pop_due(usize::MAX) {
            prop_assert!(tick >= now);
        }
    }

    /// Property: Purging twice removes nothing the second time and leaves
    /// other transactions untouched
    #[test]
    fn prop_purge_is_idempotent(
        suppliers in 1usize..6,
        answered in 0usize..6,
        now in 0usize..100,
    ) {
        let mut store = store();
        let mut queue: EventQueue<Timer> = EventQueue::new();
        let target = demand(96);
        let other = demand(96);

        for d in [&target, &other] {
            store.record(d.clone(), Direction::Received, 0, &mut queue);
            for i in 0..suppliers {
                let r = rfq(d, i, 48, 96);
                store.record(r.clone(), Direction::Sent, 0, &mut queue);
                if i < answered {
                    store.record(quote(&r, 500, 72, 1), Direction::Received, 1, &mut queue);
                }
            }
        }
        let other_entries = store.ledger().entries(other.id()).count();

        let removed = store.purge_transaction(target.id(), now);
        prop_assert!(removed > 0);
        prop_assert_eq!(store.purge_transaction(target.id(), now), 0);

        prop_assert!(!store.ledger().contains_transaction(target.id()));
        prop_assert_eq!(store.live().for_demand(target.id()).count(), 0);
        prop_assert_eq!(store.ledger().entries(other.id()).count(), other_entries);
        prop_assert!(live_is_recorded(&store));
    }

    /// Property: Firing every timer in order keeps live a subset of the ledger
    #[test]
    fn prop_expiry_keeps_live_recorded(
        offers in prop::collection::vec(offer_strategy(), 1..5),
        silent in 0usize..3,
        cutoff in 10usize..60,
    ) {
        let mut store = store();
        let mut queue: EventQueue<Timer> = EventQueue::new();
        let d = demand(96);
        store.record(d.clone(), Direction::Received, 0, &mut queue);

        let total = offers.len() + silent;
        let rfqs: Vec<TradeMessage> = (0..total).map(|i| rfq(&d, i, cutoff, 96)).collect();
        for r in &rfqs {
            store.record(r.clone(), Direction::Sent, 0, &mut queue);
        }
        for (r, (price, delivery)) in rfqs.iter().zip(&offers) {
            store.record(quote(r, *price, *delivery, 1), Direction::Received, 1, &mut queue);
        }

        while let Some((tick, timer)) = queue.pop_due(usize::MAX) {
            if let Timer::Expire { demand_id, message_id, kind, direction } = timer {
                store.on_expire(&demand_id, &message_id, kind, direction, tick);
            }
            prop_assert!(live_is_recorded(&store));
        }

        // Nothing can outlive its timers
        prop_assert!(store.live().is_empty());
        prop_assert!(store.ledger().is_empty());
    }

    /// Property: Whatever order quotes and decide timers arrive in, at most
    /// one order is emitted per transaction
    #[test]
    fn prop_decide_at_most_once(
        offers in prop::collection::vec(offer_strategy(), 1..5),
        extra_timers in 0usize..4,
        wait_for_all in prop::bool::ANY,
    ) {
        let mut store = store();
        let mut queue: EventQueue<Timer> = EventQueue::new();
        let market = market();
        let mut policy: Box<dyn QuotePolicy> = if wait_for_all {
            Box::new(WaitForAllPolicy::new(SelectorConfig::default()))
        } else {
            Box::new(WaitForDeadlinePolicy::new(SelectorConfig::default()))
        };

        let d = demand(96);
        store.record(d.clone(), Direction::Received, 0, &mut queue);
        let rfqs: Vec<TradeMessage> = (0..offers.len()).map(|i| rfq(&d, i, 48, 96)).collect();
        for r in &rfqs {
            store.record(r.clone(), Direction::Sent, 0, &mut queue);
        }

        let mut orders = 0;
        for (i, (r, (price, delivery))) in rfqs.iter().zip(&offers).enumerate() {
            let q = quote(r, *price, *delivery, i + 1);
            store.record(q.clone(), Direction::Received, i + 1, &mut queue);
            let mut ctx = PolicyContext {
                store: &mut store,
                scheduler: &mut queue,
                market: &market,
                owner_location: Location::default(),
                now: i + 1,
            };
            if let Decision::Order(_) = policy.on_quote(&q, &mut ctx) {
                orders += 1;
            }
        }
        for _ in 0..=extra_timers {
            let mut ctx = PolicyContext {
                store: &mut store,
                scheduler: &mut queue,
                market: &market,
                owner_location: Location::default(),
                now: 48,
            };
            if let Decision::Order(_) = policy.on_decide_timer(d.id(), &mut ctx) {
                orders += 1;
            }
        }

        prop_assert!(orders <= 1);
        prop_assert!(policy.decider().is_decided(d.id()));
        prop_assert_eq!(store.events().events_of_type("OrderEmitted").len(), orders);
    }

    /// Property: The selected quote is never beaten on price by another
    /// candidate that passed screening (price-first ordering)
    #[test]
    fn prop_selected_quote_has_lowest_price(
        offers in prop::collection::vec(offer_strategy(), 1..6),
    ) {
        let d = demand(96);
        let market = market();
        let selector = QuoteSelector::new(SelectorConfig::default());
        let rfqs: Vec<TradeMessage> = (0..offers.len()).map(|i| rfq(&d, i, 48, 96)).collect();
        let quotes: Vec<TradeMessage> = rfqs
            .iter()
            .zip(&offers)
            .map(|(r, (price, delivery))| quote(r, *price, *delivery, 1))
            .collect();
        let candidates: Vec<QuoteCandidate<'_>> = quotes
            .iter()
            .zip(&rfqs)
            .map(|(quote, rfq)| QuoteCandidate { quote, rfq })
            .collect();

        let valid: Vec<&QuoteCandidate<'_>> = candidates
            .iter()
            .filter(|c| selector.screen(c, 2, &market).is_ok())
            .collect();
        let best = selector.select_best(candidates.iter().copied(), Location::default(), 2, &market);

        match best {
            None => prop_assert!(valid.is_empty()),
            Some(best) => {
                let best_price = best.quote.quote_terms().map(|t| t.price);
                for c in valid {
                    prop_assert!(best_price <= c.quote.quote_terms().map(|t| t.price));
                }
            }
        }
    }
}
