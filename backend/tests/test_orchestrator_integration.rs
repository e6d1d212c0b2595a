//! End-to-end negotiation scenarios
//!
//! One buyer asks three suppliers for a quote. A answers on time, B never
//! answers and C proposes a delivery after the buyer's latest acceptable tick.

use trade_negotiation_core_rs::models::event::PurgeReason;
use trade_negotiation_core_rs::models::message::{Direction, MessageKind};
use trade_negotiation_core_rs::policy::{QuotePolicyConfig, SelectorConfig};
use trade_negotiation_core_rs::{Event, Orchestrator, OrchestratorConfig};

const SCENARIO: &str = include_str!("../../cli/scenarios/three_suppliers.json");

fn scenario() -> OrchestratorConfig {
    serde_json::from_str(SCENARIO).unwrap()
}

fn orders(orchestrator: &Orchestrator) -> Vec<(usize, String)> {
    orchestrator
        .event_log()
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::OrderEmitted {
                tick, supplier_id, ..
            } => Some((*tick, supplier_id.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_scenario_config_defaults() {
    let config = scenario();

    assert_eq!(config.ticks_per_day, 24);
    assert_eq!(config.suppliers.len(), 3);
    assert!(config.suppliers.iter().all(|s| s.confirms_orders));
    assert!(config.suppliers[1].silent);
    assert_eq!(config.demands[0].suppliers, None);
}

#[test]
fn test_deadline_buyer_orders_from_only_valid_supplier() {
    let mut orchestrator = Orchestrator::new(scenario()).unwrap();
    let summary = orchestrator.run().unwrap();

    // Decided at the cutoff; C delivers too late, B never answered
    assert_eq!(orders(&orchestrator), vec![(48, "SUPPLIER_A".to_string())]);
    assert_eq!(summary.orders_emitted, 1);

    let selected = orchestrator.event_log().events_of_type("QuoteSelected");
    assert_eq!(selected.len(), 1);
    assert!(matches!(
        selected[0],
        Event::QuoteSelected { candidates: 2, price: 5000, .. }
    ));
}

#[test]
fn test_silent_supplier_rfq_expires_after_grace() {
    let mut orchestrator = Orchestrator::new(scenario()).unwrap();
    let summary = orchestrator.run().unwrap();

    let buyer_expired: Vec<&Event> = orchestrator
        .event_log()
        .events_for_agent("BUYER")
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                Event::MessageExpired {
                    kind: MessageKind::RequestForQuote,
                    direction: Direction::Sent,
                    ..
                }
            )
        })
        .collect();

    // cutoff 48 + one day of grace
    assert_eq!(buyer_expired.len(), 1);
    assert_eq!(buyer_expired[0].tick(), 72);
    assert_eq!(summary.rfqs_expired, 1);

    // B also dropped the request on its own side at the cutoff
    let supplier_b_expired = orchestrator
        .event_log()
        .events_for_agent("SUPPLIER_B")
        .into_iter()
        .filter(|e| e.event_type() == "MessageExpired")
        .count();
    assert_eq!(supplier_b_expired, 1);
}

#[test]
fn test_trade_completes_and_every_ledger_empties() {
    let mut orchestrator = Orchestrator::new(scenario()).unwrap();
    let summary = orchestrator.run().unwrap();

    // Buyer pays, then supplier A records the payment
    assert_eq!(summary.transactions_concluded, 2);
    assert!(summary.open_transactions.values().all(|&open| open == 0));
    assert_eq!(summary.open_transactions.len(), 4);

    // 3 RFQs, 2 quotes, order, confirmation, shipment, bill, payment
    assert_eq!(summary.messages_delivered, 10);

    let concluded: Vec<(&str, usize)> = orchestrator
        .event_log()
        .events()
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::TransactionPurged {
                    reason: PurgeReason::Concluded,
                    ..
                }
            )
        })
        .map(|e| (e.agent_id(), e.tick()))
        .collect();
    assert_eq!(concluded, vec![("BUYER", 73), ("SUPPLIER_A", 74)]);
}

#[test]
fn test_first_ticks_jump_to_due_work() {
    let mut orchestrator = Orchestrator::new(scenario()).unwrap();

    let first = orchestrator.tick().unwrap();
    assert_eq!(first.tick, 0);
    assert_eq!(first.num_wakeups, 1);

    // Three RFQ deliveries plus the two quotes sent without delay
    let second = orchestrator.tick().unwrap();
    assert_eq!(second.tick, 1);
    assert_eq!(second.num_deliveries, 3);
    assert_eq!(second.num_wakeups, 5);

    let third = orchestrator.tick().unwrap();
    assert_eq!(third.tick, 2);
    assert_eq!(third.num_deliveries, 2);
    assert_eq!(third.num_orders, 0);

    // Nothing happens until the decide timer
    let fourth = orchestrator.tick().unwrap();
    assert_eq!(fourth.tick, 48);
    assert_eq!(fourth.num_orders, 1);
}

#[test]
fn test_every_supplier_answering_decides_early() {
    let mut config = scenario();
    config.suppliers[1].silent = false;

    let mut orchestrator = Orchestrator::new(config).unwrap();
    let summary = orchestrator.run().unwrap();

    // All three quotes are in at tick 2; B is cheapest and on time
    assert_eq!(orders(&orchestrator), vec![(2, "SUPPLIER_B".to_string())]);
    assert_eq!(summary.rfqs_expired, 0);
    assert_eq!(summary.transactions_concluded, 2);
    assert!(summary.open_transactions.values().all(|&open| open == 0));
}

#[test]
fn test_wait_for_all_buyer_never_decides_with_silent_supplier() {
    let mut config = scenario();
    config.buyers[0].policy = QuotePolicyConfig::WaitForAll {
        selector: SelectorConfig::default(),
    };

    let mut orchestrator = Orchestrator::new(config).unwrap();
    let summary = orchestrator.run().unwrap();

    assert_eq!(summary.orders_emitted, 0);
    assert_eq!(summary.transactions_concluded, 0);
    assert_eq!(summary.rfqs_expired, 1);
    assert!(orchestrator
        .event_log()
        .events_of_type("NoValidQuote")
        .is_empty());

    // The demand lapses at 96 but C's quote stays open until 120; its
    // expiry leaves nothing live and clears the buyer's ledger
    assert!(orchestrator.event_log().events().iter().any(|e| matches!(
        e,
        Event::TransactionPurged {
            agent_id,
            reason: PurgeReason::Idle,
            tick: 120,
            ..
        } if agent_id == "BUYER"
    )));
    assert!(orchestrator
        .event_log()
        .events_for_agent("BUYER")
        .iter()
        .any(|e| matches!(
            e,
            Event::MessageExpired {
                kind: MessageKind::InternalDemand,
                tick: 96,
                ..
            }
        )));
    assert!(summary.open_transactions.values().all(|&open| open == 0));
}

#[test]
fn test_delivery_on_latest_tick_survives_demand_deadline() {
    let mut config = scenario();
    // Quote sent at 1 proposes delivery at 96, the demand's latest tick
    config.suppliers[0].offers[0].lead_time = 95;

    let mut orchestrator = Orchestrator::new(config).unwrap();
    let summary = orchestrator.run().unwrap();

    assert_eq!(orders(&orchestrator), vec![(48, "SUPPLIER_A".to_string())]);
    assert!(orchestrator
        .event_log()
        .events_of_type("MissingPredecessor")
        .is_empty());
    assert!(!orchestrator.event_log().events().iter().any(|e| matches!(
        e,
        Event::TransactionPurged {
            reason: PurgeReason::RootExpired,
            ..
        }
    )));

    let concluded: Vec<(&str, usize)> = orchestrator
        .event_log()
        .events()
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::TransactionPurged {
                    reason: PurgeReason::Concluded,
                    ..
                }
            )
        })
        .map(|e| (e.agent_id(), e.tick()))
        .collect();
    assert_eq!(concluded, vec![("BUYER", 97), ("SUPPLIER_A", 98)]);
    assert_eq!(summary.transactions_concluded, 2);
    assert!(summary.open_transactions.values().all(|&open| open == 0));
}

#[test]
fn test_max_ticks_stops_run() {
    let mut config = scenario();
    config.max_ticks = 50;

    let mut orchestrator = Orchestrator::new(config).unwrap();
    let summary = orchestrator.run().unwrap();

    assert_eq!(summary.orders_emitted, 1);
    assert_eq!(summary.rfqs_expired, 0);
    assert_eq!(summary.open_transactions["BUYER"], 1);
    assert!(orchestrator.pending_wakeups() > 0);
    assert_eq!(orchestrator.open_orders("BUYER").len(), 1);
}

#[test]
fn test_runs_are_deterministic() {
    let shape = |orchestrator: &Orchestrator| -> Vec<(usize, String, &'static str)> {
        orchestrator
            .event_log()
            .events()
            .iter()
            .map(|e| (e.tick(), e.agent_id().to_string(), e.event_type()))
            .collect()
    };

    let mut first = Orchestrator::new(scenario()).unwrap();
    let mut second = Orchestrator::new(scenario()).unwrap();
    let first_summary = first.run().unwrap();
    let second_summary = second.run().unwrap();

    assert_eq!(first_summary, second_summary);
    assert_eq!(shape(&first), shape(&second));
}
