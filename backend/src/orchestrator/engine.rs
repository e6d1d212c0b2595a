//! Orchestrator Engine - Negotiation Simulation Loop
//!
//! Deterministic discrete-event driver around the per-agent message stores.
//! It plays the collaborators the negotiation subsystem consumes: the
//! scheduler, message transport, and scripted counterparties.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//! ├─ TimeManager (tick/day tracking)
//! ├─ Agents (buyers + suppliers, one MessageStore each)
//! ├─ MarketDirectory (locations, reference prices)
//! ├─ EventQueue<Wakeup> (demands, deliveries, planned sends, timers)
//! └─ EventLog (aggregated from every agent's store)
//! ```
//!
//! # Tick Loop Algorithm
//!
//! ```text
//! for each tick with due wakeups:
//!   1. Pop every wakeup due at this tick (FIFO within the tick)
//!      - Demand:  buyer raises a demand and sends RFQs
//!      - Deliver: receiver records the message, scripts/policies react
//!      - Send:    a planned message is recorded by its sender and shipped
//!      - Timer:   routed back to the owning agent
//!   2. Drain agent event logs into the global log (agent id order)
//!   3. Advance time to the next due tick
//! ```
//!
//! # Example
//!
//! ```rust
//! use trade_negotiation_core_rs::orchestrator::{Orchestrator, OrchestratorConfig};
//!
//! let config = OrchestratorConfig {
//!     ticks_per_day: 24,
//!     max_ticks: 24 * 10,
//!     message_latency: 1,
//!     products: vec![],
//!     buyers: vec![],
//!     suppliers: vec![],
//!     demands: vec![],
//! };
//!
//! let mut orchestrator = Orchestrator::new(config).unwrap();
//! let summary = orchestrator.run().unwrap();
//! assert_eq!(summary.orders_emitted, 0);
//! ```

use crate::core::scheduler::{EventQueue, Scheduler, Timer, TimerHandle};
use crate::core::time::{Tick, TimeManager};
use crate::models::agent::Agent;
use crate::models::event::{Event, EventLog, PurgeReason};
use crate::models::message::{
    DemandTerms, Direction, LogicalKind, MessageBody, MessageKind, RfqTerms, TradeMessage,
};
use crate::orchestrator::checkpoint::{
    compute_config_hash, validate_snapshot, PendingWakeup, StateSnapshot, StoreSnapshot,
};
use crate::orchestrator::scripts::{buyer_reply, supplier_reply};
use crate::policy::{create_policy, Location, MarketDirectory, QuotePolicyConfig};
use crate::store::{ExpiryConfig, MessageStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Complete orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of ticks per simulated day (also the expiry grace period)
    pub ticks_per_day: usize,

    /// Last tick the simulation may process
    pub max_ticks: usize,

    /// Ticks between sending and delivering a message
    #[serde(default = "default_latency")]
    pub message_latency: usize,

    #[serde(default)]
    pub products: Vec<ProductConfig>,

    #[serde(default)]
    pub buyers: Vec<BuyerConfig>,

    #[serde(default)]
    pub suppliers: Vec<SupplierConfig>,

    #[serde(default)]
    pub demands: Vec<DemandConfig>,
}

fn default_latency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Tradable product with its reference market price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductConfig {
    pub id: String,
    /// Market price of one unit (cents)
    pub unit_market_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerConfig {
    pub id: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub policy: QuotePolicyConfig,
}

/// Scripted supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierConfig {
    pub id: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub offers: Vec<OfferConfig>,
    /// Never answers requests for quote
    #[serde(default)]
    pub silent: bool,
    /// Confirms, ships and bills received orders
    #[serde(default = "default_true")]
    pub confirms_orders: bool,
}

impl SupplierConfig {
    pub fn offer_for(&self, product_id: &str) -> Option<&OfferConfig> {
        self.offers.iter().find(|o| o.product_id == product_id)
    }
}

/// Terms a supplier quotes for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferConfig {
    pub product_id: String,
    /// Price per unit (cents)
    pub unit_price: i64,
    /// Ticks from quoting to delivery
    pub lead_time: usize,
    /// Ticks the quote stays valid
    pub validity: usize,
    /// Ticks between receiving an RFQ and sending the quote
    #[serde(default)]
    pub response_delay: usize,
    /// Largest amount quoted; larger requests are quoted partially
    #[serde(default)]
    pub max_amount: Option<u64>,
}

/// Demand injected into a buyer at a fixed tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandConfig {
    pub buyer_id: String,
    pub product_id: String,
    pub amount: u64,
    pub arrival_tick: usize,
    /// RFQ cutoff, relative to arrival
    pub cutoff_after: usize,
    /// Latest acceptable delivery, relative to arrival
    pub latest_delivery_after: usize,
    /// Suppliers to ask; `None` asks every supplier offering the product
    #[serde(default)]
    pub suppliers: Option<Vec<String>>,
}

// ============================================================================
// Results and Errors
// ============================================================================

/// Result of a single processed tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    pub tick: usize,
    /// Wakeups processed at this tick
    pub num_wakeups: usize,
    pub num_deliveries: usize,
    pub num_orders: usize,
    pub num_expirations: usize,
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub final_tick: usize,
    pub ticks_processed: usize,
    pub messages_delivered: usize,
    pub orders_emitted: usize,
    pub transactions_concluded: usize,
    pub rfqs_expired: usize,
    /// Open transactions left in each agent's ledger
    pub open_transactions: BTreeMap<String, usize>,
    pub total_events: usize,
}

/// Simulation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("State validation error: {0}")]
    StateValidationError(String),
}

// ============================================================================
// Wakeups
// ============================================================================

/// Work item in the global event queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Wakeup {
    /// Inject the configured demand with this index
    Demand { index: usize },
    /// Hand a message to its receiver
    Deliver { message: TradeMessage },
    /// Record and transport a message planned by a script
    Send { message: TradeMessage },
    /// Timer scheduled by an agent's store or policy
    Timer { agent_id: String, timer: Timer },
}

/// Scheduler view handed to one agent: tags its timers with the agent id
struct AgentScheduler<'q> {
    queue: &'q mut EventQueue<Wakeup>,
    agent_id: &'q str,
}

impl Scheduler for AgentScheduler<'_> {
    fn schedule_at(&mut self, tick: Tick, timer: Timer) -> TimerHandle {
        self.queue.push(
            tick,
            Wakeup::Timer {
                agent_id: self.agent_id.to_string(),
                timer,
            },
        )
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.remove(handle)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Main simulation orchestrator
pub struct Orchestrator {
    config: OrchestratorConfig,
    config_hash: String,
    time_manager: TimeManager,
    agents: BTreeMap<String, Agent>,
    suppliers: BTreeMap<String, SupplierConfig>,
    market: MarketDirectory,
    queue: EventQueue<Wakeup>,
    event_log: EventLog,
    ticks_processed: usize,
    messages_delivered: usize,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Validates the configuration, creates one agent per buyer and supplier,
    /// and queues every configured demand at its arrival tick.
    pub fn new(config: OrchestratorConfig) -> Result<Self, SimulationError> {
        let mut orchestrator = Self::build(config)?;
        for (index, demand) in orchestrator.config.demands.iter().enumerate() {
            orchestrator
                .queue
                .push(demand.arrival_tick, Wakeup::Demand { index });
        }
        Ok(orchestrator)
    }

    fn build(config: OrchestratorConfig) -> Result<Self, SimulationError> {
        Self::validate_config(&config)?;
        let config_hash = compute_config_hash(&config)?;

        // One day of grace on top of every cutoff
        let time_manager = TimeManager::new(config.ticks_per_day);
        let expiry = ExpiryConfig {
            grace_ticks: time_manager.days(1),
        };

        let mut market = MarketDirectory::new();
        for product in &config.products {
            market.set_price(product.id.clone(), product.unit_market_price);
        }

        let mut agents = BTreeMap::new();
        for buyer in &config.buyers {
            market.set_location(buyer.id.clone(), buyer.location);
            let agent = Agent::new(buyer.id.clone(), buyer.location, expiry.clone())
                .with_policy(create_policy(&buyer.policy));
            agents.insert(buyer.id.clone(), agent);
        }

        let mut suppliers = BTreeMap::new();
        for supplier in &config.suppliers {
            market.set_location(supplier.id.clone(), supplier.location);
            agents.insert(
                supplier.id.clone(),
                Agent::new(supplier.id.clone(), supplier.location, expiry.clone()),
            );
            suppliers.insert(supplier.id.clone(), supplier.clone());
        }

        Ok(Self {
            time_manager,
            config,
            config_hash,
            agents,
            suppliers,
            market,
            queue: EventQueue::new(),
            event_log: EventLog::new(),
            ticks_processed: 0,
            messages_delivered: 0,
        })
    }

    fn validate_config(config: &OrchestratorConfig) -> Result<(), SimulationError> {
        if config.ticks_per_day == 0 {
            return Err(SimulationError::InvalidConfig(
                "ticks_per_day must be > 0".to_string(),
            ));
        }

        // Check for duplicate agent IDs across buyers and suppliers
        let mut ids = HashSet::new();
        let all_ids = config
            .buyers
            .iter()
            .map(|b| &b.id)
            .chain(config.suppliers.iter().map(|s| &s.id));
        for id in all_ids {
            if !ids.insert(id.as_str()) {
                return Err(SimulationError::InvalidConfig(format!(
                    "Duplicate agent ID: {}",
                    id
                )));
            }
        }

        let products: HashSet<&str> = config.products.iter().map(|p| p.id.as_str()).collect();
        for product in &config.products {
            if product.unit_market_price.is_nan() || product.unit_market_price <= 0.0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "Product {} must have a positive market price",
                    product.id
                )));
            }
        }

        for demand in &config.demands {
            if !config.buyers.iter().any(|b| b.id == demand.buyer_id) {
                return Err(SimulationError::InvalidConfig(format!(
                    "Demand references unknown buyer: {}",
                    demand.buyer_id
                )));
            }
            if !products.contains(demand.product_id.as_str()) {
                return Err(SimulationError::InvalidConfig(format!(
                    "Demand references unknown product: {}",
                    demand.product_id
                )));
            }
            if demand.amount == 0 {
                return Err(SimulationError::InvalidConfig(
                    "Demand amount must be > 0".to_string(),
                ));
            }
            for supplier_id in demand.suppliers.iter().flatten() {
                if !config.suppliers.iter().any(|s| &s.id == supplier_id) {
                    return Err(SimulationError::InvalidConfig(format!(
                        "Demand references unknown supplier: {}",
                        supplier_id
                    )));
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn current_tick(&self) -> usize {
        self.time_manager.current_tick()
    }

    pub fn current_day(&self) -> usize {
        self.time_manager.current_day()
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(|k| k.as_str())
    }

    pub fn market(&self) -> &MarketDirectory {
        &self.market
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Wakeups still queued
    pub fn pending_wakeups(&self) -> usize {
        self.queue.len()
    }

    pub fn is_finished(&self) -> bool {
        match self.queue.next_tick() {
            None => true,
            Some(tick) => tick > self.config.max_ticks,
        }
    }

    // ========================================================================
    // Main Loop
    // ========================================================================

    /// Run until nothing is left to do or `max_ticks` is passed
    pub fn run(&mut self) -> Result<SimulationSummary, SimulationError> {
        while !self.is_finished() {
            self.tick()?;
        }
        info!(
            tick = self.current_tick(),
            orders = self.orders_emitted(),
            "simulation finished"
        );
        Ok(self.summary())
    }

    /// Process the next tick that has due wakeups
    ///
    /// Time jumps straight to that tick; idle ticks are skipped.
    pub fn tick(&mut self) -> Result<TickResult, SimulationError> {
        if let Some(next) = self.queue.next_tick() {
            if next > self.time_manager.current_tick() {
                self.time_manager.advance_to(next);
            }
        }
        let now = self.time_manager.current_tick();
        debug!(
            tick = now,
            day = self.time_manager.current_day(),
            within_day = self.time_manager.tick_within_day(),
            "processing tick"
        );

        let mut result = TickResult {
            tick: now,
            num_wakeups: 0,
            num_deliveries: 0,
            num_orders: 0,
            num_expirations: 0,
        };

        while let Some((_, wakeup)) = self.queue.pop_due(now) {
            result.num_wakeups += 1;
            self.handle(wakeup, now, &mut result)?;
        }

        for agent in self.agents.values_mut() {
            let mut events = agent.store_mut().take_events();
            result.num_orders += events.events_of_type("OrderEmitted").len();
            result.num_expirations += events.events_of_type("MessageExpired").len();
            self.event_log.append(&mut events);
        }

        self.ticks_processed += 1;
        self.time_manager.advance_tick();
        Ok(result)
    }

    fn handle(
        &mut self,
        wakeup: Wakeup,
        now: Tick,
        result: &mut TickResult,
    ) -> Result<(), SimulationError> {
        match wakeup {
            Wakeup::Demand { index } => self.inject_demand(index, now),
            Wakeup::Deliver { message } => {
                result.num_deliveries += 1;
                self.messages_delivered += 1;
                self.deliver(message, now)
            }
            Wakeup::Send { message } => self.send(message, now),
            Wakeup::Timer { agent_id, timer } => {
                let agent = self
                    .agents
                    .get_mut(&agent_id)
                    .ok_or_else(|| SimulationError::AgentNotFound(agent_id.clone()))?;
                let mut scheduler = AgentScheduler {
                    queue: &mut self.queue,
                    agent_id: &agent_id,
                };
                let outgoing = agent.on_timer(timer, now, &mut scheduler, &self.market);
                self.transport(outgoing, now);
                Ok(())
            }
        }
    }

    fn inject_demand(&mut self, index: usize, now: Tick) -> Result<(), SimulationError> {
        let demand = self.config.demands.get(index).cloned().ok_or_else(|| {
            SimulationError::InvalidConfig(format!("Demand index out of range: {}", index))
        })?;

        // Local yellow pages: every supplier carrying the product
        let supplier_ids: Vec<String> = match &demand.suppliers {
            Some(ids) => ids.clone(),
            None => self
                .suppliers
                .values()
                .filter(|s| s.offer_for(&demand.product_id).is_some())
                .map(|s| s.id.clone())
                .collect(),
        };

        let agent = self
            .agents
            .get_mut(&demand.buyer_id)
            .ok_or_else(|| SimulationError::AgentNotFound(demand.buyer_id.clone()))?;
        let mut scheduler = AgentScheduler {
            queue: &mut self.queue,
            agent_id: &demand.buyer_id,
        };

        let latest_delivery_tick = now.saturating_add(demand.latest_delivery_after);
        let root = agent.raise_demand(
            DemandTerms {
                product_id: demand.product_id.clone(),
                amount: demand.amount,
                latest_delivery_tick,
            },
            now,
            &mut scheduler,
        );

        if supplier_ids.is_empty() {
            warn!(buyer = %demand.buyer_id, product = %demand.product_id, "no supplier carries the product");
        }

        let mut outgoing = Vec::with_capacity(supplier_ids.len());
        for supplier_id in supplier_ids {
            let rfq = TradeMessage::reply(
                &root,
                demand.buyer_id.clone(),
                supplier_id,
                now,
                MessageBody::RequestForQuote(RfqTerms {
                    product_id: demand.product_id.clone(),
                    amount: demand.amount,
                    cutoff_tick: now.saturating_add(demand.cutoff_after),
                    latest_delivery_tick,
                }),
            )
            .map_err(|e| SimulationError::InvalidConfig(e.to_string()))?;
            agent.send(rfq.clone(), now, &mut scheduler);
            outgoing.push(rfq);
        }

        info!(
            buyer = %demand.buyer_id,
            demand = root.id(),
            rfqs = outgoing.len(),
            "demand raised"
        );
        self.transport(outgoing, now);
        Ok(())
    }

    fn deliver(&mut self, message: TradeMessage, now: Tick) -> Result<(), SimulationError> {
        let receiver_id = message.receiver_id().to_string();
        let agent = self
            .agents
            .get_mut(&receiver_id)
            .ok_or_else(|| SimulationError::AgentNotFound(receiver_id.clone()))?;
        let mut scheduler = AgentScheduler {
            queue: &mut self.queue,
            agent_id: &receiver_id,
        };

        debug!(to = %receiver_id, kind = ?message.kind(), "delivering message");
        let planned = match self.suppliers.get(&receiver_id) {
            Some(supplier) => supplier_reply(supplier, &message, now, self.config.ticks_per_day),
            None => buyer_reply(&receiver_id, &message, now).into_iter().collect(),
        };
        let outgoing = agent.receive(message, now, &mut scheduler, &self.market);

        for (tick, planned_message) in planned {
            self.queue.push(tick, Wakeup::Send {
                message: planned_message,
            });
        }
        self.transport(outgoing, now);
        Ok(())
    }

    fn send(&mut self, message: TradeMessage, now: Tick) -> Result<(), SimulationError> {
        let sender_id = message.sender_id().to_string();
        let agent = self
            .agents
            .get_mut(&sender_id)
            .ok_or_else(|| SimulationError::AgentNotFound(sender_id.clone()))?;
        let mut scheduler = AgentScheduler {
            queue: &mut self.queue,
            agent_id: &sender_id,
        };
        agent.send(message.clone(), now, &mut scheduler);
        self.transport(vec![message], now);
        Ok(())
    }

    /// Queue messages for delivery after the configured latency
    fn transport(&mut self, messages: Vec<TradeMessage>, now: Tick) {
        for message in messages {
            self.queue.push(
                now.saturating_add(self.config.message_latency),
                Wakeup::Deliver { message },
            );
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn orders_emitted(&self) -> usize {
        self.event_log.events_of_type("OrderEmitted").len()
    }

    /// Summary of everything processed so far
    pub fn summary(&self) -> SimulationSummary {
        let concluded = self
            .event_log
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
            .count();
        let rfqs_expired = self
            .event_log
            .events()
            .iter()
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
            .count();

        SimulationSummary {
            final_tick: self.current_tick(),
            ticks_processed: self.ticks_processed,
            messages_delivered: self.messages_delivered,
            orders_emitted: self.orders_emitted(),
            transactions_concluded: concluded,
            rfqs_expired,
            open_transactions: self
                .agents
                .iter()
                .map(|(id, a)| (id.clone(), a.store().ledger().len()))
                .collect(),
            total_events: self.event_log.len(),
        }
    }

    /// Orders recorded as sent by a buyer, across its open transactions
    pub fn open_orders(&self, buyer_id: &str) -> Vec<&TradeMessage> {
        let Some(agent) = self.agents.get(buyer_id) else {
            return Vec::new();
        };
        let ledger = agent.store().ledger();
        ledger
            .transaction_ids()
            .flat_map(|id| ledger.query(id, LogicalKind::Order, Some(Direction::Sent)))
            .collect()
    }

    // ========================================================================
    // Checkpointing
    // ========================================================================

    /// Capture the current state
    ///
    /// Timers are not captured; they are re-armed from the stores on load.
    pub fn save_state(&self) -> StateSnapshot {
        let agents = self
            .agents
            .values()
            .map(|agent| {
                let decided = agent
                    .policy()
                    .map(|p| p.decider().decided().map(|s| s.to_string()).collect())
                    .unwrap_or_default();
                StoreSnapshot::capture(agent.store(), decided)
            })
            .collect();

        let pending = self
            .queue
            .iter()
            .filter(|(_, wakeup)| !matches!(wakeup, Wakeup::Timer { .. }))
            .map(|(tick, wakeup)| PendingWakeup {
                tick,
                wakeup: wakeup.clone(),
            })
            .collect();

        StateSnapshot {
            current_tick: self.current_tick(),
            current_day: self.current_day(),
            agents,
            pending,
            config_hash: self.config_hash.clone(),
        }
    }

    /// Rebuild an orchestrator from `config` and a snapshot taken with it
    ///
    /// # Errors
    /// `StateValidationError` if the snapshot was taken with a different
    /// config or fails integrity checks.
    pub fn load_state(
        config: OrchestratorConfig,
        snapshot: StateSnapshot,
    ) -> Result<Self, SimulationError> {
        let mut orchestrator = Self::build(config)?;
        if snapshot.config_hash != orchestrator.config_hash {
            return Err(SimulationError::StateValidationError(
                "Config hash mismatch".to_string(),
            ));
        }
        validate_snapshot(&snapshot)?;

        orchestrator.time_manager.advance_to(snapshot.current_tick);
        let now = snapshot.current_tick;
        let grace = orchestrator.time_manager.days(1);

        for store_snapshot in snapshot.agents {
            let agent_id = store_snapshot.agent_id.clone();
            let agent = orchestrator
                .agents
                .get_mut(&agent_id)
                .ok_or_else(|| SimulationError::AgentNotFound(agent_id.clone()))?;

            let (store, decided): (MessageStore, Vec<String>) =
                store_snapshot.restore(ExpiryConfig { grace_ticks: grace });
            *agent.store_mut() = store;
            if let Some(policy) = agent.policy_mut() {
                for demand_id in decided {
                    policy.decider_mut().mark_decided(demand_id);
                }
            }

            let mut scheduler = AgentScheduler {
                queue: &mut orchestrator.queue,
                agent_id: &agent_id,
            };
            agent.rearm(now, &mut scheduler, &orchestrator.market);
        }

        for pending in snapshot.pending {
            orchestrator.queue.push(pending.tick, pending.wakeup);
        }

        Ok(orchestrator)
    }
}
