//! Time management for the simulation
//!
//! The simulation operates in discrete ticks. Multiple ticks form a day.
//! Every "one day" grace period in the negotiation deadlines is
//! `ticks_per_day` ticks.

use serde::{Deserialize, Serialize};

/// Simulation timestamp in ticks since start
pub type Tick = usize;

/// Manages simulation time in discrete ticks and days
///
/// # Example
/// ```
/// use trade_negotiation_core_rs::TimeManager;
///
/// let mut time = TimeManager::new(24); // 24 ticks per day
/// assert_eq!(time.current_tick(), 0);
/// assert_eq!(time.current_day(), 0);
///
/// time.advance_to(30);
/// assert_eq!(time.current_day(), 1);
/// assert_eq!(time.tick_within_day(), 6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeManager {
    /// Total ticks elapsed since simulation start
    current_tick: Tick,
    /// Number of ticks in one day
    ticks_per_day: usize,
}

impl TimeManager {
    /// Create a new TimeManager
    ///
    /// # Arguments
    /// * `ticks_per_day` - Number of ticks in one simulated day
    pub fn new(ticks_per_day: usize) -> Self {
        assert!(ticks_per_day > 0, "ticks_per_day must be positive");
        Self {
            current_tick: 0,
            ticks_per_day,
        }
    }

    /// Advance time by one tick
    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    /// Jump directly to `tick`
    ///
    /// The scheduler hands out events in tick order, so the clock only ever
    /// moves forward.
    ///
    /// # Panics
    /// Panics if `tick` is earlier than the current tick.
    ///
    /// # Example
    /// ```
    /// use trade_negotiation_core_rs::TimeManager;
    ///
    /// let mut time = TimeManager::new(10);
    /// time.advance_to(25);
    /// assert_eq!(time.current_tick(), 25);
    /// ```
    pub fn advance_to(&mut self, tick: Tick) {
        assert!(
            tick >= self.current_tick,
            "time cannot move backwards (now {}, requested {})",
            self.current_tick,
            tick
        );
        self.current_tick = tick;
    }

    /// Get the current tick (total ticks since start)
    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Get the current day (0-indexed)
    pub fn current_day(&self) -> usize {
        self.current_tick / self.ticks_per_day
    }

    /// Get the tick within the current day (0-indexed)
    pub fn tick_within_day(&self) -> usize {
        self.current_tick % self.ticks_per_day
    }

    /// Get ticks per day
    pub fn ticks_per_day(&self) -> usize {
        self.ticks_per_day
    }

    /// Convert a number of days into ticks
    ///
    /// # Example
    /// ```
    /// use trade_negotiation_core_rs::TimeManager;
    ///
    /// let time = TimeManager::new(24);
    /// assert_eq!(time.days(3), 72);
    /// ```
    pub fn days(&self, days: usize) -> Tick {
        days * self.ticks_per_day
    }
}
