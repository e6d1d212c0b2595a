//! Core simulation infrastructure: clock and callback scheduling

pub mod scheduler;
pub mod time;

pub use scheduler::{EventQueue, Scheduler, Timer, TimerHandle};
pub use time::{Tick, TimeManager};
