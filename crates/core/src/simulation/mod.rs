//! Match simulation: per-minute event sampling, the per-match lifecycle and
//! the periodic tick over every live match.

pub mod generator;
pub mod lifecycle;
pub mod scheduler;

pub use generator::{EventGenerator, SampledEvent, EVENT_BANDS};
pub use lifecycle::{close_period, step, AdvanceError, LifecycleDriver, LifecycleRules, Step};
pub use scheduler::{TickOutcome, TickReport, TickScheduler};
