mod engine;
pub mod state;

pub use engine::{Effect, TimerEngine, Transition};
pub use state::{Status, TimerState, DEFAULT_TOTAL_DURATION_MS, MAX_TOTAL_DURATION_MS};
