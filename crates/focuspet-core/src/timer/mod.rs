mod engine;
mod schedule;

pub use engine::{Session, TimerEngine, TimerState};
pub use schedule::{SessionMode, TimerConfig};
