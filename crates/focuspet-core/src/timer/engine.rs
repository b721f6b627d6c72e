//! Timer engine implementation.
//!
//! The timer engine is a countdown state machine over focus and break
//! periods. It does not use internal threads - the caller is responsible for
//! calling `tick()` once per elapsed second while it runs.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> ... (reset -> Idle/Focus)
//!
//! Focus --0s--> Break | LongBreak --0s--> Focus
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerConfig::default());
//! engine.start(&clock);
//! // Once per second:
//! engine.tick(&clock); // Returns Some(Event) when a period completes
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::schedule::{SessionMode, TimerConfig};
use crate::clock::Clock;
use crate::error::{Result, StateConflictError, ValidationError};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// The countdown currently in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub mode: SessionMode,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub completed_focus_count: u32,
}

impl Session {
    fn fresh(config: &TimerConfig) -> Self {
        Self {
            mode: SessionMode::Focus,
            remaining_secs: config.focus_secs,
            total_secs: config.focus_secs,
            completed_focus_count: 0,
        }
    }

    fn enter(&mut self, mode: SessionMode, config: &TimerConfig) {
        self.mode = mode;
        self.total_secs = config.duration_secs(mode);
        self.remaining_secs = self.total_secs;
    }
}

/// Core timer engine.
///
/// Serializable as a whole so hosts can persist it between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEngine {
    config: TimerConfig,
    state: TimerState,
    session: Session,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl TimerEngine {
    /// Create a new timer engine in `Idle` with a full focus period ready.
    ///
    /// The config is assumed valid; use [`TimerEngine::configure`] or
    /// [`TimerConfig::new`] for untrusted input.
    pub fn new(config: TimerConfig) -> Self {
        let session = Session::fresh(&config);
        Self {
            config,
            state: TimerState::Idle,
            session,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.session.mode
    }

    pub fn remaining_secs(&self) -> u64 {
        self.session.remaining_secs
    }

    pub fn total_secs(&self) -> u64 {
        self.session.total_secs
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.session.completed_focus_count
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// 0.0 .. 1.0 progress within the current period.
    pub fn progress(&self) -> f64 {
        let total = self.session.total_secs;
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.session.remaining_secs as f64 / total as f64)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, clock: &dyn Clock) -> Event {
        Event::StateSnapshot {
            state: self.state,
            mode: self.session.mode,
            remaining_secs: self.session.remaining_secs,
            total_secs: self.session.total_secs,
            completed_focus_count: self.session.completed_focus_count,
            progress: self.progress(),
            at: clock.now(),
        }
    }

    /// Check an engine restored from storage before driving it.
    ///
    /// # Errors
    /// A validation error for an invalid config or a session that config
    /// could not have produced.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.config.validate()?;
        let session = &self.session;
        let expected = self.config.duration_secs(session.mode);
        if session.total_secs != expected {
            return Err(ValidationError::invalid(
                "timer.session.total_secs",
                format!(
                    "{} does not match the {:?} duration {expected}",
                    session.total_secs, session.mode
                ),
            ));
        }
        if session.remaining_secs == 0 || session.remaining_secs > session.total_secs {
            return Err(ValidationError::invalid(
                "timer.session.remaining_secs",
                format!("{} is outside 1..={}", session.remaining_secs, session.total_secs),
            ));
        }
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Replace all three durations. Resets the session.
    ///
    /// # Errors
    /// Returns a validation error if any duration is zero; the engine is left
    /// untouched in that case.
    pub fn configure(
        &mut self,
        focus_secs: u64,
        break_secs: u64,
        long_break_secs: u64,
    ) -> Result<()> {
        let config = TimerConfig {
            focus_secs,
            break_secs,
            long_break_secs,
            ..self.config.clone()
        };
        self.set_config(config)
    }

    pub fn set_config(&mut self, config: TimerConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.state = TimerState::Idle;
        self.session = Session::fresh(&self.config);
        Ok(())
    }

    /// Begin or resume counting down. No-op while already running.
    pub fn start(&mut self, clock: &dyn Clock) -> Option<Event> {
        if self.state == TimerState::Running {
            return None;
        }
        self.state = TimerState::Running;
        Some(Event::TimerStarted {
            mode: self.session.mode,
            remaining_secs: self.session.remaining_secs,
            at: clock.now(),
        })
    }

    /// # Errors
    /// [`StateConflictError::TimerNotRunning`] unless the timer is running.
    pub fn pause(&mut self, clock: &dyn Clock) -> Result<Event> {
        if self.state != TimerState::Running {
            return Err(StateConflictError::TimerNotRunning.into());
        }
        self.state = TimerState::Paused;
        Ok(Event::TimerPaused {
            remaining_secs: self.session.remaining_secs,
            at: clock.now(),
        })
    }

    /// Back to Idle with a fresh focus period. Safe in any state.
    pub fn reset(&mut self, clock: &dyn Clock) -> Event {
        self.state = TimerState::Idle;
        self.session = Session::fresh(&self.config);
        Event::TimerReset { at: clock.now() }
    }

    /// Call once per elapsed second. Returns the completion event when a
    /// period runs out.
    pub fn tick(&mut self, clock: &dyn Clock) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.session.remaining_secs = self.session.remaining_secs.saturating_sub(1);
        if self.session.remaining_secs > 0 {
            return None;
        }
        Some(self.complete_period(clock))
    }

    /// Apply `secs` ticks at once, e.g. after the host was suspended.
    pub fn tick_for(&mut self, secs: u64, clock: &dyn Clock) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..secs {
            if self.state != TimerState::Running {
                break;
            }
            events.extend(self.tick(clock));
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_period(&mut self, clock: &dyn Clock) -> Event {
        let at = clock.now();
        if !self.config.auto_start_next {
            self.state = TimerState::Idle;
        }
        match self.session.mode {
            SessionMode::Focus => {
                self.session.completed_focus_count += 1;
                let next = self.config.break_after(self.session.completed_focus_count);
                self.session.enter(next, &self.config);
                debug!(
                    completed = self.session.completed_focus_count,
                    next = ?next,
                    "focus period completed"
                );
                Event::FocusCompleted {
                    mode: next,
                    completed_focus_count: self.session.completed_focus_count,
                    at,
                }
            }
            finished @ (SessionMode::Break | SessionMode::LongBreak) => {
                self.session.enter(SessionMode::Focus, &self.config);
                Event::BreakCompleted { finished, at }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn engine(focus: u64, brk: u64, long: u64) -> TimerEngine {
        TimerEngine::new(TimerConfig::new(focus, brk, long).unwrap())
    }

    #[test]
    fn start_pause_start() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = TimerEngine::default();
        assert_eq!(engine.state(), TimerState::Idle);

        assert!(engine.start(&clock).is_some());
        assert_eq!(engine.state(), TimerState::Running);
        assert!(engine.start(&clock).is_none());

        assert!(engine.pause(&clock).is_ok());
        assert_eq!(engine.state(), TimerState::Paused);
        assert!(engine.pause(&clock).is_err());

        assert!(engine.start(&clock).is_some());
        assert_eq!(engine.state(), TimerState::Running);
    }

    #[test]
    fn pause_freezes_remaining_time() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = engine(10, 5, 7);
        engine.start(&clock);
        engine.tick(&clock);
        engine.tick(&clock);
        engine.pause(&clock).unwrap();
        assert!(engine.tick(&clock).is_none());
        assert_eq!(engine.remaining_secs(), 8);
    }

    #[test]
    fn focus_completion_enters_break() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = engine(3, 2, 5);
        engine.start(&clock);
        assert!(engine.tick(&clock).is_none());
        assert!(engine.tick(&clock).is_none());
        match engine.tick(&clock) {
            Some(Event::FocusCompleted {
                mode,
                completed_focus_count,
                ..
            }) => {
                assert_eq!(mode, SessionMode::Break);
                assert_eq!(completed_focus_count, 1);
            }
            other => panic!("Expected FocusCompleted, got {other:?}"),
        }
        assert_eq!(engine.mode(), SessionMode::Break);
        assert_eq!(engine.remaining_secs(), 2);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn break_completion_returns_to_focus_without_reward() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = engine(1, 1, 1);
        engine.start(&clock);
        engine.tick(&clock);
        engine.start(&clock);
        match engine.tick(&clock) {
            Some(Event::BreakCompleted { finished, .. }) => {
                assert_eq!(finished, SessionMode::Break)
            }
            other => panic!("Expected BreakCompleted, got {other:?}"),
        }
        assert_eq!(engine.mode(), SessionMode::Focus);
        assert_eq!(engine.remaining_secs(), 1);
    }

    #[test]
    fn fourth_focus_leads_to_long_break() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = TimerEngine::new(TimerConfig {
            auto_start_next: true,
            ..TimerConfig::new(2, 1, 3).unwrap()
        });
        engine.start(&clock);
        let events = engine.tick_for(3 * 3 + 2, &clock);
        let modes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::FocusCompleted { mode, .. } => Some(*mode),
                _ => None,
            })
            .collect();
        assert_eq!(
            modes,
            vec![
                SessionMode::Break,
                SessionMode::Break,
                SessionMode::Break,
                SessionMode::LongBreak
            ]
        );
        assert_eq!(engine.mode(), SessionMode::LongBreak);
        assert_eq!(engine.total_secs(), 3);
    }

    #[test]
    fn reset_goes_to_fresh_focus() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = engine(1, 4, 9);
        engine.start(&clock);
        engine.tick(&clock);
        assert_eq!(engine.mode(), SessionMode::Break);
        engine.reset(&clock);
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.mode(), SessionMode::Focus);
        assert_eq!(engine.remaining_secs(), 1);
        assert_eq!(engine.completed_focus_count(), 0);
    }

    #[test]
    fn configure_rejects_zero_and_keeps_state() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = engine(10, 5, 7);
        engine.start(&clock);
        engine.tick(&clock);
        assert!(engine.configure(0, 5, 7).is_err());
        assert_eq!(engine.remaining_secs(), 9);
        assert_eq!(engine.state(), TimerState::Running);

        engine.configure(20, 5, 7).unwrap();
        assert_eq!(engine.remaining_secs(), 20);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn validate_rejects_impossible_sessions() {
        let clock = ManualClock::at_epoch_secs(0);
        let mut engine = engine(3, 2, 5);
        engine.start(&clock);
        engine.tick_for(3, &clock);
        assert!(engine.validate().is_ok());

        let mut json = serde_json::to_value(&engine).unwrap();
        json["session"]["remaining_secs"] = 9.into();
        let tampered: TimerEngine = serde_json::from_value(json).unwrap();
        assert!(tampered.validate().is_err());

        let mut json = serde_json::to_value(&engine).unwrap();
        json["config"]["focus_sessions_before_long_break"] = 0.into();
        let tampered: TimerEngine = serde_json::from_value(json).unwrap();
        assert!(tampered.validate().is_err());
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let clock = ManualClock::at_epoch_secs(0);
        let engine = TimerEngine::default();
        match engine.snapshot(&clock) {
            Event::StateSnapshot {
                state,
                mode,
                remaining_secs,
                ..
            } => {
                assert_eq!(state, TimerState::Idle);
                assert_eq!(mode, SessionMode::Focus);
                assert_eq!(remaining_secs, 25 * 60);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }
}
