use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Focus,
    Break,
    LongBreak,
}

impl SessionMode {
    pub fn is_break(&self) -> bool {
        matches!(self, SessionMode::Break | SessionMode::LongBreak)
    }
}

/// Durations and cycle shape of the focus/break loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus_secs")]
    pub focus_secs: u64,
    #[serde(default = "default_break_secs")]
    pub break_secs: u64,
    #[serde(default = "default_long_break_secs")]
    pub long_break_secs: u64,
    #[serde(default = "default_focus_sessions_before_long_break")]
    pub focus_sessions_before_long_break: u32,
    /// Keep running into the next period instead of stopping at Idle.
    #[serde(default)]
    pub auto_start_next: bool,
}

fn default_focus_secs() -> u64 {
    25 * 60
}
fn default_break_secs() -> u64 {
    5 * 60
}
fn default_long_break_secs() -> u64 {
    15 * 60
}
fn default_focus_sessions_before_long_break() -> u32 {
    4
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_secs: default_focus_secs(),
            break_secs: default_break_secs(),
            long_break_secs: default_long_break_secs(),
            focus_sessions_before_long_break: default_focus_sessions_before_long_break(),
            auto_start_next: false,
        }
    }
}

impl TimerConfig {
    /// Build a validated config with the default cycle shape.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidValue`] if any duration is zero.
    pub fn new(
        focus_secs: u64,
        break_secs: u64,
        long_break_secs: u64,
    ) -> Result<Self, ValidationError> {
        let config = Self {
            focus_secs,
            break_secs,
            long_break_secs,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("focus_secs", self.focus_secs),
            ("break_secs", self.break_secs),
            ("long_break_secs", self.long_break_secs),
        ] {
            if value == 0 {
                return Err(ValidationError::invalid(field, "duration must be positive"));
            }
        }
        if self.focus_sessions_before_long_break == 0 {
            return Err(ValidationError::invalid(
                "focus_sessions_before_long_break",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn duration_secs(&self, mode: SessionMode) -> u64 {
        match mode {
            SessionMode::Focus => self.focus_secs,
            SessionMode::Break => self.break_secs,
            SessionMode::LongBreak => self.long_break_secs,
        }
    }

    /// The break that follows the `completed`-th finished focus period.
    /// A zero cycle length never yields a long break.
    pub fn break_after(&self, completed: u32) -> SessionMode {
        match completed.checked_rem(self.focus_sessions_before_long_break) {
            Some(0) => SessionMode::LongBreak,
            _ => SessionMode::Break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_durations() {
        assert!(TimerConfig::new(0, 300, 900).is_err());
        assert!(TimerConfig::new(1500, 0, 900).is_err());
        assert!(TimerConfig::new(1500, 300, 0).is_err());
        assert!(TimerConfig::new(1, 1, 1).is_ok());
    }

    #[test]
    fn every_fourth_break_is_long() {
        let config = TimerConfig::default();
        assert_eq!(config.break_after(1), SessionMode::Break);
        assert_eq!(config.break_after(3), SessionMode::Break);
        assert_eq!(config.break_after(4), SessionMode::LongBreak);
        assert_eq!(config.break_after(8), SessionMode::LongBreak);
    }

    #[test]
    fn zero_cycle_length_does_not_panic() {
        let config = TimerConfig {
            focus_sessions_before_long_break: 0,
            ..TimerConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.break_after(4), SessionMode::Break);
    }
}
