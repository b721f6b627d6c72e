//! TOML-based configuration for the rules engines.
//!
//! Holds the timer durations, reward policy, companion policy and an
//! optional lesson catalog override. Stored at
//! `~/.config/focuspet/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::data_dir;
use crate::companion::{CompanionPolicy, CompanionSimulator};
use crate::error::{ConfigError, Result, ValidationError};
use crate::ledger::{LedgerPolicy, RewardLedger};
use crate::lesson::LessonCatalog;
use crate::timer::TimerConfig;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Filter directive handed to the host's tracing subscriber.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub ledger: LedgerPolicy,
    #[serde(default)]
    pub companion: CompanionPolicy,
    /// Replaces the built-in lesson catalog when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessons: Option<LessonCatalog>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            timer: TimerConfig::default(),
            ledger: LedgerPolicy::default(),
            companion: CompanionPolicy::default(),
            lessons: None,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let unparsable =
            |kind: &str| ConfigError::ParseFailed(format!("cannot parse '{value}' as {kind}"));

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if part.is_empty() {
                return Err(unknown());
            }
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => {
                    serde_json::Value::Bool(value.parse().map_err(|_| unparsable("bool"))?)
                }
                serde_json::Value::Number(_) => match value.parse::<u64>() {
                    Ok(n) => serde_json::Value::Number(n.into()),
                    Err(_) => serde_json::Value::Number(
                        value.parse::<i64>().map_err(|_| unparsable("integer"))?.into(),
                    ),
                },
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value)
                        .map_err(|e| ConfigError::ParseFailed(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed or fails
    /// validation, or if defaults cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_failed(e.to_string()))?;
        let cfg: Config = toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
        cfg.validate().map_err(|e| load_failed(e.to_string()))?;
        Ok(cfg)
    }

    /// Persist to the default location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|err| {
            warn!(%err, "using default configuration");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The change is kept only if the
    /// resulting config still validates; nothing is written to disk.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the new config is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// # Errors
    /// The first invalid section, as a [`ValidationError`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.timer.validate()?;
        self.ledger.validate()?;
        self.companion.validate()?;
        if let Some(lessons) = &self.lessons {
            lessons.validate()?;
        }
        Ok(())
    }

    pub fn catalog(&self) -> LessonCatalog {
        self.lessons.clone().unwrap_or_default()
    }

    /// # Errors
    /// Returns an error if the ledger section is invalid.
    pub fn reward_ledger(&self) -> Result<RewardLedger> {
        RewardLedger::new(self.ledger.clone(), self.catalog())
    }

    /// # Errors
    /// Returns an error if the companion section is invalid.
    pub fn companion_simulator(&self) -> Result<CompanionSimulator> {
        CompanionSimulator::new(self.companion.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::lesson::Lesson;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nfocus_secs = 600\n").unwrap();
        assert_eq!(parsed.timer.focus_secs, 600);
        assert_eq!(parsed.timer.break_secs, 300);
        assert_eq!(parsed.ledger.max_daily_focus_claims, 10);
        assert_eq!(parsed.companion.mint_price, 50);
        assert_eq!(parsed.log_level, "info");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.focus_secs").as_deref(), Some("1500"));
        assert_eq!(cfg.get("timer.auto_start_next").as_deref(), Some("false"));
        assert_eq!(cfg.get("log_level").as_deref(), Some("info"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("ledger.focus_reward_max", "8").unwrap();
        cfg.set("timer.auto_start_next", "true").unwrap();
        cfg.set("ledger.utc_offset_minutes", "-300").unwrap();
        assert_eq!(cfg.ledger.focus_reward_max, 8);
        assert!(cfg.timer.auto_start_next);
        assert_eq!(cfg.ledger.utc_offset_minutes, -300);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(CoreError::Config(ConfigError::UnknownKey(_)))
        ));
        assert!(matches!(
            cfg.set("timer.auto_start_next", "maybe"),
            Err(CoreError::Config(ConfigError::ParseFailed(_)))
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_values_that_break_validation() {
        let mut cfg = Config::default();
        let err = cfg.set("timer.focus_secs", "0").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(cfg.timer.focus_secs, 1500);
        assert!(cfg.set("ledger.focus_reward_min", "9").is_err());
    }

    #[test]
    fn save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.companion.mint_price = 75;
        cfg.lessons = Some(
            LessonCatalog::new(vec![Lesson::new(7, "Custom", 2, 30, 12)]).unwrap(),
        );
        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.catalog().len(), 1);
    }

    #[test]
    fn load_from_rejects_invalid_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ledger]\nfocus_reward_min = 6\nfocus_reward_max = 5\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn builds_engines_from_sections() {
        let cfg = Config::default();
        assert_eq!(cfg.reward_ledger().unwrap().catalog().len(), 6);
        assert_eq!(cfg.companion_simulator().unwrap().policy().mint_price, 50);
    }
}
