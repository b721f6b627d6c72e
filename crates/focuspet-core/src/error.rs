//! Core error types for focuspet-core.
//!
//! Rule failures are split by kind so callers can decide how to react
//! without string matching:
//!
//! - [`ValidationError`]: malformed input or configuration
//! - [`StateConflictError`]: operation invalid in the current state
//! - [`RateLimitedError`]: retriable after a cooldown
//! - [`InsufficientResourceError`]: not enough currency
//! - [`TerminalStateError`]: the companion is dead
//!
//! Every variant maps to a stable message key via [`CoreError::message_key`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focuspet-core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State conflict: {0}")]
    StateConflict(#[from] StateConflictError),

    #[error("Rate limited: {0}")]
    RateLimited(#[from] RateLimitedError),

    #[error("Insufficient resource: {0}")]
    InsufficientResource(#[from] InsufficientResourceError),

    #[error("Terminal state: {0}")]
    TerminalState(#[from] TerminalStateError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The authoritative ledger refused an operation the local rules accepted.
    #[error("Relay rejected '{operation}': {message}")]
    Relay { operation: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error taxonomy exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    StateConflict,
    RateLimited,
    InsufficientResource,
    TerminalState,
    /// Storage, configuration, relay or serialization failure.
    Infrastructure,
}

/// Malformed configuration or input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown lesson {lesson_id}")]
    UnknownLesson { lesson_id: u32 },

    #[error("Page {page} is outside 1..={total_pages}")]
    PageOutOfRange { page: u32, total_pages: u32 },
}

/// Operation not valid in the current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateConflictError {
    #[error("Lesson {open_lesson} is already in progress (requested {requested})")]
    SessionConflict { open_lesson: u32, requested: u32 },

    #[error("No learning session is open for lesson {lesson_id}")]
    NoActiveSession { lesson_id: u32 },

    #[error("Open session is for lesson {open_lesson}, not {requested}")]
    LessonMismatch { open_lesson: u32, requested: u32 },

    #[error("Cannot jump to page {requested}; furthest page reached is {max_reached}")]
    NonSequentialProgress { requested: u32, max_reached: u32 },

    #[error("Studied {studied_secs}s, at least {required_secs}s required")]
    StudyTimeTooShort { studied_secs: u64, required_secs: u64 },

    #[error("Reached page {reached} of {total}")]
    IncompletePages { reached: u32, total: u32 },

    #[error("Reward for lesson {lesson_id} was already claimed")]
    AlreadyClaimed { lesson_id: u32 },

    #[error("Certificate for lesson {lesson_id} was already issued")]
    CertificateExists { lesson_id: u32 },

    #[error("Timer is not running")]
    TimerNotRunning,

    #[error("Companion {companion_id} not found")]
    CompanionNotFound { companion_id: u64 },

    #[error("Companion {companion_id} is still alive")]
    CompanionAlive { companion_id: u64 },

    #[error("Task {task_id} not found")]
    TaskNotFound { task_id: u64 },
}

/// Retriable once the cooldown has passed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitedError {
    #[error("Focus rewards are spaced out; retry in {retry_after_secs}s")]
    IntervalTooShort { retry_after_secs: u64 },

    #[error("Daily limit of {limit} focus rewards reached; retry in {retry_after_secs}s")]
    DailyLimitReached { limit: u32, retry_after_secs: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InsufficientResourceError {
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: u64, available: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminalStateError {
    #[error("Companion {companion_id} has died")]
    CompanionDead { companion_id: u64 },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Could not determine the data directory")]
    NoDataDir,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::StateConflict(_) => ErrorKind::StateConflict,
            CoreError::RateLimited(_) => ErrorKind::RateLimited,
            CoreError::InsufficientResource(_) => ErrorKind::InsufficientResource,
            CoreError::TerminalState(_) => ErrorKind::TerminalState,
            CoreError::Database(_)
            | CoreError::Config(_)
            | CoreError::Relay { .. }
            | CoreError::Io(_)
            | CoreError::Json(_) => ErrorKind::Infrastructure,
        }
    }

    /// Stable key the presentation layer localizes.
    pub fn message_key(&self) -> &'static str {
        match self {
            CoreError::Validation(e) => match e {
                ValidationError::InvalidValue { .. } => "error.validation.invalid_value",
                ValidationError::UnknownLesson { .. } => "error.validation.unknown_lesson",
                ValidationError::PageOutOfRange { .. } => "error.validation.page_out_of_range",
            },
            CoreError::StateConflict(e) => match e {
                StateConflictError::SessionConflict { .. } => "error.lesson.session_conflict",
                StateConflictError::NoActiveSession { .. } => "error.lesson.no_active_session",
                StateConflictError::LessonMismatch { .. } => "error.lesson.mismatch",
                StateConflictError::NonSequentialProgress { .. } => {
                    "error.lesson.non_sequential_progress"
                }
                StateConflictError::StudyTimeTooShort { .. } => "error.lesson.study_time_too_short",
                StateConflictError::IncompletePages { .. } => "error.lesson.incomplete_pages",
                StateConflictError::AlreadyClaimed { .. } => "error.reward.already_claimed",
                StateConflictError::CertificateExists { .. } => "error.certificate.exists",
                StateConflictError::TimerNotRunning => "error.timer.not_running",
                StateConflictError::CompanionNotFound { .. } => "error.companion.not_found",
                StateConflictError::CompanionAlive { .. } => "error.companion.alive",
                StateConflictError::TaskNotFound { .. } => "error.task.not_found",
            },
            CoreError::RateLimited(e) => match e {
                RateLimitedError::IntervalTooShort { .. } => "error.reward.interval_too_short",
                RateLimitedError::DailyLimitReached { .. } => "error.reward.daily_limit_reached",
            },
            CoreError::InsufficientResource(InsufficientResourceError::InsufficientBalance {
                ..
            }) => "error.balance.insufficient",
            CoreError::TerminalState(TerminalStateError::CompanionDead { .. }) => {
                "error.companion.dead"
            }
            CoreError::Database(_) => "error.storage.database",
            CoreError::Config(_) => "error.storage.config",
            CoreError::Relay { .. } => "error.relay.rejected",
            CoreError::Io(_) => "error.storage.io",
            CoreError::Json(_) => "error.storage.json",
        }
    }

    /// Seconds the caller should wait before retrying, for rate-limited errors.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            CoreError::RateLimited(RateLimitedError::IntervalTooShort { retry_after_secs })
            | CoreError::RateLimited(RateLimitedError::DailyLimitReached {
                retry_after_secs, ..
            }) => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let err: CoreError = RateLimitedError::IntervalTooShort {
            retry_after_secs: 30,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after_secs(), Some(30));

        let err: CoreError = TerminalStateError::CompanionDead { companion_id: 1 }.into();
        assert_eq!(err.kind(), ErrorKind::TerminalState);
        assert_eq!(err.retry_after_secs(), None);
    }

    #[test]
    fn message_keys_are_distinct_per_rule() {
        let errors: Vec<CoreError> = vec![
            StateConflictError::AlreadyClaimed { lesson_id: 1 }.into(),
            StateConflictError::SessionConflict {
                open_lesson: 1,
                requested: 2,
            }
            .into(),
            RateLimitedError::DailyLimitReached {
                limit: 10,
                retry_after_secs: 5,
            }
            .into(),
            InsufficientResourceError::InsufficientBalance {
                required: 5,
                available: 0,
            }
            .into(),
            TerminalStateError::CompanionDead { companion_id: 0 }.into(),
        ];
        let mut keys: Vec<_> = errors.iter().map(|e| e.message_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), errors.len());
    }
}
