//! # focuspet core
//!
//! Rules engine for a gamified focus app: users run timed focus sessions
//! and read lessons, earn a reward currency, and spend it to keep a virtual
//! companion alive. The same rules are meant to hold whether they run
//! locally or are re-checked by an authoritative ledger.
//!
//! ## Architecture
//!
//! - **Timer Engine**: countdown state machine over focus and break
//!   periods; the caller drives it with `tick()`
//! - **Lesson Validator**: sequential paging and minimum study time
//! - **Reward Ledger**: idempotent lesson claims, rate-limited focus claims,
//!   spending and streaks
//! - **Companion Simulator**: clock-driven decay, care, leveling and death
//! - **Tasks and Progress**: a to-do list, mini-game and meditation history,
//!   daily focus time and a focus score
//! - **Storage**: SQLite key-value snapshots and TOML configuration
//!
//! Every rule reads time through an injected [`Clock`]. Rule engines hold
//! only policy; per-user state is passed in explicitly, and
//! [`FocusCore`] ties them together over a [`KvStore`].
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: focus/break state machine
//! - [`LessonValidator`]: one learning session per user
//! - [`RewardLedger`]: claims, spending and streaks
//! - [`CompanionSimulator`]: companion lifecycle
//! - [`FocusCore`]: per-user transactions over a store
//! - [`Config`]: configuration management

pub mod certificate;
pub mod clock;
pub mod companion;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lesson;
pub mod progress;
pub mod relay;
pub mod service;
pub mod storage;
pub mod tasks;
pub mod timer;

pub use certificate::{Certificate, CertificateRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use companion::{
    CareAction, Companion, CompanionId, CompanionPolicy, CompanionSimulator, CompanionStatus,
    FoodTier, RebirthRule, Roster,
};
pub use error::{
    ConfigError, CoreError, DatabaseError, ErrorKind, InsufficientResourceError,
    RateLimitedError, Result, StateConflictError, TerminalStateError, ValidationError,
};
pub use events::Event;
pub use ledger::{Account, LedgerPolicy, RewardLedger, UserId, UserStats};
pub use lesson::{LearningSession, Lesson, LessonCatalog, LessonId, LessonValidator};
pub use progress::{GameKind, MeditationKind, ProgressLog, ProgressSummary};
pub use relay::{LedgerRelay, RelayRejection, RelayRequest};
pub use service::{FocusCore, Outcome, UserState};
pub use storage::{Config, Database, KvStore, MemoryStore};
pub use tasks::{Task, TaskCategory, TaskFilter, TaskId, TaskList, TaskPriority, TaskStats};
pub use timer::{SessionMode, TimerConfig, TimerEngine, TimerState};
