use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::companion::{CareAction, CompanionId, CompanionStatus, FoodTier};
use crate::ledger::UserId;
use crate::lesson::LessonId;
use crate::progress::{GameKind, MeditationKind};
use crate::tasks::TaskId;
use crate::timer::{SessionMode, TimerState};

/// Every state change in the core produces an Event.
/// The presentation layer renders them; relays may forward them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: SessionMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// A focus period ran out. `mode` is the break that follows.
    FocusCompleted {
        mode: SessionMode,
        completed_focus_count: u32,
        at: DateTime<Utc>,
    },
    /// A break ran out and the engine is back in focus mode. Never rewarded.
    BreakCompleted {
        finished: SessionMode,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        mode: SessionMode,
        remaining_secs: u64,
        total_secs: u64,
        completed_focus_count: u32,
        /// 0.0 .. 1.0 progress within the current period.
        progress: f64,
        at: DateTime<Utc>,
    },
    LessonStarted {
        lesson_id: LessonId,
        at: DateTime<Utc>,
    },
    LessonCompleted {
        lesson_id: LessonId,
        study_time_secs: u64,
        at: DateTime<Utc>,
    },
    RewardCredited {
        user: UserId,
        amount: u64,
        new_balance: u64,
        at: DateTime<Utc>,
    },
    BalanceDebited {
        user: UserId,
        amount: u64,
        new_balance: u64,
        at: DateTime<Utc>,
    },
    CertificateIssued {
        user: UserId,
        lesson_id: LessonId,
        certificate_id: String,
        at: DateTime<Utc>,
    },
    CompanionMinted {
        user: UserId,
        companion_id: CompanionId,
        price: u64,
        at: DateTime<Utc>,
    },
    CompanionFed {
        companion_id: CompanionId,
        tier: FoodTier,
        at: DateTime<Utc>,
    },
    CompanionInteracted {
        companion_id: CompanionId,
        action: CareAction,
        at: DateTime<Utc>,
    },
    CompanionStatusChanged {
        companion_id: CompanionId,
        status: CompanionStatus,
        at: DateTime<Utc>,
    },
    CompanionLeveledUp {
        companion_id: CompanionId,
        new_level: u32,
        at: DateTime<Utc>,
    },
    CompanionDied {
        companion_id: CompanionId,
        at: DateTime<Utc>,
    },
    TaskAdded {
        task_id: TaskId,
        title: String,
        at: DateTime<Utc>,
    },
    TaskToggled {
        task_id: TaskId,
        completed: bool,
        at: DateTime<Utc>,
    },
    TaskDeleted {
        task_id: TaskId,
        at: DateTime<Utc>,
    },
    GameRecorded {
        game: GameKind,
        score: u32,
        at: DateTime<Utc>,
    },
    MeditationRecorded {
        kind: MeditationKind,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::CompanionDied {
            companion_id: 3,
            at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CompanionDied");
        assert_eq!(json["companion_id"], 3);
    }
}
