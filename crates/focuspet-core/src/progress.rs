//! Activity history behind the progress overview.
//!
//! Records mini-game results, meditation sessions and completed focus time
//! per local day, and folds them with task completion into a 0..=100 focus
//! score:
//!
//! ```text
//! score = min(100, round(completed/total * 40 + games_played * 10 + meditations * 5))
//! ```
//!
//! where `games_played` counts distinct games with at least one result.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::tasks::TaskStats;

pub const MAX_FOCUS_SCORE: u32 = 100;

const TASK_WEIGHT: f64 = 40.0;
const GAME_WEIGHT: f64 = 10.0;
const MEDITATION_WEIGHT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Breathing,
    Focus,
    Memory,
    Reaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeditationKind {
    Mindfulness,
    Breathing,
    BodyScan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub score: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeditationRecord {
    pub kind: MeditationKind,
    pub duration_secs: u64,
    pub at: DateTime<Utc>,
}

/// Figures for the progress overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub today_focus_secs: u64,
    pub current_streak: u32,
    pub completed_tasks: usize,
    pub focus_score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressLog {
    #[serde(default)]
    games: BTreeMap<GameKind, Vec<GameRecord>>,
    #[serde(default)]
    meditations: Vec<MeditationRecord>,
    /// Completed focus seconds keyed by local calendar day.
    #[serde(default)]
    focus_days: BTreeMap<NaiveDate, u64>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn games(&self, game: GameKind) -> &[GameRecord] {
        self.games.get(&game).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn best_score(&self, game: GameKind) -> Option<u32> {
        self.games(game).iter().map(|r| r.score).max()
    }

    pub fn meditations(&self) -> &[MeditationRecord] {
        &self.meditations
    }

    pub fn focus_secs_on(&self, day: NaiveDate) -> u64 {
        self.focus_days.get(&day).copied().unwrap_or(0)
    }

    pub fn record_game(&mut self, game: GameKind, score: u32, clock: &dyn Clock) -> Event {
        let at = clock.now();
        self.games.entry(game).or_default().push(GameRecord { score, at });
        debug!(?game, score, "game result recorded");
        Event::GameRecorded { game, score, at }
    }

    /// # Errors
    /// [`ValidationError::InvalidValue`] for a zero-length session.
    pub fn record_meditation(
        &mut self,
        kind: MeditationKind,
        duration_secs: u64,
        clock: &dyn Clock,
    ) -> Result<Event> {
        if duration_secs == 0 {
            return Err(ValidationError::invalid("duration_secs", "must be positive").into());
        }
        let at = clock.now();
        self.meditations.push(MeditationRecord {
            kind,
            duration_secs,
            at,
        });
        Ok(Event::MeditationRecorded {
            kind,
            duration_secs,
            at,
        })
    }

    /// Add completed focus time to `day`.
    pub fn record_focus(&mut self, day: NaiveDate, secs: u64) {
        let total = self.focus_days.entry(day).or_default();
        *total = total.saturating_add(secs);
    }

    pub fn focus_score(&self, tasks: &TaskStats) -> u32 {
        let task_score = if tasks.total == 0 {
            0.0
        } else {
            tasks.completed as f64 / tasks.total as f64 * TASK_WEIGHT
        };
        let games_played = self.games.values().filter(|r| !r.is_empty()).count();
        let score = task_score
            + games_played as f64 * GAME_WEIGHT
            + self.meditations.len() as f64 * MEDITATION_WEIGHT;
        (score.round() as u32).min(MAX_FOCUS_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn stats(total: usize, completed: usize) -> TaskStats {
        TaskStats {
            total,
            completed,
            completion_rate: 0,
        }
    }

    #[test]
    fn focus_score_weights_tasks_games_and_meditation() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let mut log = ProgressLog::new();
        assert_eq!(log.focus_score(&stats(0, 0)), 0);
        assert_eq!(log.focus_score(&stats(3, 1)), 13);

        log.record_game(GameKind::Focus, 12, &clock);
        log.record_game(GameKind::Focus, 20, &clock);
        log.record_game(GameKind::Reaction, 3, &clock);
        log.record_meditation(MeditationKind::BodyScan, 600, &clock)
            .unwrap();
        // 40 * 1/2 + 2 games * 10 + 1 meditation * 5
        assert_eq!(log.focus_score(&stats(2, 1)), 45);
        assert_eq!(log.best_score(GameKind::Focus), Some(20));
        assert_eq!(log.best_score(GameKind::Memory), None);
    }

    #[test]
    fn focus_score_is_capped() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let mut log = ProgressLog::new();
        for _ in 0..30 {
            log.record_meditation(MeditationKind::Mindfulness, 300, &clock)
                .unwrap();
        }
        assert_eq!(log.focus_score(&stats(1, 1)), MAX_FOCUS_SCORE);
    }

    #[test]
    fn zero_length_meditation_is_rejected() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let mut log = ProgressLog::new();
        assert!(log
            .record_meditation(MeditationKind::Breathing, 0, &clock)
            .is_err());
        assert!(log.meditations().is_empty());
    }

    #[test]
    fn focus_time_accumulates_per_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let next = day.succ_opt().unwrap();
        let mut log = ProgressLog::new();
        log.record_focus(day, 1_500);
        log.record_focus(day, 1_500);
        log.record_focus(next, 60);
        assert_eq!(log.focus_secs_on(day), 3_000);
        assert_eq!(log.focus_secs_on(next), 60);

        let json = serde_json::to_string(&log).unwrap();
        let restored: ProgressLog = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, log);
    }
}
