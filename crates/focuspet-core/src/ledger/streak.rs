//! Daily activity streaks.
//!
//! A streak counts consecutive calendar days with at least one rewarded
//! activity. Days are compared as local dates, so the caller decides the
//! offset before handing a day in.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifetime counters and the current streak for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_lessons_completed: u32,
    pub total_study_time_secs: u64,
    pub total_focus_sessions: u32,
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    pub last_activity_day: Option<NaiveDate>,
}

/// How an activity moved the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Started,
    SameDay,
    Extended,
    Broken,
}

impl UserStats {
    /// Fold an activity on `day` into the streak.
    ///
    /// Activity dated before `last_activity_day` (a clock that went
    /// backwards) is treated like a same-day repeat.
    pub fn record_activity(&mut self, day: NaiveDate) -> StreakChange {
        let change = match self.last_activity_day {
            None => {
                self.current_streak = 1;
                StreakChange::Started
            }
            Some(last) => match (day - last).num_days() {
                d if d <= 0 => StreakChange::SameDay,
                1 => {
                    self.current_streak += 1;
                    StreakChange::Extended
                }
                _ => {
                    self.current_streak = 1;
                    StreakChange::Broken
                }
            },
        };
        if change != StreakChange::SameDay {
            self.last_activity_day = Some(day);
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);
        change
    }

    /// The streak as it stands on `today`: still alive if the last activity
    /// was today or yesterday, 0 otherwise.
    pub fn streak_on(&self, today: NaiveDate) -> u32 {
        match self.last_activity_day {
            Some(last) if (0..=1).contains(&(today - last).num_days()) => self.current_streak,
            _ => 0,
        }
    }
}
