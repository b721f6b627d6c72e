//! Reward ledger rules.
//!
//! The ledger is stateless: it holds the policy and lesson catalog, and
//! every operation takes the user's [`Account`] explicitly. Each operation
//! checks every rule before touching the account, so a failed call leaves
//! the account exactly as it was.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use rand::{Rng, SeedableRng};
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::account::{Account, ActivityKind, ClaimRecord, UserId};
use crate::clock::Clock;
use crate::error::{
    InsufficientResourceError, RateLimitedError, Result, StateConflictError, ValidationError,
};
use crate::events::Event;
use crate::lesson::{Lesson, LessonCatalog, LessonId};

/// Rate limits and reward bounds enforced by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    #[serde(default = "default_min_focus_interval_secs")]
    pub min_focus_interval_secs: u64,
    #[serde(default = "default_max_daily_focus_claims")]
    pub max_daily_focus_claims: u32,
    #[serde(default = "default_focus_reward_min")]
    pub focus_reward_min: u64,
    #[serde(default = "default_focus_reward_max")]
    pub focus_reward_max: u64,
    /// Offset from UTC used to decide which calendar day a timestamp is on.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Seed for focus reward draws. Same seed, same rewards.
    #[serde(default)]
    pub reward_seed: u64,
}

fn default_min_focus_interval_secs() -> u64 {
    25 * 60
}
fn default_max_daily_focus_claims() -> u32 {
    10
}
fn default_focus_reward_min() -> u64 {
    2
}
fn default_focus_reward_max() -> u64 {
    5
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            min_focus_interval_secs: default_min_focus_interval_secs(),
            max_daily_focus_claims: default_max_daily_focus_claims(),
            focus_reward_min: default_focus_reward_min(),
            focus_reward_max: default_focus_reward_max(),
            utc_offset_minutes: 0,
            reward_seed: 0,
        }
    }
}

impl LedgerPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_daily_focus_claims == 0 {
            return Err(ValidationError::invalid(
                "max_daily_focus_claims",
                "must be positive",
            ));
        }
        if self.focus_reward_min == 0 || self.focus_reward_min > self.focus_reward_max {
            return Err(ValidationError::invalid(
                "focus_reward_min",
                format!(
                    "reward range {}..={} is empty or pays nothing",
                    self.focus_reward_min, self.focus_reward_max
                ),
            ));
        }
        if self.offset().is_none() {
            return Err(ValidationError::invalid(
                "utc_offset_minutes",
                "must be within +/- 24 hours",
            ));
        }
        Ok(())
    }

    fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    /// The local calendar day `t` falls on.
    pub fn day_of(&self, t: DateTime<Utc>) -> NaiveDate {
        let offset = self.offset().unwrap_or_else(|| Utc.fix());
        t.with_timezone(&offset).date_naive()
    }

    /// Seconds from `t` until the next local midnight.
    fn secs_until_next_day(&self, t: DateTime<Utc>) -> u64 {
        let offset_secs = i64::from(self.utc_offset_minutes) * 60;
        let local = t.timestamp() + offset_secs;
        let day = 24 * 60 * 60;
        (day - local.rem_euclid(day)) as u64
    }
}

/// Enforces claim, rate-limit and spend rules over user accounts.
#[derive(Debug, Clone)]
pub struct RewardLedger {
    policy: LedgerPolicy,
    catalog: LessonCatalog,
}

impl RewardLedger {
    /// # Errors
    /// Returns a validation error if the policy or catalog is inconsistent.
    pub fn new(policy: LedgerPolicy, catalog: LessonCatalog) -> Result<Self> {
        policy.validate()?;
        catalog.validate()?;
        Ok(Self { policy, catalog })
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    /// Check a lesson claim without applying it.
    pub fn check_lesson_claim(
        &self,
        account: &Account,
        lesson_id: LessonId,
        study_time_secs: u64,
    ) -> Result<&Lesson> {
        if account.has_claimed_lesson(lesson_id) {
            return Err(StateConflictError::AlreadyClaimed { lesson_id }.into());
        }
        let lesson = self.catalog.require(lesson_id)?;
        if study_time_secs < lesson.min_study_time_secs {
            return Err(StateConflictError::StudyTimeTooShort {
                studied_secs: study_time_secs,
                required_secs: lesson.min_study_time_secs,
            }
            .into());
        }
        Ok(lesson)
    }

    /// Pay out a lesson reward, at most once per (user, lesson).
    ///
    /// # Errors
    /// - [`StateConflictError::AlreadyClaimed`] on any repeat claim
    /// - [`StateConflictError::StudyTimeTooShort`] below the lesson minimum
    /// - [`ValidationError::UnknownLesson`] for lessons outside the catalog
    pub fn claim_lesson(
        &self,
        account: &mut Account,
        lesson_id: LessonId,
        study_time_secs: u64,
        clock: &dyn Clock,
    ) -> Result<Event> {
        let reward = match self.check_lesson_claim(account, lesson_id, study_time_secs) {
            Ok(lesson) => lesson.reward,
            Err(e) => {
                debug!(user = %account.user, lesson_id, error = %e, "lesson claim rejected");
                return Err(e);
            }
        };
        let now = clock.now();
        account.claimed_lessons.insert(lesson_id);
        account.stats.total_lessons_completed += 1;
        account.stats.total_study_time_secs += study_time_secs;
        info!(user = %account.user, lesson_id, reward, "lesson reward claimed");
        Ok(self.credit(
            account,
            ActivityKind::Lesson { lesson_id },
            reward,
            now,
        ))
    }

    /// Check a focus claim without applying it.
    pub fn check_focus_claim(&self, account: &Account, now: DateTime<Utc>) -> Result<()> {
        if let Some(last) = account.last_focus_claim() {
            let elapsed = (now - last).num_seconds();
            let interval = self.policy.min_focus_interval_secs as i64;
            if elapsed < interval {
                return Err(RateLimitedError::IntervalTooShort {
                    retry_after_secs: (interval - elapsed) as u64,
                }
                .into());
            }
        }
        let today = self.policy.day_of(now);
        let claimed_today = account.focus_claims_on(today, |t| self.policy.day_of(t));
        if claimed_today >= self.policy.max_daily_focus_claims {
            return Err(RateLimitedError::DailyLimitReached {
                limit: self.policy.max_daily_focus_claims,
                retry_after_secs: self.policy.secs_until_next_day(now),
            }
            .into());
        }
        Ok(())
    }

    /// Pay out a focus-session reward drawn from the policy's range.
    ///
    /// # Errors
    /// - [`RateLimitedError::IntervalTooShort`] inside the minimum interval
    /// - [`RateLimitedError::DailyLimitReached`] past the daily ceiling
    pub fn claim_focus_session(&self, account: &mut Account, clock: &dyn Clock) -> Result<Event> {
        let now = clock.now();
        if let Err(e) = self.check_focus_claim(account, now) {
            debug!(user = %account.user, error = %e, "focus claim rejected");
            return Err(e);
        }
        let amount = self.draw_focus_reward(&account.user, account.stats.total_focus_sessions);
        account.stats.total_focus_sessions += 1;
        info!(user = %account.user, amount, "focus reward claimed");
        Ok(self.credit(account, ActivityKind::FocusSession, amount, now))
    }

    /// Debit `amount` from the account.
    ///
    /// # Errors
    /// [`InsufficientResourceError::InsufficientBalance`] if the balance does
    /// not cover it; nothing is debited.
    pub fn spend(&self, account: &mut Account, amount: u64, clock: &dyn Clock) -> Result<Event> {
        Self::check_spend(account, amount)?;
        account.balance -= amount;
        account.total_spent += amount;
        debug!(user = %account.user, amount, balance = account.balance, "balance debited");
        Ok(Event::BalanceDebited {
            user: account.user.clone(),
            amount,
            new_balance: account.balance,
            at: clock.now(),
        })
    }

    pub fn check_spend(account: &Account, amount: u64) -> Result<()> {
        if account.balance < amount {
            return Err(InsufficientResourceError::InsufficientBalance {
                required: amount,
                available: account.balance,
            }
            .into());
        }
        Ok(())
    }

    fn credit(
        &self,
        account: &mut Account,
        activity: ActivityKind,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Event {
        account.balance += amount;
        account.total_earned += amount;
        account.claims.push(ClaimRecord {
            user: account.user.clone(),
            activity,
            timestamp: now,
            amount,
        });
        let change = account.stats.record_activity(self.policy.day_of(now));
        debug!(
            user = %account.user,
            ?change,
            streak = account.stats.current_streak,
            "streak updated"
        );
        Event::RewardCredited {
            user: account.user.clone(),
            amount,
            new_balance: account.balance,
            at: now,
        }
    }

    /// Uniform draw over the inclusive reward range, keyed by
    /// (seed, user, claim ordinal) so it replays identically.
    fn draw_focus_reward(&self, user: &UserId, ordinal: u32) -> u64 {
        let digest = Sha256::digest(user.as_str().as_bytes());
        let mut user_key = [0u8; 8];
        user_key.copy_from_slice(&digest[..8]);
        let seed = self.policy.reward_seed
            ^ u64::from_le_bytes(user_key)
            ^ u64::from(ordinal).rotate_left(32);
        let mut rng = Mcg128Xsl64::seed_from_u64(seed);
        rng.gen_range(self.policy.focus_reward_min..=self.policy.focus_reward_max)
    }

    /// Seconds until a focus claim could next succeed, 0 if it can now.
    pub fn focus_claim_available_in(&self, account: &Account, now: DateTime<Utc>) -> u64 {
        match self.check_focus_claim(account, now) {
            Ok(()) => 0,
            Err(e) => e.retry_after_secs().unwrap_or(0),
        }
    }
}

impl Default for RewardLedger {
    fn default() -> Self {
        Self {
            policy: LedgerPolicy::default(),
            catalog: LessonCatalog::default(),
        }
    }
}
