use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::streak::UserStats;
use crate::error::ValidationError;
use crate::lesson::LessonId;

/// Opaque user identity. Everything in the core is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityKind {
    Lesson { lesson_id: LessonId },
    FocusSession,
}

/// One accepted claim. Claims are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub user: UserId,
    pub activity: ActivityKind,
    pub timestamp: DateTime<Utc>,
    pub amount: u64,
}

/// A user's ledger state: balance, dedup set, claim history and stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user: UserId,
    pub balance: u64,
    /// Lessons whose reward has been paid out. Never shrinks.
    #[serde(default)]
    pub claimed_lessons: BTreeSet<LessonId>,
    #[serde(default)]
    pub claims: Vec<ClaimRecord>,
    #[serde(default)]
    pub stats: UserStats,
    #[serde(default)]
    pub total_earned: u64,
    #[serde(default)]
    pub total_spent: u64,
}

impl Account {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            balance: 0,
            claimed_lessons: BTreeSet::new(),
            claims: Vec::new(),
            stats: UserStats::default(),
            total_earned: 0,
            total_spent: 0,
        }
    }

    pub fn has_claimed_lesson(&self, lesson_id: LessonId) -> bool {
        self.claimed_lessons.contains(&lesson_id)
    }

    pub fn last_focus_claim(&self) -> Option<DateTime<Utc>> {
        self.focus_claims().map(|c| c.timestamp).next_back()
    }

    /// Focus claims whose local calendar day (per `day_of`) equals `day`.
    pub fn focus_claims_on(
        &self,
        day: NaiveDate,
        day_of: impl Fn(DateTime<Utc>) -> NaiveDate,
    ) -> u32 {
        self.focus_claims()
            .filter(|c| day_of(c.timestamp) == day)
            .count() as u32
    }

    /// Check a restored account: it belongs to `user`, its claims are that
    /// user's, and `balance == total_earned - total_spent` with
    /// `total_earned` equal to the sum of all claims.
    pub fn validate(&self, user: &UserId) -> Result<(), ValidationError> {
        if &self.user != user {
            return Err(ValidationError::invalid(
                "account.user",
                format!("snapshot for {user} names {}", self.user),
            ));
        }
        if let Some(stray) = self.claims.iter().find(|c| &c.user != user) {
            return Err(ValidationError::invalid(
                "account.claims",
                format!("claim recorded for {}", stray.user),
            ));
        }
        let claimed: u64 = self.claims.iter().map(|c| c.amount).sum();
        if claimed != self.total_earned {
            return Err(ValidationError::invalid(
                "account.total_earned",
                format!("{} differs from claimed total {claimed}", self.total_earned),
            ));
        }
        if self.total_earned.checked_sub(self.total_spent) != Some(self.balance) {
            return Err(ValidationError::invalid(
                "account.balance",
                format!(
                    "{} != earned {} - spent {}",
                    self.balance, self.total_earned, self.total_spent
                ),
            ));
        }
        Ok(())
    }

    fn focus_claims(&self) -> impl DoubleEndedIterator<Item = &ClaimRecord> {
        self.claims
            .iter()
            .filter(|c| c.activity == ActivityKind::FocusSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(user: &str, amount: u64) -> ClaimRecord {
        ClaimRecord {
            user: UserId::from(user),
            activity: ActivityKind::FocusSession,
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            amount,
        }
    }

    #[test]
    fn validate_checks_the_balance_identity() {
        let user = UserId::from("alice");
        let mut account = Account::new(user.clone());
        assert!(account.validate(&user).is_ok());

        account.claims.push(claim("alice", 4));
        account.total_earned = 4;
        account.total_spent = 1;
        account.balance = 3;
        assert!(account.validate(&user).is_ok());

        account.balance = 400;
        assert!(account.validate(&user).is_err());
    }

    #[test]
    fn validate_rejects_foreign_records() {
        let user = UserId::from("alice");
        let account = Account::new(UserId::from("bob"));
        assert!(account.validate(&user).is_err());

        let mut account = Account::new(user.clone());
        account.claims.push(claim("bob", 2));
        account.total_earned = 2;
        account.balance = 2;
        assert!(account.validate(&user).is_err());
    }
}
