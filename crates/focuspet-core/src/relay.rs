//! Hand-off to an authoritative external ledger.
//!
//! When a relay is attached, every currency-affecting operation is
//! submitted after the local rules accept it and before anything is
//! committed. A rejection aborts the operation. Requests the relay already
//! accepted are handed back through [`LedgerRelay::revert`] when the
//! operation fails afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::companion::{CareAction, CompanionId, FoodTier};
use crate::ledger::UserId;
use crate::lesson::LessonId;

/// An operation the local rules have already accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RelayRequest {
    ClaimLesson {
        user: UserId,
        lesson_id: LessonId,
        study_time_secs: u64,
        amount: u64,
    },
    ClaimFocusSession {
        user: UserId,
        amount: u64,
    },
    Feed {
        user: UserId,
        companion_id: CompanionId,
        tier: FoodTier,
        cost: u64,
    },
    Interact {
        user: UserId,
        companion_id: CompanionId,
        action: CareAction,
        cost: u64,
    },
    Mint {
        user: UserId,
        companion_id: CompanionId,
        price: u64,
    },
    Rebirth {
        user: UserId,
        companion_id: CompanionId,
        cost: u64,
    },
}

impl RelayRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            RelayRequest::ClaimLesson { .. } => "claim_lesson",
            RelayRequest::ClaimFocusSession { .. } => "claim_focus_session",
            RelayRequest::Feed { .. } => "feed",
            RelayRequest::Interact { .. } => "interact",
            RelayRequest::Mint { .. } => "mint",
            RelayRequest::Rebirth { .. } => "rebirth",
        }
    }

    pub fn user(&self) -> &UserId {
        match self {
            RelayRequest::ClaimLesson { user, .. }
            | RelayRequest::ClaimFocusSession { user, .. }
            | RelayRequest::Feed { user, .. }
            | RelayRequest::Interact { user, .. }
            | RelayRequest::Mint { user, .. }
            | RelayRequest::Rebirth { user, .. } => user,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RelayRejection(pub String);

/// An authoritative ledger that can veto locally accepted operations.
pub trait LedgerRelay: Send + Sync {
    /// Unique identifier used in logs.
    fn name(&self) -> &str;

    /// # Errors
    /// A [`RelayRejection`] vetoes the operation.
    fn submit(&self, request: &RelayRequest) -> Result<(), RelayRejection>;

    /// Undo an accepted request whose operation was not committed locally,
    /// either because a later request was rejected or the store write
    /// failed. Called in reverse submission order.
    fn revert(&self, _request: &RelayRequest) {}
}
