use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::care::Effect;
use crate::error::ValidationError;
use crate::ledger::UserId;

pub type CompanionId = u64;

pub const MAX_VITAL: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanionStatus {
    Healthy,
    Hungry,
    Sad,
    Dead,
}

/// The virtual companion and its three vitals, each in `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    pub id: CompanionId,
    pub owner: UserId,
    pub level: u32,
    pub hunger: u8,
    pub happiness: u8,
    pub health: u8,
    pub last_fed: Option<DateTime<Utc>>,
    pub last_interacted: Option<DateTime<Utc>>,
    pub status: CompanionStatus,
    pub total_feed_count: u32,
    pub total_interact_count: u32,
    pub born_at: DateTime<Utc>,
    /// Decay has been applied up to this instant.
    pub last_decay_at: DateTime<Utc>,
}

impl Companion {
    pub fn new(id: CompanionId, owner: UserId, born_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            level: 1,
            hunger: MAX_VITAL,
            happiness: MAX_VITAL,
            health: MAX_VITAL,
            last_fed: None,
            last_interacted: None,
            status: CompanionStatus::Healthy,
            total_feed_count: 0,
            total_interact_count: 0,
            born_at,
            last_decay_at: born_at,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.status == CompanionStatus::Dead
    }

    pub fn vital_sum(&self) -> u32 {
        u32::from(self.hunger) + u32::from(self.happiness) + u32::from(self.health)
    }

    pub(crate) fn apply(&mut self, effect: Effect) {
        self.hunger = clamp_vital(self.hunger, effect.hunger);
        self.happiness = clamp_vital(self.happiness, effect.happiness);
        self.health = clamp_vital(self.health, effect.health);
    }

    /// Status implied by the current vitals, in priority order.
    pub fn resolve_status(&self) -> CompanionStatus {
        if self.health == 0 {
            CompanionStatus::Dead
        } else if self.hunger < 30 {
            CompanionStatus::Hungry
        } else if self.happiness < 30 {
            CompanionStatus::Sad
        } else {
            CompanionStatus::Healthy
        }
    }
}

fn clamp_vital(value: u8, delta: i32) -> u8 {
    (i32::from(value) + delta).clamp(0, i32::from(MAX_VITAL)) as u8
}

/// All companions one user has ever minted. Companions are never removed,
/// so a companion's id is its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    companions: Vec<Companion>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CompanionId) -> Option<&Companion> {
        self.companions.get(usize::try_from(id).ok()?)
    }

    pub(crate) fn get_mut(&mut self, id: CompanionId) -> Option<&mut Companion> {
        self.companions.get_mut(usize::try_from(id).ok()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Companion> {
        self.companions.iter()
    }

    pub fn len(&self) -> usize {
        self.companions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companions.is_empty()
    }

    pub fn living(&self) -> impl Iterator<Item = &Companion> {
        self.companions.iter().filter(|c| !c.is_dead())
    }

    pub(crate) fn next_id(&self) -> CompanionId {
        self.companions.len() as CompanionId
    }

    pub(crate) fn push(&mut self, companion: Companion) {
        self.companions.push(companion);
    }

    /// Check a restored roster: ids match positions, every companion belongs
    /// to `owner`, vitals stay within `0..=MAX_VITAL` and levels start at 1.
    pub fn validate(&self, owner: &UserId) -> Result<(), ValidationError> {
        for (position, companion) in self.companions.iter().enumerate() {
            if companion.id != position as CompanionId {
                return Err(ValidationError::invalid(
                    "roster.id",
                    format!("companion at position {position} has id {}", companion.id),
                ));
            }
            if &companion.owner != owner {
                return Err(ValidationError::invalid(
                    "roster.owner",
                    format!("companion {} belongs to {}", companion.id, companion.owner),
                ));
            }
            for (field, value) in [
                ("roster.hunger", companion.hunger),
                ("roster.happiness", companion.happiness),
                ("roster.health", companion.health),
            ] {
                if value > MAX_VITAL {
                    return Err(ValidationError::invalid(
                        field,
                        format!("{value} exceeds {MAX_VITAL} on companion {}", companion.id),
                    ));
                }
            }
            if companion.level == 0 {
                return Err(ValidationError::invalid(
                    "roster.level",
                    format!("companion {} has level 0", companion.id),
                ));
            }
        }
        Ok(())
    }
}
