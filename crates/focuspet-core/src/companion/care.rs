//! Price and effect tables for feeding and interacting.

use serde::{Deserialize, Serialize};

/// Signed change applied to each vital.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    pub hunger: i32,
    pub happiness: i32,
    pub health: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodTier {
    Basic,
    Premium,
    Luxury,
}

impl FoodTier {
    pub fn cost(&self) -> u64 {
        match self {
            FoodTier::Basic => 5,
            FoodTier::Premium => 15,
            FoodTier::Luxury => 30,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            FoodTier::Basic => Effect {
                hunger: 20,
                happiness: 5,
                health: 0,
            },
            FoodTier::Premium => Effect {
                hunger: 40,
                happiness: 15,
                health: 10,
            },
            FoodTier::Luxury => Effect {
                hunger: 60,
                happiness: 30,
                health: 20,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareAction {
    Play,
    Groom,
    Medicine,
}

impl CareAction {
    pub fn cost(&self) -> u64 {
        match self {
            CareAction::Play => 10,
            CareAction::Groom => 8,
            CareAction::Medicine => 20,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            // Playing burns energy.
            CareAction::Play => Effect {
                hunger: -5,
                happiness: 25,
                health: 0,
            },
            CareAction::Groom => Effect {
                hunger: 0,
                happiness: 10,
                health: 15,
            },
            CareAction::Medicine => Effect {
                hunger: 0,
                happiness: 5,
                health: 40,
            },
        }
    }
}
