mod care;
mod model;
mod simulator;

pub use care::{CareAction, Effect, FoodTier};
pub use model::{Companion, CompanionId, CompanionStatus, Roster, MAX_VITAL};
pub use simulator::{CompanionPolicy, CompanionSimulator, RebirthRule};
