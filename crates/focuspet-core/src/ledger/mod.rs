mod account;
mod reward;
mod streak;

pub use account::{Account, ActivityKind, ClaimRecord, UserId};
pub use reward::{LedgerPolicy, RewardLedger};
pub use streak::{StreakChange, UserStats};
