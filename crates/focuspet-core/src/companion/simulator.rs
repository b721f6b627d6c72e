//! Companion simulation.
//!
//! Decay runs in fixed steps of `decay_interval_secs`. Each companion keeps
//! a decay cursor (`last_decay_at`); `tick` replays every whole step between
//! the cursor and now, so calling it twice at the same instant does nothing
//! and the outcome does not depend on how often the host ticks.
//!
//! Per step, at step time `t`:
//!
//! | Condition                                  | Effect        |
//! |--------------------------------------------|---------------|
//! | not fed within `hunger_grace_secs`         | hunger -5     |
//! | no interaction within `happiness_grace_secs` | happiness -3 |
//! | hunger < 20                                | health -2     |
//! | happiness < 20                             | health -1     |
//!
//! A companion that was never fed (or never interacted with) counts as
//! overdue from its first step.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::care::{CareAction, Effect, FoodTier};
use super::model::{Companion, CompanionId, CompanionStatus, Roster};
use crate::clock::Clock;
use crate::error::{Result, StateConflictError, TerminalStateError, ValidationError};
use crate::events::Event;
use crate::ledger::{Account, RewardLedger};

const HUNGER_DECAY: i32 = 5;
const HAPPINESS_DECAY: i32 = 3;
const STARVING_BELOW: u8 = 20;
const LONELY_BELOW: u8 = 20;
const STARVING_HEALTH_LOSS: i32 = 2;
const LONELY_HEALTH_LOSS: i32 = 1;
const LEVEL_THRESHOLD_PER_LEVEL: u32 = 250;
const LEVEL_UP_BONUS: i32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionPolicy {
    /// Price of every companion after the first, which is free.
    #[serde(default = "default_mint_price")]
    pub mint_price: u64,
    #[serde(default = "default_decay_interval_secs")]
    pub decay_interval_secs: u64,
    #[serde(default = "default_hunger_grace_secs")]
    pub hunger_grace_secs: u64,
    #[serde(default = "default_happiness_grace_secs")]
    pub happiness_grace_secs: u64,
}

fn default_mint_price() -> u64 {
    50
}
fn default_decay_interval_secs() -> u64 {
    60
}
fn default_hunger_grace_secs() -> u64 {
    30 * 60
}
fn default_happiness_grace_secs() -> u64 {
    60 * 60
}

impl Default for CompanionPolicy {
    fn default() -> Self {
        Self {
            mint_price: default_mint_price(),
            decay_interval_secs: default_decay_interval_secs(),
            hunger_grace_secs: default_hunger_grace_secs(),
            happiness_grace_secs: default_happiness_grace_secs(),
        }
    }
}

impl CompanionPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.decay_interval_secs == 0 {
            return Err(ValidationError::invalid(
                "decay_interval_secs",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Terms for bringing a dead companion back. The host decides them; the
/// core only charges the cost and swaps in the returned companion.
pub trait RebirthRule {
    fn cost(&self, dead: &Companion) -> u64;

    /// The companion as it should look after rebirth at `now`.
    fn reborn(&self, dead: &Companion, now: DateTime<Utc>) -> Companion;
}

#[derive(Debug, Clone, Default)]
pub struct CompanionSimulator {
    policy: CompanionPolicy,
}

impl CompanionSimulator {
    /// # Errors
    /// Returns a validation error for a zero decay interval.
    pub fn new(policy: CompanionPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &CompanionPolicy {
        &self.policy
    }

    /// Price the owner of `roster` would pay for their next companion.
    pub fn mint_price(&self, roster: &Roster) -> u64 {
        if roster.is_empty() {
            0
        } else {
            self.policy.mint_price
        }
    }

    /// Create a companion with full vitals. The first one is free.
    ///
    /// # Errors
    /// [`InsufficientBalance`](crate::error::InsufficientResourceError) when a
    /// paid mint is not covered.
    pub fn mint(
        &self,
        ledger: &RewardLedger,
        account: &mut Account,
        roster: &mut Roster,
        clock: &dyn Clock,
    ) -> Result<Vec<Event>> {
        let price = self.mint_price(roster);
        let mut events = Vec::new();
        if price > 0 {
            events.push(ledger.spend(account, price, clock)?);
        }
        let now = clock.now();
        let id = roster.next_id();
        roster.push(Companion::new(id, account.user.clone(), now));
        info!(user = %account.user, companion_id = id, price, "companion minted");
        events.push(Event::CompanionMinted {
            user: account.user.clone(),
            companion_id: id,
            price,
            at: now,
        });
        Ok(events)
    }

    pub fn feed(
        &self,
        ledger: &RewardLedger,
        account: &mut Account,
        roster: &mut Roster,
        companion_id: CompanionId,
        tier: FoodTier,
        clock: &dyn Clock,
    ) -> Result<Vec<Event>> {
        let now = clock.now();
        let mut events = self.care(
            ledger,
            account,
            roster,
            companion_id,
            tier.cost(),
            tier.effect(),
            clock,
            |c| {
                c.last_fed = Some(now);
                c.total_feed_count += 1;
            },
        )?;
        events.insert(
            1,
            Event::CompanionFed {
                companion_id,
                tier,
                at: now,
            },
        );
        Ok(events)
    }

    pub fn interact(
        &self,
        ledger: &RewardLedger,
        account: &mut Account,
        roster: &mut Roster,
        companion_id: CompanionId,
        action: CareAction,
        clock: &dyn Clock,
    ) -> Result<Vec<Event>> {
        let now = clock.now();
        let mut events = self.care(
            ledger,
            account,
            roster,
            companion_id,
            action.cost(),
            action.effect(),
            clock,
            |c| {
                c.last_interacted = Some(now);
                c.total_interact_count += 1;
            },
        )?;
        events.insert(
            1,
            Event::CompanionInteracted {
                companion_id,
                action,
                at: now,
            },
        );
        Ok(events)
    }

    /// Shared path for feed and interact: check, pay, then apply.
    /// The first returned event is always the debit.
    #[allow(clippy::too_many_arguments)]
    fn care(
        &self,
        ledger: &RewardLedger,
        account: &mut Account,
        roster: &mut Roster,
        companion_id: CompanionId,
        cost: u64,
        effect: Effect,
        clock: &dyn Clock,
        stamp: impl FnOnce(&mut Companion),
    ) -> Result<Vec<Event>> {
        let companion = roster
            .get(companion_id)
            .ok_or(StateConflictError::CompanionNotFound { companion_id })?;
        if companion.is_dead() {
            return Err(TerminalStateError::CompanionDead { companion_id }.into());
        }
        let debit = ledger.spend(account, cost, clock)?;

        let companion = roster
            .get_mut(companion_id)
            .ok_or(StateConflictError::CompanionNotFound { companion_id })?;
        companion.apply(effect);
        stamp(companion);

        let mut events = vec![debit];
        events.extend(refresh_status(companion, clock.now()));
        Ok(events)
    }

    /// Apply all decay steps due up to now.
    ///
    /// Dead companions are left untouched.
    pub fn tick(
        &self,
        roster: &mut Roster,
        companion_id: CompanionId,
        clock: &dyn Clock,
    ) -> Result<Vec<Event>> {
        let companion = roster
            .get_mut(companion_id)
            .ok_or(StateConflictError::CompanionNotFound { companion_id })?;
        let now = clock.now();
        let step = Duration::seconds(self.policy.decay_interval_secs as i64);
        let mut events = Vec::new();

        while !companion.is_dead() && companion.last_decay_at + step <= now {
            let at = companion.last_decay_at + step;
            companion.last_decay_at = at;
            events.extend(self.decay_step(companion, at));
        }
        Ok(events)
    }

    /// Tick every companion in the roster.
    pub fn tick_all(&self, roster: &mut Roster, clock: &dyn Clock) -> Vec<Event> {
        let ids: Vec<_> = roster.living().map(|c| c.id).collect();
        ids.into_iter()
            .filter_map(|id| self.tick(roster, id, clock).ok())
            .flatten()
            .collect()
    }

    fn decay_step(&self, c: &mut Companion, at: DateTime<Utc>) -> Vec<Event> {
        let overdue = |last: Option<DateTime<Utc>>, grace_secs: u64| {
            last.map_or(true, |t| (at - t).num_seconds() > grace_secs as i64)
        };
        let mut effect = Effect {
            hunger: 0,
            happiness: 0,
            health: 0,
        };
        if overdue(c.last_fed, self.policy.hunger_grace_secs) {
            effect.hunger = -HUNGER_DECAY;
        }
        if overdue(c.last_interacted, self.policy.happiness_grace_secs) {
            effect.happiness = -HAPPINESS_DECAY;
        }
        c.apply(effect);
        let mut health_loss = 0;
        if c.hunger < STARVING_BELOW {
            health_loss += STARVING_HEALTH_LOSS;
        }
        if c.happiness < LONELY_BELOW {
            health_loss += LONELY_HEALTH_LOSS;
        }
        c.apply(Effect {
            hunger: 0,
            happiness: 0,
            health: -health_loss,
        });

        let mut events: Vec<Event> = refresh_status(c, at).into_iter().collect();
        if c.is_dead() {
            warn!(companion_id = c.id, owner = %c.owner, "companion died");
            events.push(Event::CompanionDied {
                companion_id: c.id,
                at,
            });
            return events;
        }

        if c.status == CompanionStatus::Healthy
            && c.vital_sum() >= c.level * LEVEL_THRESHOLD_PER_LEVEL
        {
            c.level += 1;
            c.apply(Effect {
                hunger: LEVEL_UP_BONUS,
                happiness: LEVEL_UP_BONUS,
                health: LEVEL_UP_BONUS,
            });
            info!(companion_id = c.id, level = c.level, "companion leveled up");
            events.push(Event::CompanionLeveledUp {
                companion_id: c.id,
                new_level: c.level,
                at,
            });
        }
        events
    }

    /// Bring a dead companion back on the host's terms.
    ///
    /// # Errors
    /// - [`StateConflictError::CompanionAlive`] if it is not dead
    /// - insufficient balance for the rule's cost
    pub fn rebirth(
        &self,
        ledger: &RewardLedger,
        account: &mut Account,
        roster: &mut Roster,
        companion_id: CompanionId,
        rule: &dyn RebirthRule,
        clock: &dyn Clock,
    ) -> Result<Vec<Event>> {
        let dead = roster
            .get(companion_id)
            .ok_or(StateConflictError::CompanionNotFound { companion_id })?;
        if !dead.is_dead() {
            return Err(StateConflictError::CompanionAlive { companion_id }.into());
        }
        let now = clock.now();
        let cost = rule.cost(dead);
        let mut reborn = rule.reborn(dead, now);
        let mut events = Vec::new();
        if cost > 0 {
            events.push(ledger.spend(account, cost, clock)?);
        }

        reborn.id = dead.id;
        reborn.owner = dead.owner.clone();
        reborn.status = reborn.resolve_status();
        let slot = roster
            .get_mut(companion_id)
            .ok_or(StateConflictError::CompanionNotFound { companion_id })?;
        *slot = reborn;
        debug!(companion_id, cost, "companion reborn");
        events.push(Event::CompanionStatusChanged {
            companion_id,
            status: slot.status,
            at: now,
        });
        Ok(events)
    }
}

fn refresh_status(c: &mut Companion, at: DateTime<Utc>) -> Option<Event> {
    let status = c.resolve_status();
    if status == c.status {
        return None;
    }
    c.status = status;
    Some(Event::CompanionStatusChanged {
        companion_id: c.id,
        status,
        at,
    })
}
