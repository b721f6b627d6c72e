//! Per-user orchestration over a durable store.
//!
//! Every operation runs under that user's lock: load and validate the
//! snapshot, apply the rules to a working copy, hand accepted currency
//! operations to the relay (if any), then commit the snapshot and its new
//! claims in one store write. A failure anywhere leaves the stored state
//! untouched, and relayed requests of a failed operation are reverted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::certificate::CertificateRegistry;
use crate::clock::Clock;
use crate::companion::{CareAction, CompanionId, CompanionSimulator, FoodTier, RebirthRule, Roster};
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::events::Event;
use crate::ledger::{Account, RewardLedger, UserId, UserStats};
use crate::lesson::{LearningSession, LessonCatalog, LessonId, LessonValidator};
use crate::progress::{GameKind, MeditationKind, ProgressLog, ProgressSummary};
use crate::relay::{LedgerRelay, RelayRequest};
use crate::storage::{Config, KvStore};
use crate::tasks::{Task, TaskCategory, TaskFilter, TaskId, TaskList, TaskPriority, TaskStats};
use crate::timer::{TimerConfig, TimerEngine, TimerState};

const USER_KEY_PREFIX: &str = "user:";

/// Everything the core keeps for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub account: Account,
    #[serde(default)]
    pub roster: Roster,
    #[serde(default)]
    pub certificates: CertificateRegistry,
    #[serde(default)]
    pub timer: TimerEngine,
    #[serde(default)]
    pub lessons: LessonValidator,
    #[serde(default)]
    pub tasks: TaskList,
    #[serde(default)]
    pub progress: ProgressLog,
}

impl UserState {
    pub fn new(user: UserId, timer: TimerConfig) -> Self {
        Self {
            account: Account::new(user),
            roster: Roster::new(),
            certificates: CertificateRegistry::new(),
            timer: TimerEngine::new(timer),
            lessons: LessonValidator::new(),
            tasks: TaskList::new(),
            progress: ProgressLog::new(),
        }
    }

    /// Check every invariant a snapshot read back from a store must hold
    /// before the rules run on it.
    ///
    /// # Errors
    /// The first violated invariant, as a validation error.
    pub fn validate(&self, user: &UserId, catalog: &LessonCatalog) -> Result<(), ValidationError> {
        self.account.validate(user)?;
        self.timer.validate()?;
        self.lessons.validate(catalog)?;
        self.roster.validate(user)?;
        self.certificates.validate(user)?;
        self.tasks.validate()
    }
}

/// Events from an operation that may also earn a reward.
///
/// The underlying transition (a finished period, a completed lesson) is
/// committed even when the reward is refused by the ledger rules; those
/// refusals are collected here instead of failing the call.
#[derive(Debug, Default)]
pub struct Outcome {
    pub events: Vec<Event>,
    pub rejected_claims: Vec<CoreError>,
}

struct Staged<T> {
    value: T,
    relay: Vec<RelayRequest>,
}

impl<T> Staged<T> {
    fn local(value: T) -> Self {
        Self {
            value,
            relay: Vec::new(),
        }
    }
}

pub struct FocusCore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ledger: RewardLedger,
    companions: CompanionSimulator,
    timer_config: TimerConfig,
    relay: Option<Arc<dyn LedgerRelay>>,
    /// Entries exist only while an operation for that user holds or awaits
    /// the lock.
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl FocusCore {
    /// # Errors
    /// Returns a validation error if any section of `config` is invalid.
    pub fn new(config: &Config, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            ledger: config.reward_ledger()?,
            companions: config.companion_simulator()?,
            timer_config: config.timer.clone(),
            relay: None,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Mirror every currency operation to `relay` before committing it.
    pub fn with_relay(mut self, relay: Arc<dyn LedgerRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    pub fn companions(&self) -> &CompanionSimulator {
        &self.companions
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Current state for `user`; a fresh state if none was stored.
    pub fn state(&self, user: &UserId) -> Result<UserState> {
        self.transact(user, |state| Ok(Staged::local(state.clone())))
    }

    pub fn balance(&self, user: &UserId) -> Result<u64> {
        Ok(self.state(user)?.account.balance)
    }

    pub fn stats(&self, user: &UserId) -> Result<UserStats> {
        Ok(self.state(user)?.account.stats)
    }

    /// Users with stored state, in key order.
    pub fn users(&self) -> Result<Vec<UserId>> {
        Ok(self
            .store
            .keys(USER_KEY_PREFIX)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(USER_KEY_PREFIX).map(UserId::from))
            .collect())
    }

    /// Metadata URI for a certificate the user holds.
    pub fn certificate_uri(&self, user: &UserId, lesson_id: LessonId) -> Result<Option<String>> {
        let state = self.state(user)?;
        let Some(certificate) = state.certificates.get(lesson_id) else {
            return Ok(None);
        };
        let lesson = self.ledger.catalog().require(lesson_id)?;
        certificate.token_uri(lesson).map(Some)
    }

    // ── Timer ────────────────────────────────────────────────────────

    pub fn start_timer(&self, user: &UserId) -> Result<Option<Event>> {
        self.transact(user, |state| {
            Ok(Staged::local(state.timer.start(self.clock.as_ref())))
        })
    }

    pub fn pause_timer(&self, user: &UserId) -> Result<Event> {
        self.transact(user, |state| {
            Ok(Staged::local(state.timer.pause(self.clock.as_ref())?))
        })
    }

    pub fn reset_timer(&self, user: &UserId) -> Result<Event> {
        self.transact(user, |state| {
            Ok(Staged::local(state.timer.reset(self.clock.as_ref())))
        })
    }

    pub fn timer_snapshot(&self, user: &UserId) -> Result<Event> {
        Ok(self.state(user)?.timer.snapshot(self.clock.as_ref()))
    }

    pub fn configure_timer(
        &self,
        user: &UserId,
        focus_secs: u64,
        break_secs: u64,
        long_break_secs: u64,
    ) -> Result<()> {
        self.transact(user, |state| {
            state
                .timer
                .configure(focus_secs, break_secs, long_break_secs)?;
            Ok(Staged::local(()))
        })
    }

    /// Advance the user's timer by `secs` seconds. Each completed focus
    /// period counts toward today's focus time and is claimed for a reward
    /// on the spot.
    pub fn tick_timer(&self, user: &UserId, secs: u64) -> Result<Outcome> {
        let clock = self.clock.as_ref();
        self.transact(user, |state| {
            let mut outcome = Outcome::default();
            let mut relay = Vec::new();
            for _ in 0..secs {
                if state.timer.state() != TimerState::Running {
                    break;
                }
                let Some(event) = state.timer.tick(clock) else {
                    continue;
                };
                let focus_done = matches!(event, Event::FocusCompleted { .. });
                outcome.events.push(event);
                if !focus_done {
                    continue;
                }
                let day = self.ledger.policy().day_of(clock.now());
                state
                    .progress
                    .record_focus(day, state.timer.config().focus_secs);
                match self.ledger.claim_focus_session(&mut state.account, clock) {
                    Ok(credit) => {
                        relay.push(RelayRequest::ClaimFocusSession {
                            user: user.clone(),
                            amount: amount_of(&credit),
                        });
                        outcome.events.push(credit);
                    }
                    Err(e) => outcome.rejected_claims.push(e),
                }
            }
            Ok(Staged {
                value: outcome,
                relay,
            })
        })
    }

    /// Claim a focus reward outside the timer, e.g. for a session timed by
    /// the host.
    pub fn claim_focus_session(&self, user: &UserId) -> Result<Event> {
        self.transact(user, |state| {
            let credit = self
                .ledger
                .claim_focus_session(&mut state.account, self.clock.as_ref())?;
            Ok(Staged {
                relay: vec![RelayRequest::ClaimFocusSession {
                    user: user.clone(),
                    amount: amount_of(&credit),
                }],
                value: credit,
            })
        })
    }

    // ── Lessons ──────────────────────────────────────────────────────

    pub fn start_lesson(&self, user: &UserId, lesson_id: LessonId) -> Result<Option<Event>> {
        self.transact(user, |state| {
            let started = state
                .lessons
                .start(lesson_id, self.ledger.catalog(), self.clock.as_ref())?;
            Ok(Staged::local(started))
        })
    }

    pub fn advance_page(
        &self,
        user: &UserId,
        lesson_id: LessonId,
        page: u32,
    ) -> Result<LearningSession> {
        self.transact(user, |state| {
            let session = state
                .lessons
                .advance_page(lesson_id, page, self.ledger.catalog())?;
            Ok(Staged::local(session.clone()))
        })
    }

    pub fn close_lesson(&self, user: &UserId) -> Result<Option<LearningSession>> {
        self.transact(user, |state| Ok(Staged::local(state.lessons.close())))
    }

    /// Complete the open lesson, then claim its reward and certificate.
    ///
    /// # Errors
    /// Any lesson rule failure; the session stays open in that case. A
    /// refused reward (e.g. already claimed) is reported in the outcome.
    pub fn complete_lesson(&self, user: &UserId, lesson_id: LessonId) -> Result<Outcome> {
        let clock = self.clock.as_ref();
        let catalog = self.ledger.catalog();
        self.transact(user, |state| {
            let study_time_secs = state.lessons.check_complete(lesson_id, catalog, clock)?;
            let mut outcome = Outcome {
                events: vec![state.lessons.complete(lesson_id, catalog, clock)?],
                rejected_claims: Vec::new(),
            };
            let mut relay = Vec::new();
            match self
                .ledger
                .claim_lesson(&mut state.account, lesson_id, study_time_secs, clock)
            {
                Ok(credit) => {
                    relay.push(RelayRequest::ClaimLesson {
                        user: user.clone(),
                        lesson_id,
                        study_time_secs,
                        amount: amount_of(&credit),
                    });
                    outcome.events.push(credit);
                    outcome.events.push(state.certificates.issue(
                        user,
                        lesson_id,
                        study_time_secs,
                        clock,
                    )?);
                }
                Err(e) => outcome.rejected_claims.push(e),
            }
            Ok(Staged {
                value: outcome,
                relay,
            })
        })
    }

    // ── Companions ───────────────────────────────────────────────────

    pub fn mint(&self, user: &UserId) -> Result<Vec<Event>> {
        self.transact(user, |state| {
            let price = self.companions.mint_price(&state.roster);
            let events = self.companions.mint(
                &self.ledger,
                &mut state.account,
                &mut state.roster,
                self.clock.as_ref(),
            )?;
            let companion_id = state.roster.len() as CompanionId - 1;
            Ok(Staged {
                value: events,
                relay: vec![RelayRequest::Mint {
                    user: user.clone(),
                    companion_id,
                    price,
                }],
            })
        })
    }

    /// Catch the companion up to now, then feed it. Decay events come first.
    pub fn feed(
        &self,
        user: &UserId,
        companion_id: CompanionId,
        tier: FoodTier,
    ) -> Result<Vec<Event>> {
        self.transact(user, |state| {
            let clock = self.clock.as_ref();
            let mut events = self.companions.tick(&mut state.roster, companion_id, clock)?;
            events.extend(self.companions.feed(
                &self.ledger,
                &mut state.account,
                &mut state.roster,
                companion_id,
                tier,
                clock,
            )?);
            Ok(Staged {
                value: events,
                relay: vec![RelayRequest::Feed {
                    user: user.clone(),
                    companion_id,
                    tier,
                    cost: tier.cost(),
                }],
            })
        })
    }

    pub fn interact(
        &self,
        user: &UserId,
        companion_id: CompanionId,
        action: CareAction,
    ) -> Result<Vec<Event>> {
        self.transact(user, |state| {
            let clock = self.clock.as_ref();
            let mut events = self.companions.tick(&mut state.roster, companion_id, clock)?;
            events.extend(self.companions.interact(
                &self.ledger,
                &mut state.account,
                &mut state.roster,
                companion_id,
                action,
                clock,
            )?);
            Ok(Staged {
                value: events,
                relay: vec![RelayRequest::Interact {
                    user: user.clone(),
                    companion_id,
                    action,
                    cost: action.cost(),
                }],
            })
        })
    }

    /// Catch every companion of `user` up to now.
    pub fn tick_companions(&self, user: &UserId) -> Result<Vec<Event>> {
        self.transact(user, |state| {
            Ok(Staged::local(
                self.companions
                    .tick_all(&mut state.roster, self.clock.as_ref()),
            ))
        })
    }

    pub fn rebirth(
        &self,
        user: &UserId,
        companion_id: CompanionId,
        rule: &dyn RebirthRule,
    ) -> Result<Vec<Event>> {
        self.transact(user, |state| {
            let events = self.companions.rebirth(
                &self.ledger,
                &mut state.account,
                &mut state.roster,
                companion_id,
                rule,
                self.clock.as_ref(),
            )?;
            let cost = events
                .iter()
                .find_map(|e| match e {
                    Event::BalanceDebited { amount, .. } => Some(*amount),
                    _ => None,
                })
                .unwrap_or(0);
            Ok(Staged {
                value: events,
                relay: vec![RelayRequest::Rebirth {
                    user: user.clone(),
                    companion_id,
                    cost,
                }],
            })
        })
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn add_task(
        &self,
        user: &UserId,
        title: &str,
        priority: TaskPriority,
        category: TaskCategory,
    ) -> Result<Event> {
        self.transact(user, |state| {
            let added = state
                .tasks
                .add(title, priority, category, self.clock.as_ref())?;
            Ok(Staged::local(added))
        })
    }

    pub fn toggle_task(&self, user: &UserId, task_id: TaskId) -> Result<Event> {
        self.transact(user, |state| {
            Ok(Staged::local(state.tasks.toggle(task_id, self.clock.as_ref())?))
        })
    }

    pub fn delete_task(&self, user: &UserId, task_id: TaskId) -> Result<Event> {
        self.transact(user, |state| {
            Ok(Staged::local(state.tasks.delete(task_id, self.clock.as_ref())?))
        })
    }

    pub fn tasks(&self, user: &UserId, filter: TaskFilter) -> Result<Vec<Task>> {
        Ok(self.state(user)?.tasks.filter(filter).cloned().collect())
    }

    pub fn task_stats(&self, user: &UserId) -> Result<TaskStats> {
        Ok(self.state(user)?.tasks.stats())
    }

    // ── Progress ─────────────────────────────────────────────────────

    pub fn record_game(&self, user: &UserId, game: GameKind, score: u32) -> Result<Event> {
        self.transact(user, |state| {
            Ok(Staged::local(
                state.progress.record_game(game, score, self.clock.as_ref()),
            ))
        })
    }

    pub fn record_meditation(
        &self,
        user: &UserId,
        kind: MeditationKind,
        duration_secs: u64,
    ) -> Result<Event> {
        self.transact(user, |state| {
            let recorded = state.progress.record_meditation(
                kind,
                duration_secs,
                self.clock.as_ref(),
            )?;
            Ok(Staged::local(recorded))
        })
    }

    /// Today's focus time, the live streak, completed tasks and focus score.
    pub fn progress(&self, user: &UserId) -> Result<ProgressSummary> {
        let state = self.state(user)?;
        let today = self.ledger.policy().day_of(self.clock.now());
        let tasks = state.tasks.stats();
        Ok(ProgressSummary {
            today_focus_secs: state.progress.focus_secs_on(today),
            current_streak: state.account.stats.streak_on(today),
            completed_tasks: tasks.completed,
            focus_score: state.progress.focus_score(&tasks),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn user_lock(&self, user: &UserId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| DatabaseError::Locked)?;
        Ok(locks.entry(user.clone()).or_default().clone())
    }

    /// Drop the user's entry once nobody else holds a handle to it.
    fn release_lock(&self, user: &UserId) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        if locks.get(user).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(user);
        }
    }

    fn load(&self, user: &UserId) -> Result<UserState> {
        let Some(json) = self.store.get(&user_key(user))? else {
            return Ok(UserState::new(user.clone(), self.timer_config.clone()));
        };
        let state: UserState = serde_json::from_str(&json)?;
        if let Err(e) = state.validate(user, self.ledger.catalog()) {
            warn!(user = %user, error = %e, "stored state rejected");
            return Err(e.into());
        }
        Ok(state)
    }

    fn transact<T>(
        &self,
        user: &UserId,
        op: impl FnOnce(&mut UserState) -> Result<Staged<T>>,
    ) -> Result<T> {
        let lock = self.user_lock(user)?;
        let result = match lock.lock() {
            Ok(_guard) => self.run(user, op),
            Err(_) => Err(DatabaseError::Locked.into()),
        };
        drop(lock);
        self.release_lock(user);
        result
    }

    fn run<T>(
        &self,
        user: &UserId,
        op: impl FnOnce(&mut UserState) -> Result<Staged<T>>,
    ) -> Result<T> {
        let stored = self.load(user)?;
        let mut working = stored.clone();
        let staged = op(&mut working)?;
        let snapshot = if working != stored {
            Some(serde_json::to_string(&working)?)
        } else {
            None
        };

        let mut accepted = Vec::with_capacity(staged.relay.len());
        for request in &staged.relay {
            if let Err(e) = self.submit(request) {
                self.revert(&accepted);
                return Err(e);
            }
            accepted.push(request);
        }

        if let Some(snapshot) = snapshot {
            let new_claims = working
                .account
                .claims
                .get(stored.account.claims.len()..)
                .unwrap_or_default();
            if let Err(e) = self.store.commit(&user_key(user), &snapshot, new_claims) {
                warn!(user = %user, error = %e, "commit failed");
                self.revert(&accepted);
                return Err(e.into());
            }
            debug!(user = %user, claims = new_claims.len(), "user state committed");
        }
        Ok(staged.value)
    }

    fn revert(&self, accepted: &[&RelayRequest]) {
        let Some(relay) = &self.relay else {
            return;
        };
        for request in accepted.iter().rev() {
            debug!(
                relay = relay.name(),
                operation = request.operation(),
                "reverting relayed request"
            );
            relay.revert(request);
        }
    }

    fn submit(&self, request: &RelayRequest) -> Result<()> {
        let Some(relay) = &self.relay else {
            return Ok(());
        };
        relay.submit(request).map_err(|rejection| {
            warn!(
                relay = relay.name(),
                operation = request.operation(),
                user = %request.user(),
                %rejection,
                "relay rejected operation"
            );
            CoreError::Relay {
                operation: request.operation().to_string(),
                message: rejection.0,
            }
        })
    }
}

fn user_key(user: &UserId) -> String {
    format!("{USER_KEY_PREFIX}{user}")
}

fn amount_of(credit: &Event) -> u64 {
    match credit {
        Event::RewardCredited { amount, .. } => *amount,
        _ => 0,
    }
}
