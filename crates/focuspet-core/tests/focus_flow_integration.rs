//! End-to-end flows across the rule engines, driven by a manual clock.

use focuspet_core::{
    Account, Clock, CompanionSimulator, CompanionStatus, CoreError, Event, FoodTier,
    LessonCatalog, LessonValidator, ManualClock, RateLimitedError, RewardLedger, Roster,
    StateConflictError, TimerConfig, UserId, UserState,
};

// 2024-03-01T00:00:00Z
const MARCH_FIRST: i64 = 1_709_251_200;
const DAY: i64 = 24 * 60 * 60;

#[test]
fn reading_lesson_one_pays_ten_exactly_once() {
    let clock = ManualClock::at_epoch_secs(MARCH_FIRST);
    let catalog = LessonCatalog::default();
    let ledger = RewardLedger::default();
    let mut validator = LessonValidator::new();
    let mut account = Account::new(UserId::from("alice"));

    validator.start(1, &catalog, &clock).unwrap();
    validator.advance_page(1, 2, &catalog).unwrap();
    clock.advance_secs(75);
    let completed = validator.complete(1, &catalog, &clock).unwrap();
    assert!(matches!(
        completed,
        Event::LessonCompleted {
            lesson_id: 1,
            study_time_secs: 75,
            ..
        }
    ));

    let credit = ledger.claim_lesson(&mut account, 1, 75, &clock).unwrap();
    assert!(matches!(
        credit,
        Event::RewardCredited {
            amount: 10,
            new_balance: 10,
            ..
        }
    ));
    assert_eq!(account.stats.total_lessons_completed, 1);
    assert_eq!(account.stats.total_study_time_secs, 75);
    assert_eq!(account.stats.current_streak, 1);

    let err = ledger.claim_lesson(&mut account, 1, 75, &clock).unwrap_err();
    assert!(matches!(
        err,
        CoreError::StateConflict(StateConflictError::AlreadyClaimed { lesson_id: 1 })
    ));
    assert_eq!(account.balance, 10);
}

#[test]
fn eleventh_focus_claim_of_the_day_is_refused() {
    let clock = ManualClock::at_epoch_secs(MARCH_FIRST);
    let ledger = RewardLedger::default();
    let mut account = Account::new(UserId::from("bob"));

    for _ in 0..10 {
        let credit = ledger.claim_focus_session(&mut account, &clock).unwrap();
        let Event::RewardCredited { amount, .. } = &credit else {
            panic!("expected a credit, got {credit:?}");
        };
        assert!((2..=5).contains(amount));
        clock.advance_secs(25 * 60);
    }

    let err = ledger
        .claim_focus_session(&mut account, &clock)
        .unwrap_err();
    match err {
        CoreError::RateLimited(RateLimitedError::DailyLimitReached {
            limit,
            retry_after_secs,
        }) => {
            assert_eq!(limit, 10);
            assert_eq!(retry_after_secs, (DAY - 10 * 25 * 60) as u64);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(account.stats.total_focus_sessions, 10);

    // A new day opens the ceiling again.
    clock.set(chrono::DateTime::from_timestamp(MARCH_FIRST + DAY, 0).unwrap());
    assert!(ledger.claim_focus_session(&mut account, &clock).is_ok());
}

#[test]
fn focus_claims_respect_the_interval() {
    let clock = ManualClock::at_epoch_secs(MARCH_FIRST);
    let ledger = RewardLedger::default();
    let mut account = Account::new(UserId::from("carol"));

    ledger.claim_focus_session(&mut account, &clock).unwrap();
    clock.advance_secs(10 * 60);
    let err = ledger
        .claim_focus_session(&mut account, &clock)
        .unwrap_err();
    assert_eq!(err.retry_after_secs(), Some(15 * 60));
    let balance = account.balance;
    assert_eq!(account.claims.len(), 1);

    clock.advance_secs(15 * 60);
    ledger.claim_focus_session(&mut account, &clock).unwrap();
    assert!(account.balance > balance);
}

#[test]
fn streak_follows_calendar_days() {
    let clock = ManualClock::at_epoch_secs(MARCH_FIRST + 9 * 60 * 60);
    let ledger = RewardLedger::default();
    let mut account = Account::new(UserId::from("dana"));

    ledger.claim_focus_session(&mut account, &clock).unwrap();
    clock.advance_secs(DAY);
    ledger.claim_focus_session(&mut account, &clock).unwrap();
    clock.advance_secs(DAY);
    ledger.claim_focus_session(&mut account, &clock).unwrap();
    assert_eq!(account.stats.current_streak, 3);

    clock.advance_secs(2 * DAY);
    ledger.claim_focus_session(&mut account, &clock).unwrap();
    assert_eq!(account.stats.current_streak, 1);
    assert_eq!(account.stats.longest_streak, 3);
}

#[test]
fn earned_currency_keeps_a_companion_alive() {
    let clock = ManualClock::at_epoch_secs(MARCH_FIRST);
    let ledger = RewardLedger::default();
    let sim = CompanionSimulator::default();
    let mut account = Account::new(UserId::from("erin"));
    let mut roster = Roster::new();

    sim.mint(&ledger, &mut account, &mut roster, &clock).unwrap();
    ledger.claim_lesson(&mut account, 6, 300, &clock).unwrap();
    assert_eq!(account.balance, 35);

    clock.advance_secs(40 * 60);
    sim.tick(&mut roster, 0, &clock).unwrap();
    let hungry_before = roster.get(0).unwrap().hunger;
    let events = sim
        .feed(&ledger, &mut account, &mut roster, 0, FoodTier::Premium, &clock)
        .unwrap();
    assert!(matches!(
        events[0],
        Event::BalanceDebited {
            amount: 15,
            new_balance: 20,
            ..
        }
    ));
    assert!(roster.get(0).unwrap().hunger > hungry_before);
}

#[test]
fn a_month_of_neglect_kills_the_companion() {
    let clock = ManualClock::at_epoch_secs(MARCH_FIRST);
    let ledger = RewardLedger::default();
    let sim = CompanionSimulator::default();
    let mut account = Account::new(UserId::from("frank"));
    let mut roster = Roster::new();
    sim.mint(&ledger, &mut account, &mut roster, &clock).unwrap();

    clock.advance_secs(60 * 60);
    sim.tick(&mut roster, 0, &clock).unwrap();
    let pet = roster.get(0).unwrap();
    assert!(pet.hunger < 100);
    assert!(pet.happiness < 100);

    clock.advance_secs(30 * DAY);
    sim.tick_all(&mut roster, &clock);
    let pet = roster.get(0).unwrap();
    assert_eq!(pet.status, CompanionStatus::Dead);
    assert_eq!(pet.health, 0);

    let err = sim
        .feed(&ledger, &mut account, &mut roster, 0, FoodTier::Basic, &clock)
        .unwrap_err();
    assert!(matches!(err, CoreError::TerminalState(_)));
}

#[test]
fn user_state_survives_a_json_round_trip_mid_flow() {
    let clock = ManualClock::at_epoch_secs(MARCH_FIRST);
    let catalog = LessonCatalog::default();
    let ledger = RewardLedger::default();
    let sim = CompanionSimulator::default();
    let mut state = UserState::new(UserId::from("gina"), TimerConfig::new(5, 2, 3).unwrap());

    state.timer.start(&clock);
    state.timer.tick_for(3, &clock);
    state.lessons.start(2, &catalog, &clock).unwrap();
    state.lessons.advance_page(2, 2, &catalog).unwrap();
    sim.mint(&ledger, &mut state.account, &mut state.roster, &clock)
        .unwrap();
    ledger
        .claim_focus_session(&mut state.account, &clock)
        .unwrap();

    let json = serde_json::to_string(&state).unwrap();
    let mut resumed: UserState = serde_json::from_str(&json).unwrap();
    assert_eq!(resumed, state);

    // Both copies evolve identically from here.
    clock.advance_secs(30 * 60);
    let a = state.timer.tick_for(2, &clock);
    let b = resumed.timer.tick_for(2, &clock);
    assert_eq!(a, b);
    assert_eq!(
        sim.tick_all(&mut state.roster, &clock),
        sim.tick_all(&mut resumed.roster, &clock)
    );
    clock.advance_secs(30 * 60);
    assert_eq!(
        ledger
            .claim_focus_session(&mut state.account, &clock)
            .unwrap(),
        ledger
            .claim_focus_session(&mut resumed.account, &clock)
            .unwrap()
    );
    assert_eq!(resumed, state);
    assert_eq!(clock.now().timestamp(), MARCH_FIRST + 60 * 60);
}
