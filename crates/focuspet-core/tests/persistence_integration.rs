//! FocusCore over an on-disk SQLite store.

use std::sync::Arc;

use chrono::DateTime;
use focuspet_core::{
    CareAction, Config, Database, Event, FocusCore, GameKind, KvStore, ManualClock, TaskCategory,
    TaskFilter, TaskPriority, UserId,
};

const START: i64 = 1_709_251_200;

fn core_at(path: &std::path::Path, clock: Arc<ManualClock>) -> (FocusCore, Arc<Database>) {
    let db = Arc::new(Database::open_at(path).unwrap());
    let core = FocusCore::new(&Config::default(), db.clone(), clock).unwrap();
    (core, db)
}

#[test]
fn progress_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focuspet.db");
    let clock = Arc::new(ManualClock::at_epoch_secs(START));
    let user = UserId::from("alice");

    {
        let (core, _) = core_at(&path, clock.clone());
        core.mint(&user).unwrap();
        core.start_lesson(&user, 1).unwrap();
        core.advance_page(&user, 1, 2).unwrap();
        clock.advance_secs(90);
        let outcome = core.complete_lesson(&user, 1).unwrap();
        assert!(outcome.rejected_claims.is_empty());
        let events = core.interact(&user, 0, CareAction::Groom).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::BalanceDebited { amount: 8, .. })));
        core.add_task(&user, "Review notes", TaskPriority::High, TaskCategory::Study)
            .unwrap();
        core.toggle_task(&user, 0).unwrap();
        core.record_game(&user, GameKind::Reaction, 14).unwrap();
    }

    let (core, db) = core_at(&path, clock.clone());
    let state = core.state(&user).unwrap();
    assert_eq!(state.account.balance, 2);
    assert_eq!(state.account.total_earned, 10);
    assert_eq!(state.account.total_spent, 8);
    assert_eq!(state.roster.get(0).unwrap().total_interact_count, 1);
    assert!(state.certificates.has_certificate(1));
    assert_eq!(core.users().unwrap(), vec![user.clone()]);
    assert_eq!(core.tasks(&user, TaskFilter::Completed).unwrap().len(), 1);
    assert_eq!(state.progress.best_score(GameKind::Reaction), Some(14));
    // 40 * 1/1 + one game * 10
    assert_eq!(core.progress(&user).unwrap().focus_score, 50);

    // The accepted claim is mirrored into the audit table.
    let since = DateTime::from_timestamp(START, 0).unwrap();
    assert_eq!(db.earned_since("alice", since).unwrap(), 10);
}

#[test]
fn stored_snapshot_is_plain_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focuspet.db");
    let clock = Arc::new(ManualClock::at_epoch_secs(START));
    let (core, db) = core_at(&path, clock);
    let user = UserId::from("bob");

    core.start_timer(&user).unwrap();
    let raw = db.get("user:bob").unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["account"]["user"], "bob");
    assert_eq!(json["timer"]["state"], "running");
}
