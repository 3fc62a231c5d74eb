use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use haulboard_core::db::{Database, ScheduleRepository, SqliteChangeFeed, SqlitePersistence};
use haulboard_core::store::StoreEvent;
use haulboard_core::{
    ChangeKind, CommitOutcome, CoreConfig, Key, MoveController, MoveStep, Pointer, RemoteOutcome,
    Schedule, ScheduleId, SchedulePatch,
};
use pretty_assertions::assert_eq;

fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
}

fn seeded_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    let repo = db.schedules();
    for (id, from, to, driver) in [
        ("a", "2025-01-10 10:00", "2025-01-10 11:00", "D1"),
        ("b", "2025-01-10 12:00", "2025-01-10 13:00", "D1"),
        ("c", "2025-01-10 12:00", "2025-01-10 13:00", "D2"),
    ] {
        let schedule = Schedule::new(at(from), at(to))
            .unwrap()
            .with_id(id)
            .with_driver(driver);
        repo.create(&schedule).unwrap();
    }
    db
}

fn controller_for(db: &Database) -> MoveController {
    let mut controller = MoveController::from_config(CoreConfig::default()).unwrap();
    controller
        .store_mut()
        .load(db.schedules().list().unwrap());
    controller
}

#[tokio::test]
async fn drag_commit_echo_and_undo() {
    let db = seeded_db();
    let persistence = SqlitePersistence::new(&db);
    let mut feed = SqliteChangeFeed::from_latest(&db).unwrap();
    let mut controller = controller_for(&db);
    let now = Instant::now();

    // drag "a" down four hours: 40px per hour on the default axis
    controller.pointer_down(&ScheduleId::from("a"), Pointer::new(10.0, 100.0));
    controller.pointer_move(Pointer::new(10.0, 260.0));
    assert_eq!(controller.pointer_up(now), MoveStep::ReadyToCommit);
    let outcome = controller.commit(&persistence).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));

    let stored = db.schedules().get(&ScheduleId::from("a")).unwrap().unwrap();
    assert_eq!(stored.loading_at, at("2025-01-10 14:00"));

    // the database echoes our own update; it must not be re-applied
    for (_, change) in feed.poll(100).unwrap() {
        assert_eq!(
            controller.handle_remote(change, now + Duration::from_millis(200)),
            RemoteOutcome::Suppressed
        );
    }
    assert!(controller.store_mut().drain_events().is_empty());

    // another user reassigns "c"; that change is applied and announced
    db.schedules()
        .update(
            &ScheduleId::from("c"),
            &SchedulePatch {
                driver_id: Some(Some("D3".to_string())),
                ..SchedulePatch::default()
            },
        )
        .unwrap();
    for (_, change) in feed.poll(100).unwrap() {
        assert_eq!(
            controller.handle_remote(change, now + Duration::from_millis(400)),
            RemoteOutcome::Applied
        );
    }
    assert_eq!(
        controller.store_mut().drain_events(),
        vec![StoreEvent::ChangedByOther {
            kind: ChangeKind::Update,
            schedule_id: ScheduleId::from("c"),
        }]
    );

    let undone = controller.undo(&persistence, now).await.unwrap();
    assert!(matches!(undone, CommitOutcome::Undone(_)));
    let restored = db.schedules().get(&ScheduleId::from("a")).unwrap().unwrap();
    assert_eq!(restored.loading_at, at("2025-01-10 10:00"));
    assert!(!controller.can_undo());
}

#[tokio::test]
async fn keyboard_move_onto_busy_driver_needs_confirmation() {
    let db = seeded_db();
    let persistence = SqlitePersistence::new(&db);
    let mut controller = controller_for(&db);
    let now = Instant::now();
    let a = ScheduleId::from("a");

    assert_eq!(controller.key(Key::Enter, Some(&a), now), MoveStep::Started);
    for _ in 0..8 {
        controller.key(Key::Down, None, now);
    }
    // 12:00-13:00 overlaps "b" on D1 but not "c" on D2
    assert!(controller.highlighted().contains(&ScheduleId::from("b")));
    assert!(!controller.highlighted().contains(&ScheduleId::from("c")));

    let MoveStep::NeedsConfirmation(check) = controller.key(Key::Enter, None, now) else {
        panic!("expected a conflict prompt");
    };
    assert_eq!(check.summary, "1 conflicting schedule");
    assert_eq!(check.max_severity().map(|s| s.level()), Some(3));

    assert_eq!(controller.confirm(now), MoveStep::ReadyToCommit);
    controller.commit(&persistence).await.unwrap();
    let stored = db.schedules().get(&a).unwrap().unwrap();
    assert_eq!(stored.loading_at, at("2025-01-10 12:00"));
}

#[tokio::test]
async fn commit_against_vanished_row_rolls_back() {
    let db = seeded_db();
    let persistence = SqlitePersistence::new(&db);
    let mut controller = controller_for(&db);
    let now = Instant::now();
    let a = ScheduleId::from("a");

    controller.key(Key::Enter, Some(&a), now);
    controller.key(Key::Right, None, now);
    assert_eq!(controller.key(Key::Enter, None, now), MoveStep::ReadyToCommit);

    // removed by someone else before our write lands
    db.schedules().delete(&a).unwrap();

    let error = controller.commit(&persistence).await.unwrap_err();
    assert!(error.is_retryable());
    assert_eq!(
        controller.store().get(&a).unwrap().loading_at,
        at("2025-01-10 10:00")
    );
    assert!(!controller.can_undo());
}
