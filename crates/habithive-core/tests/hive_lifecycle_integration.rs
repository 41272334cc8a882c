//! Integration tests for the hive lifecycle.
//!
//! Tests the full workflow from hive creation through invites, member
//! logging, consensus advancement, and the leaderboard, against the
//! SQLite store.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use habithive_core::service::{NewHive, NewHabit};
use habithive_core::{
    ConflictError, CoreError, Engine, HabitKind, HiveRule, Profile, SqliteStore, Store,
};

fn engine() -> Engine<SqliteStore> {
    Engine::new(SqliteStore::open_memory().unwrap())
}

fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn register(engine: &Engine<SqliteStore>, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    engine
        .upsert_profile(&Profile {
            id,
            display_name: name.to_string(),
            avatar_url: None,
            utc_offset_minutes: 0,
            day_start_hour: 0,
        })
        .unwrap();
    id
}

fn new_hive(name: &str, rule: HiveRule, threshold: Option<u32>, max_members: u32) -> NewHive {
    NewHive {
        name: name.to_string(),
        color_hex: "#FF9F1C".to_string(),
        kind: HabitKind::Checkbox,
        target_per_day: 1,
        rule,
        threshold,
        schedule_daily: true,
        schedule_weekmask: 127,
        max_members,
    }
}

#[test]
fn test_full_hive_workflow() {
    let engine = engine();
    let owner = register(&engine, "Owner");
    let ana = register(&engine, "Ana");
    let bo = register(&engine, "Bo");
    let now = at(2025, 6, 14, 9);

    let hive = engine
        .create_hive(owner, new_hive("Morning run", HiveRule::AllMustComplete, None, 5), now)
        .unwrap();
    let invite = engine.create_invite(owner, hive.id, 10080, 20, now).unwrap();
    assert_eq!(invite.code.len(), 12);

    engine.join_hive(ana, &invite.code, now).unwrap();
    engine.join_hive(bo, &invite.code, now).unwrap();

    // Two of three log; all_must_complete does not advance.
    engine.log_hive_day(owner, hive.id, 1, None, now).unwrap();
    engine.log_hive_day(ana, hive.id, 1, None, now).unwrap();
    let blocked = engine.advance_hive(owner, hive.id, None, now).unwrap();
    assert!(!blocked.advanced);
    assert_eq!(blocked.complete_count, 2);
    assert_eq!(blocked.required_count, 3);

    // The third member completes; the day advances exactly once.
    engine.log_hive_day(bo, hive.id, 1, None, now).unwrap();
    let advanced = engine.advance_hive(owner, hive.id, None, now).unwrap();
    assert!(advanced.advanced);
    assert_eq!(advanced.current_streak, 1);
    let repeat = engine.advance_hive(ana, hive.id, None, now).unwrap();
    assert!(!repeat.advanced);
    assert_eq!(repeat.current_streak, 1);

    // Detail view reflects the roster and today's evaluation.
    let detail = engine.hive_detail(ana, hive.id, now).unwrap();
    assert_eq!(detail.members.len(), 3);
    assert_eq!(detail.today_status.complete_count, 3);
    assert!(detail
        .recent_activity
        .iter()
        .any(|e| matches!(e.kind, habithive_core::ActivityKind::HiveAdvanced)));

    // Leaderboard from Ana's perspective ranks her co-members.
    let board = engine.leaderboard(ana, now).unwrap();
    assert_eq!(board.len(), 2);
    assert!(board.iter().all(|entry| entry.completed_today == 1));
}

#[test]
fn test_threshold_hive_advances_without_everyone() {
    let engine = engine();
    let owner = register(&engine, "Owner");
    let ana = register(&engine, "Ana");
    let now = at(2025, 6, 14, 9);

    let hive = engine
        .create_hive(owner, new_hive("Stretch", HiveRule::Threshold, Some(1), 5), now)
        .unwrap();
    let invite = engine.create_invite(owner, hive.id, 60, 5, now).unwrap();
    engine.join_hive(ana, &invite.code, now).unwrap();

    engine.log_hive_day(ana, hive.id, 1, None, now).unwrap();
    let outcome = engine.advance_hive(ana, hive.id, None, now).unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.complete_count, 1);
    assert_eq!(outcome.required_count, 2);
}

#[test]
fn test_streak_accumulates_across_days() {
    let engine = engine();
    let owner = register(&engine, "Owner");
    let hive = engine
        .create_hive(
            owner,
            new_hive("Read", HiveRule::AllMustComplete, None, 2),
            at(2025, 6, 10, 9),
        )
        .unwrap();

    for day_offset in 0..3 {
        let now = at(2025, 6, 10, 9) + Duration::days(day_offset);
        engine.log_hive_day(owner, hive.id, 1, None, now).unwrap();
        engine.advance_hive(owner, hive.id, None, now).unwrap();
    }

    let reloaded = engine.store().hive(hive.id).unwrap().unwrap();
    assert_eq!(reloaded.current_streak, 3);
    assert_eq!(reloaded.longest_streak, 3);
    assert_eq!(reloaded.last_advanced_on, Some(date(2025, 6, 12)));
}

#[test]
fn test_leave_rejoin_and_exhaustion() {
    let engine = engine();
    let owner = register(&engine, "Owner");
    let ana = register(&engine, "Ana");
    let bo = register(&engine, "Bo");
    let now = at(2025, 6, 14, 9);

    let carol = register(&engine, "Carol");
    let hive = engine
        .create_hive(owner, new_hive("Walk", HiveRule::AllMustComplete, None, 5), now)
        .unwrap();
    let invite = engine.create_invite(owner, hive.id, 60, 2, now).unwrap();

    engine.join_hive(ana, &invite.code, now).unwrap();
    engine.leave_hive(ana, hive.id, now).unwrap();

    // The departed member no longer blocks consensus.
    engine.log_hive_day(owner, hive.id, 1, None, now).unwrap();
    let outcome = engine.advance_hive(owner, hive.id, None, now).unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.required_count, 1);

    // Rejoining on a still-valid invite is free: the use count stays at 1.
    let rejoin = engine.join_hive(ana, &invite.code, now).unwrap();
    assert!(rejoin.rejoined);
    assert_eq!(
        engine
            .store()
            .invite_by_code(&invite.code)
            .unwrap()
            .unwrap()
            .use_count,
        1
    );

    // A new member consumes the last use; the next one conflicts.
    engine.join_hive(bo, &invite.code, now).unwrap();
    let err = engine.join_hive(carol, &invite.code, now).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Conflict(ConflictError::InviteExhausted)
    ));
}

#[test]
fn test_habit_to_hive_conversion() {
    let engine = engine();
    let owner = register(&engine, "Owner");
    let now = at(2025, 6, 14, 9);

    let habit = engine
        .create_habit(
            owner,
            NewHabit {
                name: "Journal".to_string(),
                emoji: Some("📓".to_string()),
                color_hex: "#2EC4B6".to_string(),
                kind: HabitKind::Checkbox,
                target_per_day: 1,
                schedule_daily: true,
                schedule_weekmask: 127,
            },
            now,
        )
        .unwrap();
    for offset in 0..5i64 {
        engine
            .log_habit(owner, habit.id, 1, Some(date(2025, 6, 14) - Duration::days(offset)), now)
            .unwrap();
    }

    let hive = engine
        .create_hive_from_habit(owner, habit.id, None, 30, now)
        .unwrap();
    assert_eq!(hive.name, "Journal");
    assert_eq!(hive.color_hex, "#2EC4B6");
    assert_eq!(engine.store().member_days(hive.id).unwrap().len(), 5);

    // Backfilled days immediately support an advancement for today.
    let outcome = engine.advance_hive(owner, hive.id, None, now).unwrap();
    assert!(outcome.advanced);
}
