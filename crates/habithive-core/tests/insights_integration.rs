//! Integration tests for habit insights and dashboards.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use habithive_core::service::NewHabit;
use habithive_core::{Engine, HabitKind, Profile, SqliteStore};

fn engine() -> Engine<SqliteStore> {
    Engine::new(SqliteStore::open_memory().unwrap())
}

fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn register(engine: &Engine<SqliteStore>, day_start_hour: u32) -> Uuid {
    let id = Uuid::new_v4();
    engine
        .upsert_profile(&Profile {
            id,
            display_name: "Ana".to_string(),
            avatar_url: None,
            utc_offset_minutes: 0,
            day_start_hour,
        })
        .unwrap();
    id
}

fn counter(name: &str, target: u32) -> NewHabit {
    NewHabit {
        name: name.to_string(),
        emoji: None,
        color_hex: "#FF9F1C".to_string(),
        kind: HabitKind::Counter,
        target_per_day: target,
        schedule_daily: true,
        schedule_weekmask: 127,
    }
}

#[test]
fn test_summary_streak_respects_gaps() {
    let engine = engine();
    let user = register(&engine, 0);
    let now = at(2025, 6, 14, 12);
    let today = date(2025, 6, 14);

    let habit = engine.create_habit(user, counter("Read", 1), now).unwrap();
    // Logs for today, yesterday, and three days ago: the gap caps the
    // streak at two.
    for offset in [0i64, 1, 3] {
        engine
            .log_habit(user, habit.id, 1, Some(today - Duration::days(offset)), now)
            .unwrap();
    }

    let summary = engine.habit_summary(user, habit.id, 30, now).unwrap();
    assert_eq!(summary.current_streak, 2);
    assert_eq!(summary.recent_logs.len(), 3);
}

#[test]
fn test_day_start_hour_shifts_reference_day() {
    let engine = engine();
    let user = register(&engine, 4);
    let habit = engine
        .create_habit(user, counter("Meditate", 1), at(2025, 6, 13, 12))
        .unwrap();

    // Logged "yesterday" at 2am; with a 4am cutoff the entry lands on
    // June 13 and still counts for the streak evaluated at 2am next day.
    engine
        .log_habit(user, habit.id, 1, None, at(2025, 6, 14, 2))
        .unwrap();
    let summary = engine
        .habit_summary(user, habit.id, 30, at(2025, 6, 14, 2))
        .unwrap();
    assert_eq!(summary.current_streak, 1);

    // After the cutoff a new day has started and the streak is broken.
    let after_cutoff = engine
        .habit_summary(user, habit.id, 30, at(2025, 6, 14, 5))
        .unwrap();
    assert_eq!(after_cutoff.current_streak, 0);
}

#[test]
fn test_range_stats_windows_and_ordering() {
    let engine = engine();
    let user = register(&engine, 0);
    let now = at(2025, 6, 14, 12);
    let today = date(2025, 6, 14);

    let daily = engine.create_habit(user, counter("Daily", 1), now).unwrap();
    let sparse = engine.create_habit(user, counter("Sparse", 1), now).unwrap();

    for offset in 0..7i64 {
        engine
            .log_habit(user, daily.id, 1, Some(today - Duration::days(offset)), now)
            .unwrap();
    }
    engine
        .log_habit(user, sparse.id, 1, Some(today - Duration::days(20)), now)
        .unwrap();

    let stats = engine.range_stats(user, now).unwrap();
    assert_eq!(stats.week.habits[0].name, "Daily");
    assert!((stats.week.habits[0].completion - 100.0).abs() < 1e-9);
    assert_eq!(stats.week.habits[1].name, "Sparse");
    assert_eq!(stats.week.habits[1].completion, 0.0);
    // The sparse log shows up only in the month/year windows.
    assert!(stats.month.habits.iter().any(|h| h.name == "Sparse" && h.completion > 0.0));
    assert_eq!(stats.week.best_streak, 7);
}

#[test]
fn test_year_heatmap_is_sparse() {
    let engine = engine();
    let user = register(&engine, 0);
    let now = at(2025, 6, 14, 12);

    let habit = engine.create_habit(user, counter("Swim", 2), now).unwrap();
    engine
        .log_habit(user, habit.id, 9, Some(date(2025, 3, 1)), now)
        .unwrap();

    let heatmap = engine.year_heatmap(user, 2025).unwrap();
    assert_eq!(heatmap.day_totals.len(), 1);
    // Contribution is capped at the target.
    assert_eq!(heatmap.day_totals.get(&date(2025, 3, 1)), Some(&2));
    assert_eq!(heatmap.max_day_total, 2);

    // A year with no logs yields empty maps, not zero-filled ones.
    let empty = engine.year_heatmap(user, 2024).unwrap();
    assert!(empty.day_totals.is_empty());
    assert!(empty.per_habit.is_empty());
}

#[test]
fn test_insights_best_performer() {
    let engine = engine();
    let user = register(&engine, 0);
    let now = at(2025, 6, 14, 12);
    let today = date(2025, 6, 14);

    let strong = engine.create_habit(user, counter("Strong", 1), now).unwrap();
    let weak = engine.create_habit(user, counter("Weak", 1), now).unwrap();
    for offset in 0..10i64 {
        engine
            .log_habit(user, strong.id, 1, Some(today - Duration::days(offset)), now)
            .unwrap();
    }
    engine.log_habit(user, weak.id, 1, None, now).unwrap();

    let insights = engine.insights_summary(user, 30, now).unwrap();
    let best = insights.best_performing.unwrap();
    assert_eq!(best.name, "Strong");
    assert!(best.completion_rate > 30.0);
    assert_eq!(insights.current_streaks[0].name, "Strong");
    assert_eq!(insights.current_streaks[0].streak, 10);
}

#[test]
fn test_archived_habits_leave_insights() {
    let engine = engine();
    let user = register(&engine, 0);
    let now = at(2025, 6, 14, 12);

    let habit = engine.create_habit(user, counter("Old", 1), now).unwrap();
    engine.log_habit(user, habit.id, 1, None, now).unwrap();
    engine.archive_habit(user, habit.id, now).unwrap();

    let insights = engine.insights_summary(user, 30, now).unwrap();
    assert_eq!(insights.active_habits, 0);
    assert!(insights.current_streaks.is_empty());
    assert!(insights.year_comb.is_empty());
}
