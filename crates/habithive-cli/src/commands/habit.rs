use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use uuid::Uuid;

use habithive_core::service::{HabitPatch, NewHabit};
use habithive_core::HabitKind;

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a habit
    Add {
        name: String,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long, default_value = "#FF9F1C")]
        color: String,
        /// "checkbox" or "counter"
        #[arg(long, default_value = "checkbox")]
        kind: String,
        #[arg(long, default_value_t = 1)]
        target: u32,
        /// Weekday bitmask, Mon=bit0 .. Sun=bit6
        #[arg(long, default_value_t = 127)]
        weekmask: u8,
    },
    /// List habits with streaks and completion
    List {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// One habit with recent logs and standing
    Summary {
        habit_id: Uuid,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Log a value for a day (defaults to today)
    Log {
        habit_id: Uuid,
        #[arg(default_value_t = 1)]
        value: u32,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Remove a day's log (defaults to today)
    Unlog {
        habit_id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List logs, optionally bounded by dates
    Logs {
        habit_id: Uuid,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Rename a habit or adjust its target
    Update {
        habit_id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        target: Option<u32>,
    },
    /// Archive (soft-delete) a habit
    Archive { habit_id: Uuid },
}

fn parse_kind(kind: &str) -> HabitKind {
    match kind {
        "counter" => HabitKind::Counter,
        _ => HabitKind::Checkbox,
    }
}

pub fn run(action: HabitAction) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, config) = open_engine()?;
    let user_id = config.user_id;
    let now = Utc::now();

    match action {
        HabitAction::Add {
            name,
            emoji,
            color,
            kind,
            target,
            weekmask,
        } => {
            let habit = engine.create_habit(
                user_id,
                NewHabit {
                    name,
                    emoji,
                    color_hex: color,
                    kind: parse_kind(&kind),
                    target_per_day: target,
                    schedule_daily: weekmask == 127,
                    schedule_weekmask: weekmask,
                },
                now,
            )?;
            print_json(&habit)?;
        }
        HabitAction::List { days } => {
            let summaries = engine.habit_summaries(user_id, days, now)?;
            print_json(&summaries)?;
        }
        HabitAction::Summary { habit_id, days } => {
            let summary = engine.habit_summary(user_id, habit_id, days, now)?;
            print_json(&summary)?;
        }
        HabitAction::Log {
            habit_id,
            value,
            date,
        } => {
            let log = engine.log_habit(user_id, habit_id, value, date, now)?;
            print_json(&log)?;
        }
        HabitAction::Unlog { habit_id, date } => {
            let removed = engine.delete_habit_log(user_id, habit_id, date, now)?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        HabitAction::Logs {
            habit_id,
            start,
            end,
        } => {
            let logs = engine.habit_logs(user_id, habit_id, start, end)?;
            print_json(&logs)?;
        }
        HabitAction::Update {
            habit_id,
            name,
            target,
        } => {
            let habit = engine.update_habit(
                user_id,
                habit_id,
                HabitPatch {
                    name,
                    target_per_day: target,
                    ..Default::default()
                },
                now,
            )?;
            print_json(&habit)?;
        }
        HabitAction::Archive { habit_id } => {
            engine.archive_habit(user_id, habit_id, now)?;
            print_json(&serde_json::json!({ "archived": true }))?;
        }
    }
    Ok(())
}
