use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use uuid::Uuid;

use habithive_core::service::NewHive;
use habithive_core::{HabitKind, HiveRule};

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum HiveAction {
    /// Create a hive
    Create {
        name: String,
        /// "all_must_complete" or "threshold"
        #[arg(long, default_value = "all_must_complete")]
        rule: String,
        /// Completed members required (threshold rule only)
        #[arg(long)]
        threshold: Option<u32>,
        #[arg(long, default_value_t = 1)]
        target: u32,
        #[arg(long, default_value_t = 10)]
        max_members: u32,
        #[arg(long, default_value = "#FF9F1C")]
        color: String,
    },
    /// Convert a habit into a hive
    FromHabit {
        habit_id: Uuid,
        #[arg(long)]
        name: Option<String>,
        /// Days of existing logs to copy in as member days
        #[arg(long, default_value_t = 30)]
        backfill_days: u32,
    },
    /// Hives you are an active member of
    List,
    /// Roster, today's status, and recent activity
    Detail { hive_id: Uuid },
    /// Issue an invite code (owner only)
    Invite {
        hive_id: Uuid,
        /// Minutes until the code expires (default 7 days)
        #[arg(long, default_value_t = 10080)]
        ttl_minutes: i64,
        #[arg(long, default_value_t = 20)]
        max_uses: u32,
    },
    /// Redeem an invite code
    Join { code: String },
    /// Log your value for a day (defaults to today)
    Log {
        hive_id: Uuid,
        #[arg(default_value_t = 1)]
        value: u32,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Evaluate and advance the shared streak for a day
    Advance {
        hive_id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Leave a hive (owners must transfer first)
    Leave { hive_id: Uuid },
    /// Hand ownership to another active member
    Transfer { hive_id: Uuid, new_owner: Uuid },
    /// Delete a hive (owner only)
    Delete { hive_id: Uuid },
}

fn parse_rule(rule: &str) -> HiveRule {
    match rule {
        "threshold" => HiveRule::Threshold,
        _ => HiveRule::AllMustComplete,
    }
}

pub fn run(action: HiveAction) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, config) = open_engine()?;
    let user_id = config.user_id;
    let now = Utc::now();

    match action {
        HiveAction::Create {
            name,
            rule,
            threshold,
            target,
            max_members,
            color,
        } => {
            let hive = engine.create_hive(
                user_id,
                NewHive {
                    name,
                    color_hex: color,
                    kind: HabitKind::Checkbox,
                    target_per_day: target,
                    rule: parse_rule(&rule),
                    threshold,
                    schedule_daily: true,
                    schedule_weekmask: 127,
                    max_members,
                },
                now,
            )?;
            print_json(&hive)?;
        }
        HiveAction::FromHabit {
            habit_id,
            name,
            backfill_days,
        } => {
            let hive =
                engine.create_hive_from_habit(user_id, habit_id, name, backfill_days, now)?;
            print_json(&hive)?;
        }
        HiveAction::List => {
            let hives = engine.hives_for_user(user_id)?;
            print_json(&hives)?;
        }
        HiveAction::Detail { hive_id } => {
            let detail = engine.hive_detail(user_id, hive_id, now)?;
            print_json(&detail)?;
        }
        HiveAction::Invite {
            hive_id,
            ttl_minutes,
            max_uses,
        } => {
            let invite = engine.create_invite(user_id, hive_id, ttl_minutes, max_uses, now)?;
            print_json(&invite)?;
        }
        HiveAction::Join { code } => {
            let outcome = engine.join_hive(user_id, &code, now)?;
            print_json(&outcome)?;
        }
        HiveAction::Log {
            hive_id,
            value,
            date,
        } => {
            let record = engine.log_hive_day(user_id, hive_id, value, date, now)?;
            print_json(&record)?;
        }
        HiveAction::Advance { hive_id, date } => {
            let outcome = engine.advance_hive(user_id, hive_id, date, now)?;
            print_json(&outcome)?;
        }
        HiveAction::Leave { hive_id } => {
            engine.leave_hive(user_id, hive_id, now)?;
            print_json(&serde_json::json!({ "left": true }))?;
        }
        HiveAction::Transfer { hive_id, new_owner } => {
            engine.transfer_ownership(user_id, hive_id, new_owner)?;
            print_json(&serde_json::json!({ "transferred": true }))?;
        }
        HiveAction::Delete { hive_id } => {
            engine.delete_hive(user_id, hive_id)?;
            print_json(&serde_json::json!({ "deleted": true }))?;
        }
    }
    Ok(())
}
