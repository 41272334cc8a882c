//! Domain model shared by the engine, stores, and service facade.
//!
//! Field names serialize in snake_case to match the mobile client's wire
//! format. Dates with no time component are `NaiveDate`; instants are UTC.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Kind of habit: a yes/no checkbox or an accumulating counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitKind {
    Checkbox,
    Counter,
}

/// A personal habit owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub emoji: Option<String>,
    pub color_hex: String,
    pub kind: HabitKind,
    /// Minimum value per day for the day to count as complete.
    pub target_per_day: u32,
    /// When true the habit applies every day regardless of the weekmask.
    pub schedule_daily: bool,
    /// Weekday bitmask, Mon=bit0 .. Sun=bit6.
    pub schedule_weekmask: u8,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    /// Whether the habit is scheduled on the given weekday.
    pub fn is_scheduled_on(&self, weekday: Weekday) -> bool {
        if self.schedule_daily {
            return true;
        }
        let bit = weekday.num_days_from_monday() as u8;
        self.schedule_weekmask & (1 << bit) != 0
    }

    /// Validate target and schedule configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target_per_day == 0 {
            return Err(ValidationError::field(
                "target_per_day",
                "must be positive",
            ));
        }
        if self.schedule_weekmask > 127 {
            return Err(ValidationError::field(
                "schedule_weekmask",
                "must be in 0..=127",
            ));
        }
        Ok(())
    }
}

/// One log entry for one habit on one calendar day.
///
/// At most one exists per (habit_id, log_date); a later log for the same day
/// overwrites the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitLog {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub user_id: Uuid,
    pub log_date: NaiveDate,
    pub value: u32,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Consensus rule for a hive's shared day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiveRule {
    AllMustComplete,
    Threshold,
}

/// A small group sharing one habit definition and one collective streak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hive {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub color_hex: String,
    pub kind: HabitKind,
    pub target_per_day: u32,
    pub rule: HiveRule,
    /// Number of completed members required; set iff rule is `Threshold`.
    pub threshold: Option<u32>,
    pub schedule_daily: bool,
    pub schedule_weekmask: u8,
    /// Upper bound on the active roster, 2..=10.
    pub max_members: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// The most recent day the shared streak advanced for.
    pub last_advanced_on: Option<NaiveDate>,
    /// The currently shareable invite code, if one has been issued.
    pub invite_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Hive {
    /// Validate rule, threshold, and capacity configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target_per_day == 0 {
            return Err(ValidationError::field(
                "target_per_day",
                "must be positive",
            ));
        }
        match self.rule {
            HiveRule::Threshold => match self.threshold {
                None | Some(0) => return Err(ValidationError::MissingThreshold),
                Some(_) => {}
            },
            HiveRule::AllMustComplete => {}
        }
        if !(2..=10).contains(&self.max_members) {
            return Err(ValidationError::field(
                "max_members",
                "must be in 2..=10",
            ));
        }
        if self.schedule_weekmask > 127 {
            return Err(ValidationError::field(
                "schedule_weekmask",
                "must be in 0..=127",
            ));
        }
        Ok(())
    }
}

/// Membership role within a hive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Member,
}

/// A user's membership row in a hive.
///
/// Rows are never physically deleted: leaving sets `is_active` to false and
/// records `left_at`, preserving history for audit and rejoin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveMember {
    pub hive_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// One member's logged value for one hive day.
///
/// `done` records whether anything was logged (value > 0); pass/fail against
/// the hive's target is judged by the consensus engine, not this flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveMemberDay {
    pub hive_id: Uuid,
    pub user_id: Uuid,
    pub day_date: NaiveDate,
    pub value: u32,
    pub done: bool,
}

/// A time- and use-limited join code for a hive.
///
/// Expiry and exhaustion are query-time validity checks; invites are not
/// deleted when they lapse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveInvite {
    pub id: Uuid,
    pub hive_id: Uuid,
    pub code: String,
    pub created_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub max_uses: u32,
    pub use_count: u32,
    pub created_at: DateTime<Utc>,
}

impl HiveInvite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.use_count >= self.max_uses
    }
}

/// Identity-provider payload the core consumes: display info plus the user's
/// local-day preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Offset of the user's local time from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Hour (0-23) at which the user's day rolls over.
    pub day_start_hour: u32,
}

/// Kind of activity feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    HabitCompleted,
    StreakMilestone,
    HiveJoined,
    HiveAdvanced,
    HiveBroken,
}

/// An entry in the shared activity feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub hive_id: Option<Uuid>,
    pub habit_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A dated, valued entry as consumed by the streak and completion engines.
///
/// Both `HabitLog` and `HiveMemberDay` reduce to this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub date: NaiveDate,
    pub value: u32,
}

impl From<&HabitLog> for LogEntry {
    fn from(log: &HabitLog) -> Self {
        LogEntry {
            date: log.log_date,
            value: log.value,
        }
    }
}

impl From<&HiveMemberDay> for LogEntry {
    fn from(day: &HiveMemberDay) -> Self {
        LogEntry {
            date: day.day_date,
            value: day.value,
        }
    }
}

/// Fold duplicate dates, keeping the largest value per day.
///
/// Upstream writes guarantee one entry per day, but the engines do not
/// assume it.
pub(crate) fn max_value_by_day(
    entries: impl IntoIterator<Item = LogEntry>,
) -> std::collections::BTreeMap<NaiveDate, u32> {
    let mut by_day = std::collections::BTreeMap::new();
    for entry in entries {
        by_day
            .entry(entry.date)
            .and_modify(|v: &mut u32| *v = (*v).max(entry.value))
            .or_insert(entry.value);
    }
    by_day
}

/// Weekday helper used when rendering schedules.
pub fn weekday_bit(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}
