//! Storage abstraction for the engine.
//!
//! The engine never touches global state: every operation reads snapshots
//! through the [`Store`] trait and proposes single-step conditional updates
//! that the backing implementation applies atomically. Two interchangeable
//! backends are provided:
//!
//! - [`MemoryStore`]: mutex-guarded maps, for tests and ephemeral use
//! - [`SqliteStore`]: durable storage at `~/.config/habithive/habithive.db`

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    ActivityEvent, Habit, HabitLog, Hive, HiveInvite, HiveMember, HiveMemberDay, Profile,
};

use std::path::PathBuf;

/// Returns `~/.config/habithive[-dev]/` based on HABITHIVE_ENV.
///
/// Set HABITHIVE_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HABITHIVE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("habithive-dev")
    } else {
        base_dir.join("habithive")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Snapshot reads and atomic writes the engine depends on.
///
/// Upserts are keyed by day: writing a log or member-day for an existing
/// (id, date) key overwrites, never duplicates. The two `*_if_*` methods
/// are the serializing boundary from the concurrency model: each must be a
/// single check-and-update the backend applies as one step.
pub trait Store {
    // --- profiles ---

    fn put_profile(&self, profile: &Profile) -> Result<()>;
    fn profile(&self, id: Uuid) -> Result<Option<Profile>>;

    // --- habits ---

    fn put_habit(&self, habit: &Habit) -> Result<()>;
    fn habit(&self, id: Uuid) -> Result<Option<Habit>>;
    /// All habits owned by the user, active and archived alike.
    fn habits_by_owner(&self, user_id: Uuid) -> Result<Vec<Habit>>;

    /// Insert or overwrite the log for (habit_id, log_date).
    fn upsert_habit_log(&self, log: &HabitLog) -> Result<()>;
    /// Remove the log for a day; returns whether one existed.
    fn delete_habit_log(&self, habit_id: Uuid, day: NaiveDate) -> Result<bool>;
    fn habit_logs(&self, habit_id: Uuid) -> Result<Vec<HabitLog>>;
    /// Every log belonging to the user, across habits.
    fn logs_by_user(&self, user_id: Uuid) -> Result<Vec<HabitLog>>;

    // --- hives ---

    fn put_hive(&self, hive: &Hive) -> Result<()>;
    fn hive(&self, id: Uuid) -> Result<Option<Hive>>;
    /// Remove a hive and its members, member-days, and invites.
    fn delete_hive(&self, id: Uuid) -> Result<()>;

    /// Insert or overwrite the membership row for (hive_id, user_id).
    fn put_member(&self, member: &HiveMember) -> Result<()>;
    fn member(&self, hive_id: Uuid, user_id: Uuid) -> Result<Option<HiveMember>>;
    /// All membership rows for a hive, including departed members.
    fn members(&self, hive_id: Uuid) -> Result<Vec<HiveMember>>;
    /// All membership rows held by a user across hives.
    fn memberships_by_user(&self, user_id: Uuid) -> Result<Vec<HiveMember>>;

    /// Insert or overwrite the record for (hive_id, user_id, day_date).
    fn upsert_member_day(&self, day: &HiveMemberDay) -> Result<()>;
    fn member_days(&self, hive_id: Uuid) -> Result<Vec<HiveMemberDay>>;
    fn member_days_on(&self, hive_id: Uuid, day: NaiveDate) -> Result<Vec<HiveMemberDay>>;

    // --- invites ---

    fn put_invite(&self, invite: &HiveInvite) -> Result<()>;
    fn invite_by_code(&self, code: &str) -> Result<Option<HiveInvite>>;
    fn invites_by_hive(&self, hive_id: Uuid) -> Result<Vec<HiveInvite>>;

    /// Atomically increment the invite's use count iff it is still below
    /// `max_uses`. Returns whether the increment happened. Two concurrent
    /// callers can never both succeed past the boundary.
    fn increment_invite_use(&self, code: &str) -> Result<bool>;

    // --- streaks ---

    /// Atomically advance the hive streak iff `last_advanced_on` is unset
    /// or strictly before `day`: increments `current_streak`, raises
    /// `longest_streak`, stamps `last_advanced_on`. Returns the updated
    /// hive when the advance applied, `None` when it was a no-op.
    fn advance_streak_if_unadvanced(&self, hive_id: Uuid, day: NaiveDate) -> Result<Option<Hive>>;

    // --- activity ---

    fn record_activity(&self, event: &ActivityEvent) -> Result<()>;
    /// Newest-first events for the given hives, truncated to `limit`.
    fn activity_feed(&self, hive_ids: &[Uuid], limit: usize) -> Result<Vec<ActivityEvent>>;
}
