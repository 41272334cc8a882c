//! SQLite-backed durable store.
//!
//! Uniqueness invariants live in the schema: habit logs key on
//! (habit_id, log_date), member rows on (hive_id, user_id), member days on
//! (hive_id, user_id, day_date). The two conditional updates are single
//! guarded UPDATE statements, so SQLite serializes them for free.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    ActivityEvent, ActivityKind, Habit, HabitKind, HabitLog, Hive, HiveInvite, HiveMember,
    HiveMemberDay, HiveRule, MemberRole, Profile,
};

use super::{data_dir, Store};

// === Helper Functions ===

fn conversion_err(
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_uuid(text: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(text).map_err(conversion_err)
}

fn parse_opt_uuid(text: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    text.as_deref().map(parse_uuid).transpose()
}

fn parse_datetime(text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_err)
}

fn parse_date(text: &str) -> rusqlite::Result<NaiveDate> {
    text.parse().map_err(conversion_err)
}

/// Parse habit kind from database string
fn parse_kind(text: &str) -> HabitKind {
    match text {
        "counter" => HabitKind::Counter,
        _ => HabitKind::Checkbox,
    }
}

/// Format habit kind for database storage
fn format_kind(kind: HabitKind) -> &'static str {
    match kind {
        HabitKind::Checkbox => "checkbox",
        HabitKind::Counter => "counter",
    }
}

/// Parse hive rule from database string
fn parse_rule(text: &str) -> HiveRule {
    match text {
        "threshold" => HiveRule::Threshold,
        _ => HiveRule::AllMustComplete,
    }
}

/// Format hive rule for database storage
fn format_rule(rule: HiveRule) -> &'static str {
    match rule {
        HiveRule::AllMustComplete => "all_must_complete",
        HiveRule::Threshold => "threshold",
    }
}

/// Parse member role from database string
fn parse_role(text: &str) -> MemberRole {
    match text {
        "owner" => MemberRole::Owner,
        _ => MemberRole::Member,
    }
}

/// Format member role for database storage
fn format_role(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Owner => "owner",
        MemberRole::Member => "member",
    }
}

/// Parse activity kind from database string
fn parse_activity_kind(text: &str) -> ActivityKind {
    match text {
        "streak_milestone" => ActivityKind::StreakMilestone,
        "hive_joined" => ActivityKind::HiveJoined,
        "hive_advanced" => ActivityKind::HiveAdvanced,
        "hive_broken" => ActivityKind::HiveBroken,
        _ => ActivityKind::HabitCompleted,
    }
}

/// Format activity kind for database storage
fn format_activity_kind(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::HabitCompleted => "habit_completed",
        ActivityKind::StreakMilestone => "streak_milestone",
        ActivityKind::HiveJoined => "hive_joined",
        ActivityKind::HiveAdvanced => "hive_advanced",
        ActivityKind::HiveBroken => "hive_broken",
    }
}

fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<Habit> {
    Ok(Habit {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        user_id: parse_uuid(&row.get::<_, String>("user_id")?)?,
        name: row.get("name")?,
        emoji: row.get("emoji")?,
        color_hex: row.get("color_hex")?,
        kind: parse_kind(&row.get::<_, String>("kind")?),
        target_per_day: row.get("target_per_day")?,
        schedule_daily: row.get("schedule_daily")?,
        schedule_weekmask: row.get("schedule_weekmask")?,
        is_active: row.get("is_active")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<HabitLog> {
    Ok(HabitLog {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        habit_id: parse_uuid(&row.get::<_, String>("habit_id")?)?,
        user_id: parse_uuid(&row.get::<_, String>("user_id")?)?,
        log_date: parse_date(&row.get::<_, String>("log_date")?)?,
        value: row.get("value")?,
        source: row.get("source")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?)?,
    })
}

fn hive_from_row(row: &Row<'_>) -> rusqlite::Result<Hive> {
    Ok(Hive {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        owner_id: parse_uuid(&row.get::<_, String>("owner_id")?)?,
        name: row.get("name")?,
        color_hex: row.get("color_hex")?,
        kind: parse_kind(&row.get::<_, String>("kind")?),
        target_per_day: row.get("target_per_day")?,
        rule: parse_rule(&row.get::<_, String>("rule")?),
        threshold: row.get("threshold")?,
        schedule_daily: row.get("schedule_daily")?,
        schedule_weekmask: row.get("schedule_weekmask")?,
        max_members: row.get("max_members")?,
        current_streak: row.get("current_streak")?,
        longest_streak: row.get("longest_streak")?,
        last_advanced_on: row
            .get::<_, Option<String>>("last_advanced_on")?
            .as_deref()
            .map(parse_date)
            .transpose()?,
        invite_code: row.get("invite_code")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<HiveMember> {
    Ok(HiveMember {
        hive_id: parse_uuid(&row.get::<_, String>("hive_id")?)?,
        user_id: parse_uuid(&row.get::<_, String>("user_id")?)?,
        role: parse_role(&row.get::<_, String>("role")?),
        joined_at: parse_datetime(&row.get::<_, String>("joined_at")?)?,
        left_at: row
            .get::<_, Option<String>>("left_at")?
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        is_active: row.get("is_active")?,
    })
}

fn member_day_from_row(row: &Row<'_>) -> rusqlite::Result<HiveMemberDay> {
    Ok(HiveMemberDay {
        hive_id: parse_uuid(&row.get::<_, String>("hive_id")?)?,
        user_id: parse_uuid(&row.get::<_, String>("user_id")?)?,
        day_date: parse_date(&row.get::<_, String>("day_date")?)?,
        value: row.get("value")?,
        done: row.get("done")?,
    })
}

fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<HiveInvite> {
    Ok(HiveInvite {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        hive_id: parse_uuid(&row.get::<_, String>("hive_id")?)?,
        code: row.get("code")?,
        created_by: parse_uuid(&row.get::<_, String>("created_by")?)?,
        expires_at: parse_datetime(&row.get::<_, String>("expires_at")?)?,
        max_uses: row.get("max_uses")?,
        use_count: row.get("use_count")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityEvent> {
    let data: String = row.get("data")?;
    Ok(ActivityEvent {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        actor_id: parse_uuid(&row.get::<_, String>("actor_id")?)?,
        hive_id: parse_opt_uuid(row.get("hive_id")?)?,
        habit_id: parse_opt_uuid(row.get("habit_id")?)?,
        kind: parse_activity_kind(&row.get::<_, String>("kind")?),
        data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?)?,
    })
}

/// Durable SQLite store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database at `~/.config/habithive/habithive.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("habithive.db");
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                id                 TEXT PRIMARY KEY,
                display_name       TEXT NOT NULL,
                avatar_url         TEXT,
                utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
                day_start_hour     INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS habits (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL,
                name              TEXT NOT NULL,
                emoji             TEXT,
                color_hex         TEXT NOT NULL,
                kind              TEXT NOT NULL,
                target_per_day    INTEGER NOT NULL,
                schedule_daily    INTEGER NOT NULL,
                schedule_weekmask INTEGER NOT NULL,
                is_active         INTEGER NOT NULL,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS habit_logs (
                id         TEXT NOT NULL,
                habit_id   TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                log_date   TEXT NOT NULL,
                value      INTEGER NOT NULL,
                source     TEXT NOT NULL DEFAULT 'manual',
                created_at TEXT NOT NULL,
                PRIMARY KEY (habit_id, log_date)
            );

            CREATE TABLE IF NOT EXISTS hives (
                id                TEXT PRIMARY KEY,
                owner_id          TEXT NOT NULL,
                name              TEXT NOT NULL,
                color_hex         TEXT NOT NULL,
                kind              TEXT NOT NULL,
                target_per_day    INTEGER NOT NULL,
                rule              TEXT NOT NULL,
                threshold         INTEGER,
                schedule_daily    INTEGER NOT NULL,
                schedule_weekmask INTEGER NOT NULL,
                max_members       INTEGER NOT NULL,
                current_streak    INTEGER NOT NULL DEFAULT 0,
                longest_streak    INTEGER NOT NULL DEFAULT 0,
                last_advanced_on  TEXT,
                invite_code       TEXT,
                created_at        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS hive_members (
                hive_id   TEXT NOT NULL,
                user_id   TEXT NOT NULL,
                role      TEXT NOT NULL,
                joined_at TEXT NOT NULL,
                left_at   TEXT,
                is_active INTEGER NOT NULL,
                PRIMARY KEY (hive_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS hive_member_days (
                hive_id  TEXT NOT NULL,
                user_id  TEXT NOT NULL,
                day_date TEXT NOT NULL,
                value    INTEGER NOT NULL,
                done     INTEGER NOT NULL,
                PRIMARY KEY (hive_id, user_id, day_date)
            );

            CREATE TABLE IF NOT EXISTS hive_invites (
                code       TEXT PRIMARY KEY,
                id         TEXT NOT NULL,
                hive_id    TEXT NOT NULL,
                created_by TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                max_uses   INTEGER NOT NULL,
                use_count  INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS activity_events (
                id         TEXT PRIMARY KEY,
                actor_id   TEXT NOT NULL,
                hive_id    TEXT,
                habit_id   TEXT,
                kind       TEXT NOT NULL,
                data       TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );

            -- Create indexes for common query patterns
            CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id);
            CREATE INDEX IF NOT EXISTS idx_habit_logs_user ON habit_logs(user_id);
            CREATE INDEX IF NOT EXISTS idx_member_days_day ON hive_member_days(hive_id, day_date);
            CREATE INDEX IF NOT EXISTS idx_invites_hive ON hive_invites(hive_id);
            CREATE INDEX IF NOT EXISTS idx_activity_hive ON activity_events(hive_id, created_at);",
        )?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO profiles
             (id, display_name, avatar_url, utc_offset_minutes, day_start_hour)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id.to_string(),
                profile.display_name,
                profile.avatar_url,
                profile.utc_offset_minutes,
                profile.day_start_hour,
            ],
        )?;
        Ok(())
    }

    fn profile(&self, id: Uuid) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, display_name, avatar_url, utc_offset_minutes, day_start_hour
                 FROM profiles WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(Profile {
                        id: parse_uuid(&row.get::<_, String>("id")?)?,
                        display_name: row.get("display_name")?,
                        avatar_url: row.get("avatar_url")?,
                        utc_offset_minutes: row.get("utc_offset_minutes")?,
                        day_start_hour: row.get("day_start_hour")?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    fn put_habit(&self, habit: &Habit) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO habits
             (id, user_id, name, emoji, color_hex, kind, target_per_day,
              schedule_daily, schedule_weekmask, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                habit.id.to_string(),
                habit.user_id.to_string(),
                habit.name,
                habit.emoji,
                habit.color_hex,
                format_kind(habit.kind),
                habit.target_per_day,
                habit.schedule_daily,
                habit.schedule_weekmask,
                habit.is_active,
                habit.created_at.to_rfc3339(),
                habit.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn habit(&self, id: Uuid) -> Result<Option<Habit>> {
        let habit = self
            .conn
            .query_row(
                "SELECT * FROM habits WHERE id = ?1",
                params![id.to_string()],
                habit_from_row,
            )
            .optional()?;
        Ok(habit)
    }

    fn habits_by_owner(&self, user_id: Uuid) -> Result<Vec<Habit>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM habits WHERE user_id = ?1 ORDER BY created_at DESC")?;
        let habits = stmt
            .query_map(params![user_id.to_string()], habit_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(habits)
    }

    fn upsert_habit_log(&self, log: &HabitLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO habit_logs (id, habit_id, user_id, log_date, value, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (habit_id, log_date)
             DO UPDATE SET value = excluded.value, source = excluded.source,
                           created_at = excluded.created_at",
            params![
                log.id.to_string(),
                log.habit_id.to_string(),
                log.user_id.to_string(),
                log.log_date.to_string(),
                log.value,
                log.source,
                log.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_habit_log(&self, habit_id: Uuid, day: NaiveDate) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM habit_logs WHERE habit_id = ?1 AND log_date = ?2",
            params![habit_id.to_string(), day.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn habit_logs(&self, habit_id: Uuid) -> Result<Vec<HabitLog>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM habit_logs WHERE habit_id = ?1 ORDER BY log_date DESC")?;
        let logs = stmt
            .query_map(params![habit_id.to_string()], log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn logs_by_user(&self, user_id: Uuid) -> Result<Vec<HabitLog>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM habit_logs WHERE user_id = ?1")?;
        let logs = stmt
            .query_map(params![user_id.to_string()], log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn put_hive(&self, hive: &Hive) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO hives
             (id, owner_id, name, color_hex, kind, target_per_day, rule, threshold,
              schedule_daily, schedule_weekmask, max_members, current_streak,
              longest_streak, last_advanced_on, invite_code, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                hive.id.to_string(),
                hive.owner_id.to_string(),
                hive.name,
                hive.color_hex,
                format_kind(hive.kind),
                hive.target_per_day,
                format_rule(hive.rule),
                hive.threshold,
                hive.schedule_daily,
                hive.schedule_weekmask,
                hive.max_members,
                hive.current_streak,
                hive.longest_streak,
                hive.last_advanced_on.map(|d| d.to_string()),
                hive.invite_code,
                hive.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn hive(&self, id: Uuid) -> Result<Option<Hive>> {
        let hive = self
            .conn
            .query_row(
                "SELECT * FROM hives WHERE id = ?1",
                params![id.to_string()],
                hive_from_row,
            )
            .optional()?;
        Ok(hive)
    }

    fn delete_hive(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        self.conn
            .execute("DELETE FROM hives WHERE id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM hive_members WHERE hive_id = ?1", params![id])?;
        self.conn.execute(
            "DELETE FROM hive_member_days WHERE hive_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM hive_invites WHERE hive_id = ?1", params![id])?;
        Ok(())
    }

    fn put_member(&self, member: &HiveMember) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO hive_members
             (hive_id, user_id, role, joined_at, left_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                member.hive_id.to_string(),
                member.user_id.to_string(),
                format_role(member.role),
                member.joined_at.to_rfc3339(),
                member.left_at.map(|t| t.to_rfc3339()),
                member.is_active,
            ],
        )?;
        Ok(())
    }

    fn member(&self, hive_id: Uuid, user_id: Uuid) -> Result<Option<HiveMember>> {
        let member = self
            .conn
            .query_row(
                "SELECT * FROM hive_members WHERE hive_id = ?1 AND user_id = ?2",
                params![hive_id.to_string(), user_id.to_string()],
                member_from_row,
            )
            .optional()?;
        Ok(member)
    }

    fn members(&self, hive_id: Uuid) -> Result<Vec<HiveMember>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM hive_members WHERE hive_id = ?1 ORDER BY joined_at")?;
        let members = stmt
            .query_map(params![hive_id.to_string()], member_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    fn memberships_by_user(&self, user_id: Uuid) -> Result<Vec<HiveMember>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM hive_members WHERE user_id = ?1")?;
        let members = stmt
            .query_map(params![user_id.to_string()], member_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    fn upsert_member_day(&self, day: &HiveMemberDay) -> Result<()> {
        self.conn.execute(
            "INSERT INTO hive_member_days (hive_id, user_id, day_date, value, done)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (hive_id, user_id, day_date)
             DO UPDATE SET value = excluded.value, done = excluded.done",
            params![
                day.hive_id.to_string(),
                day.user_id.to_string(),
                day.day_date.to_string(),
                day.value,
                day.done,
            ],
        )?;
        Ok(())
    }

    fn member_days(&self, hive_id: Uuid) -> Result<Vec<HiveMemberDay>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM hive_member_days WHERE hive_id = ?1")?;
        let days = stmt
            .query_map(params![hive_id.to_string()], member_day_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(days)
    }

    fn member_days_on(&self, hive_id: Uuid, day: NaiveDate) -> Result<Vec<HiveMemberDay>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM hive_member_days WHERE hive_id = ?1 AND day_date = ?2")?;
        let days = stmt
            .query_map(
                params![hive_id.to_string(), day.to_string()],
                member_day_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(days)
    }

    fn put_invite(&self, invite: &HiveInvite) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO hive_invites
             (code, id, hive_id, created_by, expires_at, max_uses, use_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                invite.code,
                invite.id.to_string(),
                invite.hive_id.to_string(),
                invite.created_by.to_string(),
                invite.expires_at.to_rfc3339(),
                invite.max_uses,
                invite.use_count,
                invite.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn invite_by_code(&self, code: &str) -> Result<Option<HiveInvite>> {
        let invite = self
            .conn
            .query_row(
                "SELECT * FROM hive_invites WHERE code = ?1",
                params![code],
                invite_from_row,
            )
            .optional()?;
        Ok(invite)
    }

    fn invites_by_hive(&self, hive_id: Uuid) -> Result<Vec<HiveInvite>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM hive_invites WHERE hive_id = ?1")?;
        let invites = stmt
            .query_map(params![hive_id.to_string()], invite_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(invites)
    }

    fn increment_invite_use(&self, code: &str) -> Result<bool> {
        // Single guarded UPDATE: the increment and the limit check are one
        // statement, so concurrent redemptions serialize on the row.
        let changed = self.conn.execute(
            "UPDATE hive_invites SET use_count = use_count + 1
             WHERE code = ?1 AND use_count < max_uses",
            params![code],
        )?;
        Ok(changed > 0)
    }

    fn advance_streak_if_unadvanced(&self, hive_id: Uuid, day: NaiveDate) -> Result<Option<Hive>> {
        // ISO dates compare lexicographically, so the guard works on TEXT.
        let changed = self.conn.execute(
            "UPDATE hives SET
                 current_streak = current_streak + 1,
                 longest_streak = MAX(longest_streak, current_streak + 1),
                 last_advanced_on = ?2
             WHERE id = ?1
               AND (last_advanced_on IS NULL OR last_advanced_on < ?2)",
            params![hive_id.to_string(), day.to_string()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.hive(hive_id)
    }

    fn record_activity(&self, event: &ActivityEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO activity_events (id, actor_id, hive_id, habit_id, kind, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.to_string(),
                event.actor_id.to_string(),
                event.hive_id.map(|id| id.to_string()),
                event.habit_id.map(|id| id.to_string()),
                format_activity_kind(event.kind),
                event.data.to_string(),
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn activity_feed(&self, hive_ids: &[Uuid], limit: usize) -> Result<Vec<ActivityEvent>> {
        let mut events = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT * FROM activity_events WHERE hive_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        for hive_id in hive_ids {
            let batch = stmt
                .query_map(params![hive_id.to_string(), limit as i64], activity_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            events.extend(batch);
        }
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }
}
