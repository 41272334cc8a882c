//! Service facade over the engine and a [`Store`] backend.
//!
//! Every operation is a deterministic function of the store snapshot, the
//! supplied `now`, and its arguments. Visibility and role checks happen
//! here; the pure engines in [`streak`](crate::streak),
//! [`completion`](crate::completion), [`consensus`](crate::consensus),
//! [`invite`](crate::invite), and [`leaderboard`](crate::leaderboard) never
//! see a store.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::completion::{self, RangeStats, YearHeatmap, WEEK_DAYS, YEAR_DAYS};
use crate::consensus::{self, AdvanceOutcome, DayEvaluation};
use crate::day::{day_range, window_start, LocalDayClock};
use crate::error::{ConflictError, CoreError, Result, ValidationError};
use crate::invite::{check_valid, expiry_for_ttl, generate_unique_code};
use crate::leaderboard::{self, LeaderboardEntry};
use crate::model::{
    ActivityEvent, ActivityKind, Habit, HabitKind, HabitLog, Hive, HiveInvite, HiveMember,
    HiveMemberDay, HiveRule, LogEntry, MemberRole, Profile,
};
use crate::store::Store;
use crate::streak::current_streak;

/// Streak lengths that produce a milestone activity event.
const MILESTONE_STREAKS: [u32; 2] = [7, 30];

/// Fields for a new habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHabit {
    pub name: String,
    pub emoji: Option<String>,
    pub color_hex: String,
    pub kind: HabitKind,
    pub target_per_day: u32,
    pub schedule_daily: bool,
    pub schedule_weekmask: u8,
}

/// Partial update for a habit; unset fields are left as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub emoji: Option<String>,
    pub color_hex: Option<String>,
    pub target_per_day: Option<u32>,
    pub schedule_daily: Option<bool>,
    pub schedule_weekmask: Option<u8>,
}

/// Fields for a new hive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHive {
    pub name: String,
    pub color_hex: String,
    pub kind: HabitKind,
    pub target_per_day: u32,
    pub rule: HiveRule,
    pub threshold: Option<u32>,
    pub schedule_daily: bool,
    pub schedule_weekmask: u8,
    pub max_members: u32,
}

/// A habit with its recent logs and computed standing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitSummary {
    #[serde(flatten)]
    pub habit: Habit,
    pub recent_logs: Vec<HabitLog>,
    pub current_streak: u32,
    pub completion_rate: f64,
}

/// One roster entry with display info attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInfo {
    #[serde(flatten)]
    pub member: HiveMember,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Full hive view: definition, roster, today's evaluation, recent activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveDetail {
    #[serde(flatten)]
    pub hive: Hive,
    pub members: Vec<MemberInfo>,
    pub today_status: DayEvaluation,
    pub recent_activity: Vec<ActivityEvent>,
}

/// Per-habit streak line for the insights screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitStreakSummary {
    pub habit_id: Uuid,
    pub name: String,
    pub emoji: Option<String>,
    pub streak: u32,
}

/// The best-performing habit in the analyzed window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitPerformance {
    pub habit_id: Uuid,
    pub name: String,
    pub emoji: Option<String>,
    pub completion_rate: f64,
}

/// Insights dashboard payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsSummary {
    pub overall_completion: f64,
    pub active_habits: u32,
    pub completed_today: u32,
    /// Log counts for the last 7 days, oldest first.
    pub weekly_progress: Vec<u32>,
    /// Per-habit current streaks, longest first.
    pub current_streaks: Vec<HabitStreakSummary>,
    /// Sparse day -> log count map over the trailing 365 days.
    pub year_comb: BTreeMap<NaiveDate, u32>,
    pub best_performing: Option<HabitPerformance>,
}

/// Result of redeeming an invite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub hive_id: Uuid,
    /// True when an inactive membership was reactivated.
    pub rejoined: bool,
    /// True when the caller was already an active member (no-op).
    pub already_member: bool,
}

/// Service facade binding the pure engines to a store.
pub struct Engine<S: Store> {
    store: S,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The acting user's local-day clock, defaulting to UTC/midnight when
    /// no profile is registered.
    fn clock_for(&self, user_id: Uuid) -> Result<LocalDayClock> {
        Ok(self
            .store
            .profile(user_id)?
            .map(|p| LocalDayClock::for_profile(&p))
            .unwrap_or_default())
    }

    fn record(&self, event: ActivityEvent) -> Result<()> {
        self.store.record_activity(&event)
    }

    // === profiles ===

    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        if profile.day_start_hour > 23 {
            return Err(ValidationError::field("day_start_hour", "must be in 0..=23").into());
        }
        self.store.put_profile(profile)
    }

    // === habits ===

    pub fn create_habit(&self, user_id: Uuid, new: NewHabit, now: DateTime<Utc>) -> Result<Habit> {
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id,
            name: new.name,
            emoji: new.emoji,
            color_hex: new.color_hex,
            kind: new.kind,
            target_per_day: new.target_per_day,
            schedule_daily: new.schedule_daily,
            schedule_weekmask: new.schedule_weekmask,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        habit.validate()?;
        self.store.put_habit(&habit)?;
        debug!(habit_id = %habit.id, "habit created");
        Ok(habit)
    }

    /// Fetch a habit, enforcing ownership.
    fn owned_habit(&self, user_id: Uuid, habit_id: Uuid) -> Result<Habit> {
        let habit = self.store.habit(habit_id)?.ok_or(CoreError::NotFound {
            entity: "habit",
            id: habit_id.to_string(),
        })?;
        if habit.user_id != user_id {
            return Err(CoreError::Forbidden("habit belongs to another user".into()));
        }
        Ok(habit)
    }

    pub fn update_habit(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        patch: HabitPatch,
        now: DateTime<Utc>,
    ) -> Result<Habit> {
        let mut habit = self.owned_habit(user_id, habit_id)?;
        if let Some(name) = patch.name {
            habit.name = name;
        }
        if let Some(emoji) = patch.emoji {
            habit.emoji = Some(emoji);
        }
        if let Some(color_hex) = patch.color_hex {
            habit.color_hex = color_hex;
        }
        if let Some(target) = patch.target_per_day {
            habit.target_per_day = target;
        }
        if let Some(daily) = patch.schedule_daily {
            habit.schedule_daily = daily;
        }
        if let Some(mask) = patch.schedule_weekmask {
            habit.schedule_weekmask = mask;
        }
        habit.updated_at = now;
        habit.validate()?;
        self.store.put_habit(&habit)?;
        Ok(habit)
    }

    /// Soft-delete a habit.
    pub fn archive_habit(&self, user_id: Uuid, habit_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut habit = self.owned_habit(user_id, habit_id)?;
        if !habit.is_active {
            return Err(ConflictError::Duplicate("habit is already archived".into()).into());
        }
        habit.is_active = false;
        habit.updated_at = now;
        self.store.put_habit(&habit)?;
        Ok(())
    }

    /// Log a habit for a day (defaults to the user's local today).
    ///
    /// A second log for the same day overwrites the first.
    pub fn log_habit(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        value: u32,
        day: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<HabitLog> {
        if value == 0 {
            return Err(ValidationError::field("value", "must be positive").into());
        }
        let habit = self.owned_habit(user_id, habit_id)?;
        let log_date = match day {
            Some(d) => d,
            None => self.clock_for(user_id)?.local_day(now),
        };
        let log = HabitLog {
            id: Uuid::new_v4(),
            habit_id: habit.id,
            user_id,
            log_date,
            value,
            source: "manual".to_string(),
            created_at: now,
        };
        self.store.upsert_habit_log(&log)?;
        debug!(habit_id = %habit.id, %log_date, value, "habit logged");
        Ok(log)
    }

    /// Remove the log for a day (defaults to the user's local today).
    /// Returns whether a log existed.
    pub fn delete_habit_log(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        day: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.owned_habit(user_id, habit_id)?;
        let log_date = match day {
            Some(d) => d,
            None => self.clock_for(user_id)?.local_day(now),
        };
        self.store.delete_habit_log(habit_id, log_date)
    }

    /// Logs for a habit, optionally bounded by inclusive start/end dates.
    pub fn habit_logs(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HabitLog>> {
        self.owned_habit(user_id, habit_id)?;
        let logs = self
            .store
            .habit_logs(habit_id)?
            .into_iter()
            .filter(|l| start.map(|s| l.log_date >= s).unwrap_or(true))
            .filter(|l| end.map(|e| l.log_date <= e).unwrap_or(true))
            .collect();
        Ok(logs)
    }

    /// A habit with its recent logs, current streak, and window completion.
    pub fn habit_summary(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<HabitSummary> {
        let habit = self.owned_habit(user_id, habit_id)?;
        let today = self.clock_for(user_id)?.local_day(now);
        let logs = self.store.habit_logs(habit_id)?;
        let entries: Vec<LogEntry> = logs.iter().map(LogEntry::from).collect();

        let streak = current_streak(entries.iter().copied(), today, habit.target_per_day);
        let completion_rate = completion::window_completion(
            entries,
            habit.target_per_day,
            window_days,
            today,
        )?;
        let cutoff = window_start(today, window_days);
        let recent_logs = logs
            .into_iter()
            .filter(|l| l.log_date >= cutoff)
            .collect();

        Ok(HabitSummary {
            habit,
            recent_logs,
            current_streak: streak,
            completion_rate,
        })
    }

    /// All of the user's habits, each with its standing.
    pub fn habit_summaries(
        &self,
        user_id: Uuid,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<HabitSummary>> {
        let habits = self.store.habits_by_owner(user_id)?;
        let mut summaries = Vec::with_capacity(habits.len());
        for habit in habits.into_iter().filter(|h| h.is_active) {
            summaries.push(self.habit_summary(user_id, habit.id, window_days, now)?);
        }
        Ok(summaries)
    }

    /// The insights dashboard over the given analysis window.
    pub fn insights_summary(
        &self,
        user_id: Uuid,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<InsightsSummary> {
        if window_days <= 0 {
            return Err(ValidationError::NonPositiveWindow(window_days).into());
        }
        let today = self.clock_for(user_id)?.local_day(now);
        let habits: Vec<Habit> = self
            .store
            .habits_by_owner(user_id)?
            .into_iter()
            .filter(|h| h.is_active)
            .collect();
        let logs = self.store.logs_by_user(user_id)?;
        let habit_ids: std::collections::HashSet<Uuid> = habits.iter().map(|h| h.id).collect();

        let mut completed_today = 0u32;
        let mut year_comb: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        let year_cutoff = today - Duration::days(YEAR_DAYS - 1);
        let mut by_habit: std::collections::HashMap<Uuid, Vec<LogEntry>> =
            std::collections::HashMap::new();

        for log in logs.iter().filter(|l| habit_ids.contains(&l.habit_id)) {
            if log.log_date == today {
                completed_today += 1;
            }
            if log.log_date >= year_cutoff && log.log_date <= today {
                *year_comb.entry(log.log_date).or_insert(0) += 1;
            }
            by_habit.entry(log.habit_id).or_default().push(log.into());
        }

        let weekly_progress: Vec<u32> = day_range(window_start(today, WEEK_DAYS), today)
            .map(|day| year_comb.get(&day).copied().unwrap_or(0))
            .collect();

        let mut current_streaks = Vec::new();
        let mut best_performing: Option<HabitPerformance> = None;
        let mut completion_sum = 0.0;
        for habit in &habits {
            let entries = by_habit.get(&habit.id).cloned().unwrap_or_default();
            let streak =
                current_streak(entries.iter().copied(), today, habit.target_per_day);
            current_streaks.push(HabitStreakSummary {
                habit_id: habit.id,
                name: habit.name.clone(),
                emoji: habit.emoji.clone(),
                streak,
            });
            let rate = completion::window_completion(
                entries,
                habit.target_per_day,
                window_days,
                today,
            )?;
            completion_sum += rate;
            let better = best_performing
                .as_ref()
                .map(|b| rate > b.completion_rate)
                .unwrap_or(true);
            if better {
                best_performing = Some(HabitPerformance {
                    habit_id: habit.id,
                    name: habit.name.clone(),
                    emoji: habit.emoji.clone(),
                    completion_rate: rate,
                });
            }
        }
        current_streaks.sort_by(|a, b| b.streak.cmp(&a.streak));

        let overall_completion = if habits.is_empty() {
            0.0
        } else {
            completion_sum / habits.len() as f64
        };

        Ok(InsightsSummary {
            overall_completion,
            active_habits: habits.len() as u32,
            completed_today,
            weekly_progress,
            current_streaks,
            year_comb,
            best_performing,
        })
    }

    /// The week/month/year dashboard for all active habits.
    pub fn range_stats(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<RangeStats> {
        let today = self.clock_for(user_id)?.local_day(now);
        let habits = self.store.habits_by_owner(user_id)?;
        let logs = self.store.logs_by_user(user_id)?;
        Ok(completion::range_stats(&habits, &logs, today))
    }

    /// Calendar-year heatmap for all the user's habits.
    pub fn year_heatmap(&self, user_id: Uuid, year: i32) -> Result<YearHeatmap> {
        let habits = self.store.habits_by_owner(user_id)?;
        let logs = self.store.logs_by_user(user_id)?;
        Ok(completion::year_heatmap(&habits, &logs, year))
    }

    // === hives ===

    pub fn create_hive(&self, user_id: Uuid, new: NewHive, now: DateTime<Utc>) -> Result<Hive> {
        let hive = Hive {
            id: Uuid::new_v4(),
            owner_id: user_id,
            name: new.name,
            color_hex: new.color_hex,
            kind: new.kind,
            target_per_day: new.target_per_day,
            rule: new.rule,
            threshold: new.threshold,
            schedule_daily: new.schedule_daily,
            schedule_weekmask: new.schedule_weekmask,
            max_members: new.max_members,
            current_streak: 0,
            longest_streak: 0,
            last_advanced_on: None,
            invite_code: None,
            created_at: now,
        };
        hive.validate()?;
        self.store.put_hive(&hive)?;
        self.store.put_member(&HiveMember {
            hive_id: hive.id,
            user_id,
            role: MemberRole::Owner,
            joined_at: now,
            left_at: None,
            is_active: true,
        })?;
        info!(hive_id = %hive.id, "hive created");
        Ok(hive)
    }

    /// Convert a habit into a hive, optionally backfilling recent logs as
    /// the owner's member-days.
    pub fn create_hive_from_habit(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        name: Option<String>,
        backfill_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Hive> {
        if backfill_days > 90 {
            return Err(ValidationError::field("backfill_days", "must be in 0..=90").into());
        }
        let habit = self.owned_habit(user_id, habit_id)?;
        let hive = self.create_hive(
            user_id,
            NewHive {
                name: name.unwrap_or_else(|| habit.name.clone()),
                color_hex: habit.color_hex.clone(),
                kind: habit.kind,
                target_per_day: habit.target_per_day,
                rule: HiveRule::AllMustComplete,
                threshold: None,
                schedule_daily: habit.schedule_daily,
                schedule_weekmask: habit.schedule_weekmask,
                max_members: 10,
            },
            now,
        )?;

        if backfill_days > 0 {
            let today = self.clock_for(user_id)?.local_day(now);
            let cutoff = today - Duration::days(i64::from(backfill_days));
            for log in self.store.habit_logs(habit_id)? {
                if log.log_date >= cutoff {
                    self.store.upsert_member_day(&HiveMemberDay {
                        hive_id: hive.id,
                        user_id,
                        day_date: log.log_date,
                        value: log.value,
                        done: log.value > 0,
                    })?;
                }
            }
        }
        Ok(hive)
    }

    fn hive_or_not_found(&self, hive_id: Uuid) -> Result<Hive> {
        self.store.hive(hive_id)?.ok_or(CoreError::NotFound {
            entity: "hive",
            id: hive_id.to_string(),
        })
    }

    /// Fetch a hive, requiring the caller to hold an active membership.
    fn member_hive(&self, user_id: Uuid, hive_id: Uuid) -> Result<Hive> {
        let hive = self.hive_or_not_found(hive_id)?;
        let membership = self.store.member(hive_id, user_id)?;
        if !membership.map(|m| m.is_active).unwrap_or(false) {
            return Err(CoreError::Forbidden("not a member of this hive".into()));
        }
        Ok(hive)
    }

    pub fn delete_hive(&self, user_id: Uuid, hive_id: Uuid) -> Result<()> {
        let hive = self.hive_or_not_found(hive_id)?;
        if hive.owner_id != user_id {
            return Err(CoreError::Forbidden(
                "only the owner can delete the hive".into(),
            ));
        }
        self.store.delete_hive(hive_id)?;
        info!(%hive_id, "hive deleted");
        Ok(())
    }

    /// Hives the user is an active member of.
    pub fn hives_for_user(&self, user_id: Uuid) -> Result<Vec<Hive>> {
        let mut hives = Vec::new();
        for membership in self.store.memberships_by_user(user_id)? {
            if !membership.is_active {
                continue;
            }
            if let Some(hive) = self.store.hive(membership.hive_id)? {
                hives.push(hive);
            }
        }
        hives.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(hives)
    }

    /// Detailed hive view for an active member.
    pub fn hive_detail(
        &self,
        user_id: Uuid,
        hive_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<HiveDetail> {
        let hive = self.member_hive(user_id, hive_id)?;
        let today = self.clock_for(user_id)?.local_day(now);

        let roster = self.store.members(hive_id)?;
        let mut members = Vec::new();
        for member in roster.iter().filter(|m| m.is_active) {
            let profile = self.store.profile(member.user_id)?;
            members.push(MemberInfo {
                member: member.clone(),
                display_name: profile.as_ref().map(|p| p.display_name.clone()),
                avatar_url: profile.and_then(|p| p.avatar_url),
            });
        }

        let day_records = self.store.member_days_on(hive_id, today)?;
        let today_status = consensus::evaluate_day(&hive, &roster, &day_records, today)?;
        let recent_activity = self.store.activity_feed(&[hive_id], 20)?;

        Ok(HiveDetail {
            hive,
            members,
            today_status,
            recent_activity,
        })
    }

    // === invites ===

    /// Issue a fresh invite code for a hive (owner only).
    pub fn create_invite(
        &self,
        user_id: Uuid,
        hive_id: Uuid,
        ttl_minutes: i64,
        max_uses: u32,
        now: DateTime<Utc>,
    ) -> Result<HiveInvite> {
        if ttl_minutes <= 0 {
            return Err(ValidationError::field("ttl_minutes", "must be positive").into());
        }
        if max_uses == 0 {
            return Err(ValidationError::field("max_uses", "must be positive").into());
        }
        let mut hive = self.hive_or_not_found(hive_id)?;
        if hive.owner_id != user_id {
            return Err(CoreError::Forbidden(
                "only the owner can create invites".into(),
            ));
        }

        // Collision check against this hive's still-live codes.
        let live: Vec<String> = self
            .store
            .invites_by_hive(hive_id)?
            .into_iter()
            .filter(|i| !i.is_expired(now) && !i.is_exhausted())
            .map(|i| i.code)
            .collect();
        let code = generate_unique_code(|candidate| live.iter().any(|c| c == candidate));

        let invite = HiveInvite {
            id: Uuid::new_v4(),
            hive_id,
            code,
            created_by: user_id,
            expires_at: expiry_for_ttl(now, ttl_minutes),
            max_uses,
            use_count: 0,
            created_at: now,
        };
        self.store.put_invite(&invite)?;
        hive.invite_code = Some(invite.code.clone());
        self.store.put_hive(&hive)?;
        info!(%hive_id, code = %invite.code, "invite issued");
        Ok(invite)
    }

    /// Redeem an invite code.
    ///
    /// Existing members (active or departed) rejoin for free: the use count
    /// is not incremented. New members consume one use atomically; losing
    /// the race on the last use surfaces as `Conflict::InviteExhausted`.
    pub fn join_hive(&self, user_id: Uuid, code: &str, now: DateTime<Utc>) -> Result<JoinOutcome> {
        let invite = self
            .store
            .invite_by_code(code)?
            .ok_or(CoreError::NotFound {
                entity: "invite",
                id: code.to_string(),
            })?;
        check_valid(&invite, now)?;
        let hive = self.hive_or_not_found(invite.hive_id)?;

        if let Some(mut membership) = self.store.member(hive.id, user_id)? {
            if membership.is_active {
                return Ok(JoinOutcome {
                    hive_id: hive.id,
                    rejoined: false,
                    already_member: true,
                });
            }
            // Rejoin: reactivate the soft-deleted row, no use-count charge.
            membership.is_active = true;
            membership.left_at = None;
            self.store.put_member(&membership)?;
            self.record(ActivityEvent {
                id: Uuid::new_v4(),
                actor_id: user_id,
                hive_id: Some(hive.id),
                habit_id: None,
                kind: ActivityKind::HiveJoined,
                data: serde_json::json!({ "rejoined": true }),
                created_at: now,
            })?;
            info!(hive_id = %hive.id, %user_id, "member rejoined");
            return Ok(JoinOutcome {
                hive_id: hive.id,
                rejoined: true,
                already_member: false,
            });
        }

        let active_count = self
            .store
            .members(hive.id)?
            .iter()
            .filter(|m| m.is_active)
            .count() as u32;
        if active_count >= hive.max_members {
            return Err(ConflictError::HiveFull {
                max_members: hive.max_members,
            }
            .into());
        }

        if !self.store.increment_invite_use(code)? {
            return Err(ConflictError::InviteExhausted.into());
        }
        self.store.put_member(&HiveMember {
            hive_id: hive.id,
            user_id,
            role: MemberRole::Member,
            joined_at: now,
            left_at: None,
            is_active: true,
        })?;
        self.record(ActivityEvent {
            id: Uuid::new_v4(),
            actor_id: user_id,
            hive_id: Some(hive.id),
            habit_id: None,
            kind: ActivityKind::HiveJoined,
            data: serde_json::json!({}),
            created_at: now,
        })?;
        info!(hive_id = %hive.id, %user_id, "member joined");
        Ok(JoinOutcome {
            hive_id: hive.id,
            rejoined: false,
            already_member: false,
        })
    }

    /// Leave a hive. Owners must transfer ownership first.
    pub fn leave_hive(&self, user_id: Uuid, hive_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let hive = self.hive_or_not_found(hive_id)?;
        let mut membership = self
            .store
            .member(hive_id, user_id)?
            .filter(|m| m.is_active)
            .ok_or(CoreError::NotFound {
                entity: "membership",
                id: user_id.to_string(),
            })?;
        if hive.owner_id == user_id {
            return Err(CoreError::Forbidden(
                "owner must transfer ownership before leaving".into(),
            ));
        }
        membership.is_active = false;
        membership.left_at = Some(now);
        self.store.put_member(&membership)?;
        info!(%hive_id, %user_id, "member left");
        Ok(())
    }

    /// Hand the hive to another active member (owner only).
    pub fn transfer_ownership(
        &self,
        user_id: Uuid,
        hive_id: Uuid,
        new_owner: Uuid,
    ) -> Result<()> {
        let mut hive = self.hive_or_not_found(hive_id)?;
        if hive.owner_id != user_id {
            return Err(CoreError::Forbidden(
                "only the owner can transfer ownership".into(),
            ));
        }
        let mut incoming = self
            .store
            .member(hive_id, new_owner)?
            .filter(|m| m.is_active)
            .ok_or(CoreError::NotFound {
                entity: "membership",
                id: new_owner.to_string(),
            })?;
        let mut outgoing = self
            .store
            .member(hive_id, user_id)?
            .ok_or(CoreError::NotFound {
                entity: "membership",
                id: user_id.to_string(),
            })?;

        incoming.role = MemberRole::Owner;
        outgoing.role = MemberRole::Member;
        hive.owner_id = new_owner;
        self.store.put_member(&incoming)?;
        self.store.put_member(&outgoing)?;
        self.store.put_hive(&hive)?;
        info!(%hive_id, %new_owner, "ownership transferred");
        Ok(())
    }

    /// Log the caller's value for a hive day (defaults to local today).
    pub fn log_hive_day(
        &self,
        user_id: Uuid,
        hive_id: Uuid,
        value: u32,
        day: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<HiveMemberDay> {
        if value == 0 {
            return Err(ValidationError::field("value", "must be positive").into());
        }
        self.member_hive(user_id, hive_id)?;
        let day_date = match day {
            Some(d) => d,
            None => self.clock_for(user_id)?.local_day(now),
        };
        let record = HiveMemberDay {
            hive_id,
            user_id,
            day_date,
            value,
            done: value > 0,
        };
        self.store.upsert_member_day(&record)?;
        debug!(%hive_id, %user_id, %day_date, value, "hive day logged");
        Ok(record)
    }

    /// Evaluate a hive's rule for a day and advance the shared streak if it
    /// is satisfied and the day was not already advanced.
    pub fn advance_hive(
        &self,
        user_id: Uuid,
        hive_id: Uuid,
        day: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome> {
        let hive = self.member_hive(user_id, hive_id)?;
        let target_day = match day {
            Some(d) => d,
            None => self.clock_for(user_id)?.local_day(now),
        };

        let roster = self.store.members(hive_id)?;
        let day_records = self.store.member_days_on(hive_id, target_day)?;
        let evaluation = consensus::evaluate_day(&hive, &roster, &day_records, target_day)?;

        let updated = if evaluation.satisfied {
            self.store.advance_streak_if_unadvanced(hive_id, target_day)?
        } else {
            None
        };

        let advanced = updated.is_some();
        let after = updated.unwrap_or(hive);
        if advanced {
            info!(%hive_id, %target_day, streak = after.current_streak, "hive advanced");
            self.record(ActivityEvent {
                id: Uuid::new_v4(),
                actor_id: user_id,
                hive_id: Some(hive_id),
                habit_id: None,
                kind: ActivityKind::HiveAdvanced,
                data: serde_json::json!({ "streak": after.current_streak }),
                created_at: now,
            })?;
            if MILESTONE_STREAKS.contains(&after.current_streak) {
                self.record(ActivityEvent {
                    id: Uuid::new_v4(),
                    actor_id: user_id,
                    hive_id: Some(hive_id),
                    habit_id: None,
                    kind: ActivityKind::StreakMilestone,
                    data: serde_json::json!({ "streak": after.current_streak }),
                    created_at: now,
                })?;
            }
        }

        Ok(AdvanceOutcome {
            advanced,
            complete_count: evaluation.complete_count,
            required_count: evaluation.required_count,
            current_streak: after.current_streak,
            longest_streak: after.longest_streak,
        })
    }

    // === leaderboard & activity ===

    /// Rank co-members across the user's hives by today's completions.
    pub fn leaderboard(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<LeaderboardEntry>> {
        let today = self.clock_for(user_id)?.local_day(now);
        let my_memberships = self.store.memberships_by_user(user_id)?;

        let mut hives = Vec::new();
        let mut memberships = Vec::new();
        let mut member_days = Vec::new();
        let mut profiles = Vec::new();
        let mut seen_users = std::collections::HashSet::new();

        for membership in my_memberships.iter().filter(|m| m.is_active) {
            let Some(hive) = self.store.hive(membership.hive_id)? else {
                continue;
            };
            let roster = self.store.members(hive.id)?;
            for member in &roster {
                if seen_users.insert(member.user_id) {
                    if let Some(profile) = self.store.profile(member.user_id)? {
                        profiles.push(profile);
                    }
                }
            }
            member_days.extend(self.store.member_days_on(hive.id, today)?);
            memberships.extend(roster);
            hives.push(hive);
        }

        Ok(leaderboard::rank(
            user_id,
            &hives,
            &memberships,
            &member_days,
            &profiles,
            today,
        ))
    }

    /// Activity feed across the user's hives, optionally filtered to one.
    pub fn activity_feed(
        &self,
        user_id: Uuid,
        hive_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<ActivityEvent>> {
        let hive_ids: Vec<Uuid> = match hive_id {
            Some(id) => {
                self.member_hive(user_id, id)?;
                vec![id]
            }
            None => self
                .store
                .memberships_by_user(user_id)?
                .into_iter()
                .filter(|m| m.is_active)
                .map(|m| m.hive_id)
                .collect(),
        };
        self.store.activity_feed(&hive_ids, limit)
    }
}
