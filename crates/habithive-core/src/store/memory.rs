//! In-memory store backed by mutex-guarded maps.
//!
//! Keys mirror the uniqueness invariants: logs by (habit, date), members by
//! (hive, user), member-days by (hive, user, date), invites by code. The
//! conditional updates hold the lock for the whole check-and-update, which
//! makes them atomic with respect to other callers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::consensus::apply_advance;
use crate::error::Result;
use crate::model::{
    ActivityEvent, Habit, HabitLog, Hive, HiveInvite, HiveMember, HiveMemberDay, Profile,
};

use super::Store;

#[derive(Default)]
struct Inner {
    profiles: HashMap<Uuid, Profile>,
    habits: HashMap<Uuid, Habit>,
    habit_logs: HashMap<(Uuid, NaiveDate), HabitLog>,
    hives: HashMap<Uuid, Hive>,
    members: HashMap<(Uuid, Uuid), HiveMember>,
    member_days: HashMap<(Uuid, Uuid, NaiveDate), HiveMemberDay>,
    invites: HashMap<String, HiveInvite>,
    activity: Vec<ActivityEvent>,
}

/// Ephemeral store for tests and simulations.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means another test thread panicked; the data
        // is still consistent for these single-step operations.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.lock().profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    fn profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.lock().profiles.get(&id).cloned())
    }

    fn put_habit(&self, habit: &Habit) -> Result<()> {
        self.lock().habits.insert(habit.id, habit.clone());
        Ok(())
    }

    fn habit(&self, id: Uuid) -> Result<Option<Habit>> {
        Ok(self.lock().habits.get(&id).cloned())
    }

    fn habits_by_owner(&self, user_id: Uuid) -> Result<Vec<Habit>> {
        let mut habits: Vec<Habit> = self
            .lock()
            .habits
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        habits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(habits)
    }

    fn upsert_habit_log(&self, log: &HabitLog) -> Result<()> {
        self.lock()
            .habit_logs
            .insert((log.habit_id, log.log_date), log.clone());
        Ok(())
    }

    fn delete_habit_log(&self, habit_id: Uuid, day: NaiveDate) -> Result<bool> {
        Ok(self.lock().habit_logs.remove(&(habit_id, day)).is_some())
    }

    fn habit_logs(&self, habit_id: Uuid) -> Result<Vec<HabitLog>> {
        let mut logs: Vec<HabitLog> = self
            .lock()
            .habit_logs
            .values()
            .filter(|l| l.habit_id == habit_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.log_date.cmp(&a.log_date));
        Ok(logs)
    }

    fn logs_by_user(&self, user_id: Uuid) -> Result<Vec<HabitLog>> {
        Ok(self
            .lock()
            .habit_logs
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    fn put_hive(&self, hive: &Hive) -> Result<()> {
        self.lock().hives.insert(hive.id, hive.clone());
        Ok(())
    }

    fn hive(&self, id: Uuid) -> Result<Option<Hive>> {
        Ok(self.lock().hives.get(&id).cloned())
    }

    fn delete_hive(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        inner.hives.remove(&id);
        inner.members.retain(|(hive_id, _), _| *hive_id != id);
        inner.member_days.retain(|(hive_id, _, _), _| *hive_id != id);
        inner.invites.retain(|_, invite| invite.hive_id != id);
        Ok(())
    }

    fn put_member(&self, member: &HiveMember) -> Result<()> {
        self.lock()
            .members
            .insert((member.hive_id, member.user_id), member.clone());
        Ok(())
    }

    fn member(&self, hive_id: Uuid, user_id: Uuid) -> Result<Option<HiveMember>> {
        Ok(self.lock().members.get(&(hive_id, user_id)).cloned())
    }

    fn members(&self, hive_id: Uuid) -> Result<Vec<HiveMember>> {
        let mut members: Vec<HiveMember> = self
            .lock()
            .members
            .values()
            .filter(|m| m.hive_id == hive_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
    }

    fn memberships_by_user(&self, user_id: Uuid) -> Result<Vec<HiveMember>> {
        Ok(self
            .lock()
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    fn upsert_member_day(&self, day: &HiveMemberDay) -> Result<()> {
        self.lock()
            .member_days
            .insert((day.hive_id, day.user_id, day.day_date), day.clone());
        Ok(())
    }

    fn member_days(&self, hive_id: Uuid) -> Result<Vec<HiveMemberDay>> {
        Ok(self
            .lock()
            .member_days
            .values()
            .filter(|d| d.hive_id == hive_id)
            .cloned()
            .collect())
    }

    fn member_days_on(&self, hive_id: Uuid, day: NaiveDate) -> Result<Vec<HiveMemberDay>> {
        Ok(self
            .lock()
            .member_days
            .values()
            .filter(|d| d.hive_id == hive_id && d.day_date == day)
            .cloned()
            .collect())
    }

    fn put_invite(&self, invite: &HiveInvite) -> Result<()> {
        self.lock()
            .invites
            .insert(invite.code.clone(), invite.clone());
        Ok(())
    }

    fn invite_by_code(&self, code: &str) -> Result<Option<HiveInvite>> {
        Ok(self.lock().invites.get(code).cloned())
    }

    fn invites_by_hive(&self, hive_id: Uuid) -> Result<Vec<HiveInvite>> {
        Ok(self
            .lock()
            .invites
            .values()
            .filter(|i| i.hive_id == hive_id)
            .cloned()
            .collect())
    }

    fn increment_invite_use(&self, code: &str) -> Result<bool> {
        let mut inner = self.lock();
        match inner.invites.get_mut(code) {
            Some(invite) if invite.use_count < invite.max_uses => {
                invite.use_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn advance_streak_if_unadvanced(&self, hive_id: Uuid, day: NaiveDate) -> Result<Option<Hive>> {
        let mut inner = self.lock();
        match inner.hives.get_mut(&hive_id) {
            Some(hive) if crate::consensus::may_advance(hive, day) => {
                apply_advance(hive, day);
                Ok(Some(hive.clone()))
            }
            _ => Ok(None),
        }
    }

    fn record_activity(&self, event: &ActivityEvent) -> Result<()> {
        self.lock().activity.push(event.clone());
        Ok(())
    }

    fn activity_feed(&self, hive_ids: &[Uuid], limit: usize) -> Result<Vec<ActivityEvent>> {
        let mut events: Vec<ActivityEvent> = self
            .lock()
            .activity
            .iter()
            .filter(|e| e.hive_id.map(|id| hive_ids.contains(&id)).unwrap_or(false))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HabitKind, HiveRule, MemberRole};
    use chrono::{Duration, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_hive() -> Hive {
        Hive {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Meditate".to_string(),
            color_hex: "#FF9F1C".to_string(),
            kind: HabitKind::Checkbox,
            target_per_day: 1,
            rule: HiveRule::AllMustComplete,
            threshold: None,
            schedule_daily: true,
            schedule_weekmask: 127,
            max_members: 5,
            current_streak: 0,
            longest_streak: 0,
            last_advanced_on: None,
            invite_code: None,
            created_at: Utc::now(),
        }
    }

    fn sample_invite(hive_id: Uuid, max_uses: u32) -> HiveInvite {
        HiveInvite {
            id: Uuid::new_v4(),
            hive_id,
            code: crate::invite::generate_code(),
            created_by: Uuid::new_v4(),
            expires_at: Utc::now() + Duration::hours(1),
            max_uses,
            use_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_habit_log_overwrites_by_day() {
        let store = MemoryStore::new();
        let habit_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let d = date(2025, 6, 10);
        for value in [1, 3] {
            store
                .upsert_habit_log(&HabitLog {
                    id: Uuid::new_v4(),
                    habit_id,
                    user_id,
                    log_date: d,
                    value,
                    source: "manual".to_string(),
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        let logs = store.habit_logs(habit_id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].value, 3);
    }

    #[test]
    fn test_increment_stops_at_limit() {
        let store = MemoryStore::new();
        let invite = sample_invite(Uuid::new_v4(), 2);
        store.put_invite(&invite).unwrap();

        assert!(store.increment_invite_use(&invite.code).unwrap());
        assert!(store.increment_invite_use(&invite.code).unwrap());
        assert!(!store.increment_invite_use(&invite.code).unwrap());
        assert_eq!(
            store.invite_by_code(&invite.code).unwrap().unwrap().use_count,
            2
        );
    }

    #[test]
    fn test_advance_is_idempotent_per_day() {
        let store = MemoryStore::new();
        let hive = sample_hive();
        store.put_hive(&hive).unwrap();
        let d = date(2025, 6, 10);

        let first = store.advance_streak_if_unadvanced(hive.id, d).unwrap();
        assert_eq!(first.unwrap().current_streak, 1);
        let second = store.advance_streak_if_unadvanced(hive.id, d).unwrap();
        assert!(second.is_none());
        assert_eq!(store.hive(hive.id).unwrap().unwrap().current_streak, 1);
    }

    #[test]
    fn test_delete_hive_cascades() {
        let store = MemoryStore::new();
        let hive = sample_hive();
        store.put_hive(&hive).unwrap();
        let user_id = Uuid::new_v4();
        store
            .put_member(&HiveMember {
                hive_id: hive.id,
                user_id,
                role: MemberRole::Owner,
                joined_at: Utc::now(),
                left_at: None,
                is_active: true,
            })
            .unwrap();
        let invite = sample_invite(hive.id, 5);
        store.put_invite(&invite).unwrap();

        store.delete_hive(hive.id).unwrap();
        assert!(store.hive(hive.id).unwrap().is_none());
        assert!(store.members(hive.id).unwrap().is_empty());
        assert!(store.invite_by_code(&invite.code).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_redemption_single_winner() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let invite = sample_invite(Uuid::new_v4(), 1);
        store.put_invite(&invite).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let code = invite.code.clone();
                std::thread::spawn(move || store.increment_invite_use(&code).unwrap())
            })
            .collect();
        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|&&won| won).count(), 1);
        assert_eq!(
            store.invite_by_code(&invite.code).unwrap().unwrap().use_count,
            1
        );
    }
}
