//! Group-consensus evaluation for hive streak advancement.
//!
//! For a hive and a target day this module classifies each active member's
//! logged value against the hive target, then decides whether the shared
//! streak advances under the hive's rule. The engine only ever advances or
//! no-ops; breaking a streak on missed days is an external scheduler's job.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Hive, HiveMember, HiveMemberDay, HiveRule};

/// A member's standing for one hive day.
///
/// The three-way split is a first-class contract: leaderboards and clients
/// distinguish "logged something but under target" from "nothing yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberDayStatus {
    /// Value met or exceeded the hive target.
    Completed,
    /// Something was logged, but below target.
    Partial,
    /// No entry, or a zero value.
    Pending,
}

/// Classify a logged value (if any) against the hive target.
pub fn classify(value: Option<u32>, target: u32) -> MemberDayStatus {
    let target = target.max(1);
    match value {
        Some(v) if v >= target => MemberDayStatus::Completed,
        Some(v) if v > 0 => MemberDayStatus::Partial,
        _ => MemberDayStatus::Pending,
    }
}

/// One active member's classified snapshot for the evaluated day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDaySnapshot {
    pub user_id: Uuid,
    pub value: u32,
    pub status: MemberDayStatus,
}

/// The consensus verdict for one hive day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayEvaluation {
    pub day: NaiveDate,
    /// Whether the hive's rule is satisfied for this day.
    pub satisfied: bool,
    pub complete_count: u32,
    pub required_count: u32,
    pub members: Vec<MemberDaySnapshot>,
    pub members_done: Vec<Uuid>,
}

/// Evaluate a hive's rule for one day over its active roster.
///
/// Departed members (is_active = false) neither block nor count. A hive
/// with an empty active roster is vacuously satisfied under
/// `all_must_complete`; callers that find this undesirable must not
/// evaluate before the roster exists.
///
/// # Errors
/// Returns `InvalidInput` when the rule is `threshold` with no threshold.
pub fn evaluate_day(
    hive: &Hive,
    roster: &[HiveMember],
    member_days: &[HiveMemberDay],
    day: NaiveDate,
) -> Result<DayEvaluation> {
    let threshold = match hive.rule {
        HiveRule::Threshold => Some(
            hive.threshold
                .filter(|&t| t > 0)
                .ok_or(crate::error::ValidationError::MissingThreshold)?,
        ),
        HiveRule::AllMustComplete => None,
    };

    // Largest value wins if duplicate rows exist for a (member, day).
    let mut values: HashMap<Uuid, u32> = HashMap::new();
    for record in member_days {
        if record.hive_id == hive.id && record.day_date == day {
            values
                .entry(record.user_id)
                .and_modify(|v| *v = (*v).max(record.value))
                .or_insert(record.value);
        }
    }

    let mut members = Vec::new();
    let mut members_done = Vec::new();
    for member in roster.iter().filter(|m| m.is_active && m.hive_id == hive.id) {
        let value = values.get(&member.user_id).copied();
        let status = classify(value, hive.target_per_day);
        if status == MemberDayStatus::Completed {
            members_done.push(member.user_id);
        }
        members.push(MemberDaySnapshot {
            user_id: member.user_id,
            value: value.unwrap_or(0),
            status,
        });
    }

    let required_count = members.len() as u32;
    let complete_count = members_done.len() as u32;
    let satisfied = match threshold {
        Some(t) => complete_count >= t,
        None => complete_count == required_count,
    };

    Ok(DayEvaluation {
        day,
        satisfied,
        complete_count,
        required_count,
        members,
        members_done,
    })
}

/// Whether a satisfied day may actually advance the stored streak.
///
/// Advancing the same day twice must not double-increment, so the day must
/// be strictly after the last advanced day (or the hive never advanced).
pub fn may_advance(hive: &Hive, day: NaiveDate) -> bool {
    match hive.last_advanced_on {
        None => true,
        Some(last) => last < day,
    }
}

/// Apply an advancement to a hive snapshot in place.
///
/// This is the same single-step transition the stores execute atomically:
/// increment `current_streak`, raise `longest_streak`, stamp
/// `last_advanced_on`. Callers must have checked [`may_advance`].
pub fn apply_advance(hive: &mut Hive, day: NaiveDate) {
    hive.current_streak += 1;
    hive.longest_streak = hive.longest_streak.max(hive.current_streak);
    hive.last_advanced_on = Some(day);
}

/// Result of an advancement attempt, shaped for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub advanced: bool,
    pub complete_count: u32,
    pub required_count: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
}

/// Whether the hive's streak has gone stale: it has length but no
/// advancement for yesterday or today. Answering this never mutates; an
/// external job decides what to do about it.
pub fn streak_is_stale(hive: &Hive, today: NaiveDate) -> bool {
    if hive.current_streak == 0 {
        return false;
    }
    match hive.last_advanced_on {
        None => true,
        Some(last) => (today - last).num_days() > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hive(rule: HiveRule, threshold: Option<u32>, target: u32) -> Hive {
        Hive {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Morning run".to_string(),
            color_hex: "#FF9F1C".to_string(),
            kind: crate::model::HabitKind::Checkbox,
            target_per_day: target,
            rule,
            threshold,
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

    fn member(hive: &Hive, active: bool) -> HiveMember {
        HiveMember {
            hive_id: hive.id,
            user_id: Uuid::new_v4(),
            role: crate::model::MemberRole::Member,
            joined_at: Utc::now(),
            left_at: None,
            is_active: active,
        }
    }

    fn day_record(hive: &Hive, user_id: Uuid, day: NaiveDate, value: u32) -> HiveMemberDay {
        HiveMemberDay {
            hive_id: hive.id,
            user_id,
            day_date: day,
            value,
            done: value > 0,
        }
    }

    #[test]
    fn test_classify_three_way() {
        assert_eq!(classify(Some(4), 4), MemberDayStatus::Completed);
        assert_eq!(classify(Some(2), 4), MemberDayStatus::Partial);
        assert_eq!(classify(Some(0), 4), MemberDayStatus::Pending);
        assert_eq!(classify(None, 4), MemberDayStatus::Pending);
    }

    #[test]
    fn test_all_must_complete_vetoed_by_partial() {
        let h = hive(HiveRule::AllMustComplete, None, 4);
        let members = vec![member(&h, true), member(&h, true), member(&h, true)];
        let d = date(2025, 6, 10);
        let days = vec![
            day_record(&h, members[0].user_id, d, 4),
            day_record(&h, members[1].user_id, d, 5),
            day_record(&h, members[2].user_id, d, 2), // partial, vetoes
        ];
        let eval = evaluate_day(&h, &members, &days, d).unwrap();
        assert!(!eval.satisfied);
        assert_eq!(eval.complete_count, 2);
        assert_eq!(eval.required_count, 3);
    }

    #[test]
    fn test_threshold_passes_with_same_roster() {
        let h = hive(HiveRule::Threshold, Some(2), 4);
        let members = vec![member(&h, true), member(&h, true), member(&h, true)];
        let d = date(2025, 6, 10);
        let days = vec![
            day_record(&h, members[0].user_id, d, 4),
            day_record(&h, members[1].user_id, d, 5),
            day_record(&h, members[2].user_id, d, 2),
        ];
        let eval = evaluate_day(&h, &members, &days, d).unwrap();
        assert!(eval.satisfied);
        assert_eq!(eval.complete_count, 2);
    }

    #[test]
    fn test_departed_members_neither_block_nor_count() {
        let h = hive(HiveRule::AllMustComplete, None, 1);
        let active = member(&h, true);
        let departed = member(&h, false);
        let d = date(2025, 6, 10);
        // Only the active member logged; the departed one would have vetoed.
        let days = vec![day_record(&h, active.user_id, d, 1)];
        let eval = evaluate_day(&h, &[active, departed], &days, d).unwrap();
        assert!(eval.satisfied);
        assert_eq!(eval.required_count, 1);
    }

    #[test]
    fn test_empty_roster_is_vacuously_satisfied() {
        let h = hive(HiveRule::AllMustComplete, None, 1);
        let eval = evaluate_day(&h, &[], &[], date(2025, 6, 10)).unwrap();
        assert!(eval.satisfied);
        assert_eq!(eval.required_count, 0);
        assert_eq!(eval.complete_count, 0);
    }

    #[test]
    fn test_threshold_without_value_is_invalid() {
        let h = hive(HiveRule::Threshold, None, 1);
        assert!(evaluate_day(&h, &[], &[], date(2025, 6, 10)).is_err());
    }

    #[test]
    fn test_may_advance_is_idempotent_per_day() {
        let mut h = hive(HiveRule::AllMustComplete, None, 1);
        let d = date(2025, 6, 10);
        assert!(may_advance(&h, d));
        apply_advance(&mut h, d);
        assert_eq!(h.current_streak, 1);
        assert!(!may_advance(&h, d));
        assert!(may_advance(&h, date(2025, 6, 11)));
    }

    #[test]
    fn test_apply_advance_tracks_longest() {
        let mut h = hive(HiveRule::AllMustComplete, None, 1);
        h.current_streak = 3;
        h.longest_streak = 7;
        apply_advance(&mut h, date(2025, 6, 10));
        assert_eq!(h.current_streak, 4);
        assert_eq!(h.longest_streak, 7);
        h.current_streak = 7;
        apply_advance(&mut h, date(2025, 6, 11));
        assert_eq!(h.longest_streak, 8);
    }

    #[test]
    fn test_streak_staleness() {
        let mut h = hive(HiveRule::AllMustComplete, None, 1);
        let today = date(2025, 6, 10);
        assert!(!streak_is_stale(&h, today));

        h.current_streak = 3;
        h.last_advanced_on = Some(date(2025, 6, 9));
        assert!(!streak_is_stale(&h, today));

        h.last_advanced_on = Some(date(2025, 6, 8));
        assert!(streak_is_stale(&h, today));
    }

    #[test]
    fn test_duplicate_day_rows_take_largest() {
        let h = hive(HiveRule::AllMustComplete, None, 4);
        let m = member(&h, true);
        let d = date(2025, 6, 10);
        let days = vec![
            day_record(&h, m.user_id, d, 1),
            day_record(&h, m.user_id, d, 6),
        ];
        let eval = evaluate_day(&h, &[m], &days, d).unwrap();
        assert!(eval.satisfied);
        assert_eq!(eval.members[0].value, 6);
    }
}
