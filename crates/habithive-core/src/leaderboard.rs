//! Same-day completion ranking across a user's hives.
//!
//! Gathers every co-member of every hive the requesting user is active in,
//! tallies how many shared hives each completed today, and ranks them with
//! a deterministic tie-break.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consensus::{classify, MemberDayStatus};
use crate::model::{Hive, HiveMember, HiveMemberDay, Profile};

/// Number of entries a leaderboard is truncated to.
pub const LEADERBOARD_SIZE: usize = 5;

/// One ranked co-member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub display_name: String,
    /// Hives shared with the requester where this member completed today.
    pub completed_today: u32,
    /// Hives shared with the requester.
    pub total_hives: u32,
}

/// Rank co-members by today's completion count.
///
/// Sorted descending by `completed_today`, ties broken ascending by
/// display name (case-insensitive), truncated to [`LEADERBOARD_SIZE`].
/// The requesting user is not included in their own leaderboard.
pub fn rank(
    user_id: Uuid,
    hives: &[Hive],
    memberships: &[HiveMember],
    member_days: &[HiveMemberDay],
    profiles: &[Profile],
    today: NaiveDate,
) -> Vec<LeaderboardEntry> {
    let targets: HashMap<Uuid, u32> = hives.iter().map(|h| (h.id, h.target_per_day)).collect();
    let names: HashMap<Uuid, &str> = profiles
        .iter()
        .map(|p| (p.id, p.display_name.as_str()))
        .collect();

    let my_hives: Vec<Uuid> = memberships
        .iter()
        .filter(|m| m.user_id == user_id && m.is_active)
        .map(|m| m.hive_id)
        .collect();

    let day_values: HashMap<(Uuid, Uuid), u32> = member_days
        .iter()
        .filter(|d| d.day_date == today)
        .map(|d| ((d.hive_id, d.user_id), d.value))
        .collect();

    let mut tallies: HashMap<Uuid, LeaderboardEntry> = HashMap::new();
    for hive_id in &my_hives {
        let Some(&target) = targets.get(hive_id) else {
            continue;
        };
        for member in memberships.iter().filter(|m| {
            m.hive_id == *hive_id && m.is_active && m.user_id != user_id
        }) {
            let entry = tallies.entry(member.user_id).or_insert_with(|| {
                LeaderboardEntry {
                    user_id: member.user_id,
                    display_name: names
                        .get(&member.user_id)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| member.user_id.to_string()),
                    completed_today: 0,
                    total_hives: 0,
                }
            });
            entry.total_hives += 1;
            let value = day_values.get(&(*hive_id, member.user_id)).copied();
            if classify(value, target) == MemberDayStatus::Completed {
                entry.completed_today += 1;
            }
        }
    }

    let mut ranked: Vec<LeaderboardEntry> = tallies.into_values().collect();
    ranked.sort_by(|a, b| {
        b.completed_today
            .cmp(&a.completed_today)
            .then_with(|| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()))
    });
    ranked.truncate(LEADERBOARD_SIZE);
    ranked
}
