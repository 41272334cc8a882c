//! Completion ratios and calendar heatmaps over day windows.
//!
//! Credit for a day is `min(value / target, 1.0)`: counter habits earn
//! fractional credit, and over-achieving one day can never offset a missed
//! day. Heatmaps are sparse; a missing key means zero.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::day::{in_year, window_start};
use crate::error::{Result, ValidationError};
use crate::model::{max_value_by_day, Habit, HabitLog, LogEntry};
use crate::streak::current_streak;

/// The three dashboard windows, in days.
pub const WEEK_DAYS: i64 = 7;
pub const MONTH_DAYS: i64 = 30;
pub const YEAR_DAYS: i64 = 365;

/// Capped per-day credit for a value against a target.
fn day_credit(value: u32, target: u32) -> f64 {
    let target = target.max(1);
    (f64::from(value) / f64::from(target)).min(1.0)
}

/// Completion percentage over the window of `window_days` days ending at
/// `reference`, inclusive.
///
/// # Errors
/// Returns `InvalidInput` when `window_days` is not positive.
pub fn window_completion(
    entries: impl IntoIterator<Item = LogEntry>,
    target: u32,
    window_days: i64,
    reference: NaiveDate,
) -> Result<f64> {
    if window_days <= 0 {
        return Err(ValidationError::NonPositiveWindow(window_days).into());
    }
    let start = window_start(reference, window_days);
    let credit: f64 = max_value_by_day(entries)
        .range(start..=reference)
        .map(|(_, &value)| day_credit(value, target))
        .sum();
    Ok(credit / window_days as f64 * 100.0)
}

/// Per-day activity totals for one calendar year.
///
/// Maps are sparse: days with no qualifying entries are absent, and an
/// absent key reads as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YearHeatmap {
    /// Capped total across all habits per day.
    pub day_totals: BTreeMap<NaiveDate, u32>,
    /// Capped per-day series keyed by habit.
    pub per_habit: HashMap<Uuid, BTreeMap<NaiveDate, u32>>,
    /// Largest value in `day_totals`, for intensity scaling.
    pub max_day_total: u32,
}

/// Build the year heatmap for a set of habits and their logs.
///
/// Each log inside the year contributes `min(value, target)` to its habit's
/// series and to the day's grand total. Zero contributions are omitted.
/// Logs for habits absent from `habits` are ignored.
pub fn year_heatmap(habits: &[Habit], logs: &[HabitLog], year: i32) -> YearHeatmap {
    let targets: HashMap<Uuid, u32> = habits
        .iter()
        .map(|h| (h.id, h.target_per_day.max(1)))
        .collect();

    let mut heatmap = YearHeatmap::default();
    for log in logs {
        if !in_year(log.log_date, year) {
            continue;
        }
        let Some(&target) = targets.get(&log.habit_id) else {
            continue;
        };
        let contribution = log.value.min(target);
        if contribution == 0 {
            continue;
        }
        *heatmap
            .per_habit
            .entry(log.habit_id)
            .or_default()
            .entry(log.log_date)
            .or_insert(0) += contribution;
        let total = heatmap.day_totals.entry(log.log_date).or_insert(0);
        *total += contribution;
        heatmap.max_day_total = heatmap.max_day_total.max(*total);
    }
    heatmap
}

/// One habit's standing inside a range summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitCompletion {
    pub habit_id: Uuid,
    pub name: String,
    pub emoji: Option<String>,
    pub completion: f64,
    pub current_streak: u32,
}

/// Aggregates for one window of days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSummary {
    pub window_days: i64,
    pub average_completion: f64,
    pub best_streak: u32,
    /// Per-habit breakdown, completion desc then name asc.
    pub habits: Vec<HabitCompletion>,
}

/// The full week/month/year dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeStats {
    pub week: RangeSummary,
    pub month: RangeSummary,
    pub year: RangeSummary,
}

/// Compute all three dashboard windows from one pass over the log set.
///
/// Inactive habits and logs for unknown habits are excluded. Cost is
/// O(habits × logs), not three independent scans.
pub fn range_stats(habits: &[Habit], logs: &[HabitLog], reference: NaiveDate) -> RangeStats {
    let active: Vec<&Habit> = habits.iter().filter(|h| h.is_active).collect();

    // One pass: fold logs into per-habit day maps.
    let mut by_habit: HashMap<Uuid, BTreeMap<NaiveDate, u32>> = HashMap::new();
    for habit in &active {
        by_habit.entry(habit.id).or_default();
    }
    for log in logs {
        if let Some(days) = by_habit.get_mut(&log.habit_id) {
            days.entry(log.log_date)
                .and_modify(|v| *v = (*v).max(log.value))
                .or_insert(log.value);
        }
    }

    let windows = [WEEK_DAYS, MONTH_DAYS, YEAR_DAYS];
    let starts = windows.map(|w| window_start(reference, w));

    // credit[w][habit], accumulated while walking each habit's days once.
    let mut summaries: Vec<Vec<HabitCompletion>> = vec![Vec::new(), Vec::new(), Vec::new()];
    let mut best_streak = 0;

    for habit in &active {
        let days = &by_habit[&habit.id];
        let target = habit.target_per_day;
        let streak = current_streak(
            days.iter().map(|(&date, &value)| LogEntry { date, value }),
            reference,
            target,
        );
        best_streak = best_streak.max(streak);

        let mut credit = [0.0f64; 3];
        for (&date, &value) in days.range(..=reference) {
            for (i, start) in starts.iter().enumerate() {
                if date >= *start {
                    credit[i] += day_credit(value, target);
                }
            }
        }

        for (i, window) in windows.iter().enumerate() {
            summaries[i].push(HabitCompletion {
                habit_id: habit.id,
                name: habit.name.clone(),
                emoji: habit.emoji.clone(),
                completion: credit[i] / *window as f64 * 100.0,
                current_streak: streak,
            });
        }
    }

    let mut build = |i: usize| {
        let mut habits = std::mem::take(&mut summaries[i]);
        habits.sort_by(|a, b| {
            b.completion
                .partial_cmp(&a.completion)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        let average = if habits.is_empty() {
            0.0
        } else {
            habits.iter().map(|h| h.completion).sum::<f64>() / habits.len() as f64
        };
        RangeSummary {
            window_days: windows[i],
            average_completion: average,
            best_streak,
            habits,
        }
    };

    RangeStats {
        week: build(0),
        month: build(1),
        year: build(2),
    }
}
