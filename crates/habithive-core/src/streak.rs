//! Current-streak calculation for habit and hive member-day series.
//!
//! A streak is the unbroken run of qualifying days ending at (and including)
//! a reference date, walking backward one day at a time. A day qualifies
//! when it has an entry whose value meets the target; an under-target entry
//! is a gap, not a skip.

use chrono::NaiveDate;

use crate::model::{max_value_by_day, LogEntry};

/// Length of the unbroken run of qualifying days ending at `reference`.
///
/// Entries may arrive unordered and may contain duplicate dates; duplicates
/// fold to the largest value for that day. The walk starts at the reference
/// date itself, so nothing on the reference day means a streak of zero.
/// Returns 0 for empty input.
pub fn current_streak(
    entries: impl IntoIterator<Item = LogEntry>,
    reference: NaiveDate,
    target: u32,
) -> u32 {
    let target = target.max(1);
    let by_day = max_value_by_day(entries);

    let mut streak = 0;
    let mut cursor = reference;
    loop {
        match by_day.get(&cursor) {
            Some(&value) if value >= target => {
                streak += 1;
                match cursor.pred_opt() {
                    Some(prev) => cursor = prev,
                    None => break,
                }
            }
            // An under-target entry is a gap; a missing day breaks the run.
            _ => break,
        }
    }
    streak
}
