//! Calendar-day arithmetic and user-local day resolution.
//!
//! A user's "day" runs from their configured day-start hour to the next
//! occurrence of the same hour, so a 2am log with a 4am cutoff still lands
//! on the previous calendar date. All downstream engines operate on the
//! `NaiveDate` values this module produces.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc};

use crate::model::Profile;

/// Resolves instants into calendar days in one user's local frame.
#[derive(Debug, Clone, Copy)]
pub struct LocalDayClock {
    utc_offset_minutes: i32,
    day_start_hour: u32,
}

impl LocalDayClock {
    /// Create a clock from an explicit offset and cutoff hour.
    ///
    /// Out-of-range cutoff hours are clamped to 0..=23, offsets to less
    /// than one day either way.
    pub fn new(utc_offset_minutes: i32, day_start_hour: u32) -> Self {
        Self {
            utc_offset_minutes: utc_offset_minutes.clamp(-(24 * 60 - 1), 24 * 60 - 1),
            day_start_hour: day_start_hour.min(23),
        }
    }

    /// Clock in the UTC frame with a midnight cutoff.
    pub fn utc() -> Self {
        Self::new(0, 0)
    }

    /// Build from the identity provider's profile preferences.
    pub fn for_profile(profile: &Profile) -> Self {
        Self::new(profile.utc_offset_minutes, profile.day_start_hour)
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// The calendar day an instant belongs to in this user's frame.
    ///
    /// An instant whose local hour is before the day-start cutoff belongs to
    /// the previous calendar date.
    pub fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        let local = instant.with_timezone(&self.offset());
        let date = local.date_naive();
        if local.hour() < self.day_start_hour {
            date.pred_opt().unwrap_or(date)
        } else {
            date
        }
    }

    /// Today in this user's frame.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_day(now)
    }
}

impl Default for LocalDayClock {
    fn default() -> Self {
        Self::utc()
    }
}

/// Inclusive, ascending range of calendar days.
///
/// Cloneable so consumers can restart iteration; `end < start` yields an
/// empty range rather than an error.
#[derive(Debug, Clone)]
pub struct DayRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DayRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = current.succ_opt();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(next) if next <= self.end => {
                let days = (self.end - next).num_days() as usize + 1;
                (days, Some(days))
            }
            _ => (0, Some(0)),
        }
    }
}

/// Days from `start` through `end`, inclusive.
pub fn day_range(start: NaiveDate, end: NaiveDate) -> DayRange {
    DayRange {
        next: Some(start),
        end,
    }
}

/// The first day of the window of `window_days` days ending at `reference`.
pub fn window_start(reference: NaiveDate, window_days: i64) -> NaiveDate {
    reference - Duration::days(window_days - 1)
}

/// Jan 1 and Dec 31 of the given year.
pub fn year_bounds(year: i32) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 12, 31).unwrap());
    (start, end)
}

/// Whether a date falls inside the given calendar year.
pub fn in_year(date: NaiveDate, year: i32) -> bool {
    date.year() == year
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_early_morning_belongs_to_previous_day() {
        // 2am local, 4am cutoff
        let clock = LocalDayClock::new(0, 4);
        assert_eq!(clock.local_day(utc(2025, 6, 15, 2, 0)), date(2025, 6, 14));
    }

    #[test]
    fn test_cutoff_hour_starts_the_new_day() {
        let clock = LocalDayClock::new(0, 4);
        assert_eq!(clock.local_day(utc(2025, 6, 15, 4, 0)), date(2025, 6, 15));
    }

    #[test]
    fn test_offset_shifts_local_date() {
        // 23:30 UTC is 01:30 on the next day at UTC+2; with midnight cutoff
        // that lands on the 16th.
        let clock = LocalDayClock::new(120, 0);
        assert_eq!(clock.local_day(utc(2025, 6, 15, 23, 30)), date(2025, 6, 16));
    }

    #[test]
    fn test_negative_offset_with_cutoff() {
        // 03:00 UTC is 22:00 the previous day at UTC-5.
        let clock = LocalDayClock::new(-300, 4);
        assert_eq!(clock.local_day(utc(2025, 6, 15, 3, 0)), date(2025, 6, 14));
    }

    #[test]
    fn test_year_boundary_rolls_back() {
        let clock = LocalDayClock::new(0, 4);
        assert_eq!(clock.local_day(utc(2026, 1, 1, 1, 0)), date(2025, 12, 31));
    }

    #[test]
    fn test_day_range_inclusive() {
        let days: Vec<_> = day_range(date(2025, 2, 27), date(2025, 3, 2)).collect();
        assert_eq!(
            days,
            vec![
                date(2025, 2, 27),
                date(2025, 2, 28),
                date(2025, 3, 1),
                date(2025, 3, 2),
            ]
        );
    }

    #[test]
    fn test_day_range_leap_year() {
        let days: Vec<_> = day_range(date(2024, 2, 28), date(2024, 3, 1)).collect();
        assert_eq!(
            days,
            vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]
        );
    }

    #[test]
    fn test_day_range_empty_when_end_before_start() {
        let mut range = day_range(date(2025, 5, 2), date(2025, 5, 1));
        assert_eq!(range.next(), None);
    }

    #[test]
    fn test_day_range_is_restartable() {
        let range = day_range(date(2025, 1, 1), date(2025, 1, 5));
        let first: Vec<_> = range.clone().collect();
        let second: Vec<_> = range.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_iso_round_trip_across_year_boundary() {
        for day in day_range(date(2024, 12, 30), date(2025, 1, 2)) {
            let encoded = day.format("%Y-%m-%d").to_string();
            let decoded: NaiveDate = encoded.parse().unwrap();
            assert_eq!(decoded, day);
        }
    }

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(date(2025, 3, 10), 7), date(2025, 3, 4));
        assert_eq!(window_start(date(2025, 3, 10), 1), date(2025, 3, 10));
    }

    #[test]
    fn test_year_bounds() {
        let (start, end) = year_bounds(2025);
        assert_eq!(start, date(2025, 1, 1));
        assert_eq!(end, date(2025, 12, 31));
    }

    proptest! {
        #[test]
        fn prop_day_range_length_matches_difference(
            start_offset in 0i64..20_000,
            span in 0i64..400,
        ) {
            let start = date(1990, 1, 1) + Duration::days(start_offset);
            let end = start + Duration::days(span);
            let count = day_range(start, end).count() as i64;
            prop_assert_eq!(count, span + 1);
        }

        #[test]
        fn prop_day_range_ascending(
            start_offset in 0i64..20_000,
            span in 0i64..100,
        ) {
            let start = date(1990, 1, 1) + Duration::days(start_offset);
            let end = start + Duration::days(span);
            let days: Vec<_> = day_range(start, end).collect();
            for pair in days.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
