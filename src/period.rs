//! Calendar period utilities for the schedule grid.
//!
//! Pure date math: day ranges for week/month views, period labels, and
//! previous-period bounds for the copy engine. No store access.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use crate::types::ViewMode;

/// One day column of the schedule grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayColumn {
    pub date: NaiveDate,
    /// Zero-based week index within the range. Always 0 in week view; in
    /// month view it increments at every Monday after the first day.
    pub week_index: u32,
}

/// Monday of the week containing `anchor`.
pub fn week_start(anchor: NaiveDate) -> NaiveDate {
    anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64)
}

/// First and last day of `anchor`'s month.
pub fn month_bounds(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = anchor.with_day(1).unwrap_or(anchor);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month
        .map(|d| d - Duration::days(1))
        .unwrap_or(first);
    (first, last)
}

/// Number of days in `anchor`'s month.
pub fn days_in_month(anchor: NaiveDate) -> u32 {
    month_bounds(anchor).1.day()
}

/// Inclusive date bounds of the period containing `anchor`.
pub fn period_bounds(mode: ViewMode, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    match mode {
        ViewMode::Week => {
            let start = week_start(anchor);
            (start, start + Duration::days(6))
        }
        ViewMode::Month => month_bounds(anchor),
    }
}

/// Inclusive date bounds of the period immediately before `anchor`'s:
/// exactly 7 days earlier for week mode, the full previous calendar month
/// for month mode.
pub fn previous_period_bounds(mode: ViewMode, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    match mode {
        ViewMode::Week => {
            let start = week_start(anchor) - Duration::days(7);
            (start, start + Duration::days(6))
        }
        ViewMode::Month => {
            let (first, _) = month_bounds(anchor);
            month_bounds(first - Duration::days(1))
        }
    }
}

/// Ordered day columns for the view.
///
/// Week view: the 7 days of the Monday-starting week containing `anchor`.
/// Month view: every calendar day of `anchor`'s month, tagged with a
/// zero-based week index reset at every Monday.
pub fn build_days_range(mode: ViewMode, anchor: NaiveDate) -> Vec<DayColumn> {
    match mode {
        ViewMode::Week => {
            let start = week_start(anchor);
            (0..7)
                .map(|offset| DayColumn {
                    date: start + Duration::days(offset),
                    week_index: 0,
                })
                .collect()
        }
        ViewMode::Month => {
            let (first, last) = month_bounds(anchor);
            let mut columns = Vec::with_capacity(last.day() as usize);
            let mut week_index = 0u32;
            let mut day = first;
            while day <= last {
                if day != first && day.weekday() == Weekday::Mon {
                    week_index += 1;
                }
                columns.push(DayColumn {
                    date: day,
                    week_index,
                });
                day += Duration::days(1);
            }
            columns
        }
    }
}

/// Human-readable label for a period: `"dd.mm-dd.mm.yyyy"` for week view,
/// `"Month yyyy"` for month view.
pub fn format_period_label(mode: ViewMode, start: NaiveDate, end: NaiveDate) -> String {
    match mode {
        ViewMode::Week => format!("{}-{}", start.format("%d.%m"), end.format("%d.%m.%Y")),
        ViewMode::Month => start.format("%B %Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_week_range_starts_on_monday_with_seven_consecutive_days() {
        // 2024-07-04 is a Thursday; its week starts Monday 2024-07-01.
        let days = build_days_range(ViewMode::Week, date(2024, 7, 4));
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, date(2024, 7, 1));
        assert_eq!(days[0].date.weekday(), Weekday::Mon);
        assert_eq!(days[6].date, date(2024, 7, 7));
        for pair in days.windows(2) {
            assert_eq!(pair[1].date, pair[0].date + Duration::days(1));
        }
        assert!(days.iter().all(|d| d.week_index == 0));
    }

    #[test]
    fn test_week_range_is_identity_on_monday_anchor() {
        let days = build_days_range(ViewMode::Week, date(2024, 7, 1));
        assert_eq!(days[0].date, date(2024, 7, 1));
    }

    #[test]
    fn test_month_range_covers_every_day_exactly_once() {
        let days = build_days_range(ViewMode::Month, date(2024, 2, 15));
        // 2024 is a leap year.
        assert_eq!(days.len(), 29);
        assert_eq!(days[0].date, date(2024, 2, 1));
        assert_eq!(days[28].date, date(2024, 2, 29));
        for pair in days.windows(2) {
            assert_eq!(pair[1].date, pair[0].date + Duration::days(1));
        }
    }

    #[test]
    fn test_month_week_index_increments_only_at_mondays() {
        // July 2024 starts on a Monday.
        let days = build_days_range(ViewMode::Month, date(2024, 7, 10));
        assert_eq!(days[0].week_index, 0);
        assert_eq!(days[6].week_index, 0); // Sun 07.07
        assert_eq!(days[7].week_index, 1); // Mon 08.07
        assert_eq!(days[30].week_index, 4); // Wed 31.07
        for pair in days.windows(2) {
            assert!(pair[1].week_index >= pair[0].week_index);
            let bumped = pair[1].week_index == pair[0].week_index + 1;
            if bumped {
                assert_eq!(pair[1].date.weekday(), Weekday::Mon);
            }
        }
    }

    #[test]
    fn test_month_starting_midweek_keeps_index_zero_until_first_monday() {
        // September 2024 starts on a Sunday.
        let days = build_days_range(ViewMode::Month, date(2024, 9, 1));
        assert_eq!(days[0].week_index, 0); // Sun 01.09
        assert_eq!(days[1].week_index, 1); // Mon 02.09
    }

    #[test]
    fn test_previous_period_bounds_week() {
        let (start, end) = previous_period_bounds(ViewMode::Week, date(2024, 7, 4));
        assert_eq!(start, date(2024, 6, 24));
        assert_eq!(end, date(2024, 6, 30));
    }

    #[test]
    fn test_previous_period_bounds_month_across_year() {
        let (start, end) = previous_period_bounds(ViewMode::Month, date(2024, 1, 15));
        assert_eq!(start, date(2023, 12, 1));
        assert_eq!(end, date(2023, 12, 31));
    }

    #[test]
    fn test_period_labels() {
        assert_eq!(
            format_period_label(ViewMode::Week, date(2024, 7, 1), date(2024, 7, 7)),
            "01.07-07.07.2024"
        );
        assert_eq!(
            format_period_label(ViewMode::Month, date(2024, 7, 1), date(2024, 7, 31)),
            "July 2024"
        );
    }

    #[test]
    fn test_days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(date(2024, 2, 10)), 29);
        assert_eq!(days_in_month(date(2023, 2, 10)), 28);
        assert_eq!(days_in_month(date(2024, 12, 31)), 31);
    }
}
