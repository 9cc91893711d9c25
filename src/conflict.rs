//! Cross-branch shift conflict detection.
//!
//! A candidate window conflicts when it overlaps an existing assignment of
//! the same employee, on the same date, at a *different* branch. Overlap is
//! half-open on minute-of-day values: adjacent windows (one ending exactly
//! when the other starts) do not conflict. Both windows are compared as
//! same-day minute ranges; overnight wraparound is not considered here.
//!
//! The check is advisory — it gates saves, but there is no store-level
//! exclusion constraint across branches (see DESIGN.md).

use chrono::NaiveTime;
use chrono::Timelike;
use serde::Serialize;

use crate::db::ScheduleDb;
use crate::error::ScheduleError;

pub const MINUTES_PER_DAY: i64 = 1440;

/// Parse an `"HH:MM"` time of day into minute-of-day `[0, 1440)`.
pub fn parse_hhmm(value: &str) -> Result<i64, ScheduleError> {
    let time = NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(value.to_string()))?;
    Ok(time.hour() as i64 * 60 + time.minute() as i64)
}

/// Total worked minutes between two times of day, supporting shifts that
/// wrap past midnight: `end - start` when `end >= start`, otherwise
/// `(24h - start) + end`. Result is always in `[0, 1440)`.
pub fn total_minutes(start_min: i64, end_min: i64) -> i64 {
    if end_min >= start_min {
        end_min - start_min
    } else {
        (MINUTES_PER_DAY - start_min) + end_min
    }
}

/// Half-open interval overlap on minute-of-day values.
pub fn windows_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    !(a_end <= b_start || a_start >= b_end)
}

/// Details of a detected conflict, reported back to the caller so the UI
/// can explain which assignment is in the way and from when the employee
/// is free.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftConflict {
    pub branch_id: String,
    pub branch_name: String,
    pub start_time: String,
    pub end_time: String,
    /// End of the conflicting shift — the employee is free from here.
    pub free_from: String,
}

/// Check a candidate window against the employee's other-branch shifts on
/// `date`. Returns the first overlap found, or `None` when the window is
/// free. Pure query + comparison; no side effects.
pub fn check_shift_conflict(
    db: &ScheduleDb,
    employee_id: &str,
    date: &str,
    start_time: &str,
    end_time: &str,
    excluding_branch: &str,
) -> Result<Option<ShiftConflict>, ScheduleError> {
    let new_start = parse_hhmm(start_time)?;
    let new_end = parse_hhmm(end_time)?;

    for existing in db.shifts_for_employee_on_date(employee_id, date)? {
        if existing.branch_id == excluding_branch {
            continue;
        }
        let existing_start = parse_hhmm(&existing.start_time)?;
        let existing_end = parse_hhmm(&existing.end_time)?;
        if windows_overlap(new_start, new_end, existing_start, existing_end) {
            let branch_name = db
                .branch_name(&existing.branch_id)?
                .unwrap_or_else(|| existing.branch_id.clone());
            return Ok(Some(ShiftConflict {
                branch_id: existing.branch_id.clone(),
                branch_name,
                start_time: existing.start_time.clone(),
                end_time: existing.end_time.clone(),
                free_from: existing.end_time,
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("00:00").expect("parse"), 0);
        assert_eq!(parse_hhmm("09:30").expect("parse"), 570);
        assert_eq!(parse_hhmm("23:59").expect("parse"), 1439);
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("9am").is_err());
    }

    #[test]
    fn test_total_minutes_same_day() {
        assert_eq!(total_minutes(540, 1080), 540); // 09:00-18:00
        assert_eq!(total_minutes(0, 1439), 1439);
        assert_eq!(total_minutes(600, 600), 0);
    }

    #[test]
    fn test_total_minutes_wraps_past_midnight() {
        // 22:00-06:00 = 2h + 6h
        assert_eq!(total_minutes(1320, 360), 480);
        // 23:59-00:00
        assert_eq!(total_minutes(1439, 0), 1);
    }

    #[test]
    fn test_total_minutes_always_below_one_day() {
        for start in (0..MINUTES_PER_DAY).step_by(17) {
            for end in (0..MINUTES_PER_DAY).step_by(23) {
                let total = total_minutes(start, end);
                assert!((0..MINUTES_PER_DAY).contains(&total));
            }
        }
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let cases = [
            (540, 1080, 1020, 1320, true),  // 09-18 vs 17-22
            (540, 1080, 1080, 1320, false), // adjacent: 09-18 vs 18-22
            (540, 600, 600, 660, false),
            (540, 1080, 560, 570, true), // contained
        ];
        for (a_start, a_end, b_start, b_end, expected) in cases {
            assert_eq!(windows_overlap(a_start, a_end, b_start, b_end), expected);
            assert_eq!(windows_overlap(b_start, b_end, a_start, a_end), expected);
        }
    }
}
