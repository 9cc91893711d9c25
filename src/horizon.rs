//! Horizon coverage checks.
//!
//! A branch is "covered" when every day of the inclusive window
//! `[today, today + planning_horizon_days]` — today in the partner's
//! timezone — has at least `min_staff_per_day` assigned shifts. The window
//! is anchored to today, never to the viewed range, so scrolling the
//! schedule back a month does not silence a staffing gap next week.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::db::ScheduleDb;
use crate::error::ScheduleError;
use crate::period::DayColumn;
use crate::settings::PartnerSettings;
use crate::types::Branch;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonCoverage {
    pub branch_id: String,
    pub is_covered: bool,
    /// End of the horizon window: the date through which staffing is
    /// required.
    pub required_date: String,
    /// Every unfilled date inside the horizon, ascending.
    pub unfilled_days: Vec<String>,
}

/// Scan `[today, today + horizon]` for days where the branch's assigned
/// shift count falls short of its minimum staffing. Branches with
/// `min_staff_per_day = 0` are trivially covered.
pub fn check_horizon_coverage(
    db: &ScheduleDb,
    settings: &PartnerSettings,
    branch: &Branch,
    now: DateTime<Utc>,
) -> Result<HorizonCoverage, ScheduleError> {
    let today = settings.today(now);
    let horizon_end = today + Duration::days(settings.planning_horizon_days);

    if branch.min_staff_per_day <= 0 {
        return Ok(HorizonCoverage {
            branch_id: branch.id.clone(),
            is_covered: true,
            required_date: horizon_end.to_string(),
            unfilled_days: Vec::new(),
        });
    }

    let unfilled_days = unfilled_between(db, branch, today, horizon_end)?;

    Ok(HorizonCoverage {
        branch_id: branch.id.clone(),
        is_covered: unfilled_days.is_empty(),
        required_date: horizon_end.to_string(),
        unfilled_days,
    })
}

/// Staffing problems inside the visible range, independent of the horizon
/// window. Returns the understaffed dates, ascending.
pub fn check_branch_problems(
    db: &ScheduleDb,
    branch: &Branch,
    days: &[DayColumn],
) -> Result<Vec<String>, ScheduleError> {
    if branch.min_staff_per_day <= 0 {
        return Ok(Vec::new());
    }
    let (first, last) = match (days.first(), days.last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => return Ok(Vec::new()),
    };
    unfilled_between(db, branch, first, last)
}

fn unfilled_between(
    db: &ScheduleDb,
    branch: &Branch,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<String>, ScheduleError> {
    let counts =
        db.count_assigned_by_date(&branch.id, &start.to_string(), &end.to_string())?;

    let mut unfilled = Vec::new();
    let mut day = start;
    while day <= end {
        let key = day.to_string();
        if counts.get(&key).copied().unwrap_or(0) < branch.min_staff_per_day {
            unfilled.push(key);
        }
        day += Duration::days(1);
    }
    Ok(unfilled)
}
