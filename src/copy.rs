//! Period-copy engine.
//!
//! Duplicates a branch's previous-period schedule into the current view:
//! week shifts move forward exactly 7 days, month shifts keep their
//! day-of-month clamped to the target month's length. Existing slots and
//! dismissed employees are skipped; the remainder is inserted as one
//! batch of fresh `scheduled`/`pending` rows so a half-copied grid never
//! becomes visible.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::ScheduleError;
use crate::period;
use crate::store::{ShiftStore, StoreOp};
use crate::types::{ConfirmationStatus, Employee, Shift, ShiftStatus, ViewMode};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReport {
    pub shifts_copied: usize,
    /// Distinct employees whose shifts were copied.
    pub employees: usize,
}

#[derive(Debug, Clone)]
pub enum CopyOutcome {
    Copied(CopyReport),
    /// The previous period has no assigned shifts at this branch.
    NothingToCopy,
    /// Every copyable slot already has a shift in the current period.
    AllSlotsOccupied,
}

/// Copy the branch's assigned shifts from the previous period into the
/// currently viewed one. Requires an active period (see
/// `ShiftStore::ensure_period_for_view`).
pub fn copy_from_previous_period(
    store: &ShiftStore,
    branch_id: &str,
    mode: ViewMode,
    anchor: NaiveDate,
) -> Result<CopyOutcome, ScheduleError> {
    let period_id = store
        .current_period_id()
        .ok_or(ScheduleError::MissingPeriod)?
        .to_string();

    let (view_start, view_end) = period::period_bounds(mode, anchor);
    let (prev_start, prev_end) = period::previous_period_bounds(mode, anchor);

    let source: Vec<Shift> = store
        .db()
        .shifts_for_branch_in_range(branch_id, &prev_start.to_string(), &prev_end.to_string())?
        .into_iter()
        .filter(|s| s.employee_id.is_some())
        .collect();
    if source.is_empty() {
        return Ok(CopyOutcome::NothingToCopy);
    }

    let mut employee_cache: HashMap<String, Option<Employee>> = HashMap::new();
    let mut claimed: HashSet<(String, String)> = HashSet::new();
    let mut batch = Vec::new();

    for src in &source {
        let employee_id = src.employee_id.clone().unwrap_or_default();
        let src_date = NaiveDate::parse_from_str(&src.date, "%Y-%m-%d")
            .map_err(|_| ScheduleError::InvalidDate(src.date.clone()))?;

        let target = match remap_date(mode, src_date, view_start) {
            Some(target) => target,
            None => continue,
        };
        if target < view_start || target > view_end {
            continue;
        }

        let employee = match employee_cache.entry(employee_id.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(store.db().get_employee(&employee_id)?)
            }
        };
        match employee {
            Some(employee) if !employee.is_dismissed_for(target) => {}
            _ => continue,
        }

        let target_str = target.to_string();
        if store
            .db()
            .get_shift(&employee_id, branch_id, &target_str)?
            .is_some()
        {
            continue;
        }
        // Month clamping can map two source dates onto one target day;
        // the first source shift wins the slot.
        if !claimed.insert((employee_id.clone(), target_str.clone())) {
            continue;
        }

        batch.push(Shift {
            id: uuid::Uuid::new_v4().to_string(),
            partner_id: src.partner_id.clone(),
            branch_id: branch_id.to_string(),
            employee_id: Some(employee_id),
            position_id: src.position_id.clone(),
            period_id: Some(period_id.clone()),
            date: target_str,
            start_time: src.start_time.clone(),
            end_time: src.end_time.clone(),
            total_minutes: src.total_minutes,
            status: ShiftStatus::Scheduled,
            attendance_status: None,
            confirmation_status: Some(ConfirmationStatus::Pending),
            actual_start_at: None,
            actual_end_at: None,
            no_show_at: None,
            confirmed_at: None,
            declined_at: None,
            decided_at: None,
            early_leave_at: None,
            late_minutes: None,
            early_leave_minutes: None,
            early_leave_reset: false,
            decline_reason: None,
            no_show_reason_text: None,
            no_show_reason_status: None,
            no_show_approved_by: None,
            no_show_approved_at: None,
            no_show_rejected_by: None,
            no_show_rejected_at: None,
            responsible_decision: None,
            decided_by_responsible_id: None,
            is_replacement: false,
            replacement_status: None,
            reminder_before_sent_at: None,
            reminder_late_sent_at: None,
        });
    }

    if batch.is_empty() {
        return Ok(CopyOutcome::AllSlotsOccupied);
    }

    store.db().with_transaction(|db| {
        for shift in &batch {
            db.insert_shift(shift)?;
        }
        Ok(())
    })?;

    let employees: HashSet<&str> = batch
        .iter()
        .filter_map(|s| s.employee_id.as_deref())
        .collect();
    for shift in &batch {
        store.emit("shifts", StoreOp::Insert, &shift.id);
    }
    log::info!(
        "Copied {} shift(s) for {} employee(s) into branch {}",
        batch.len(),
        employees.len(),
        branch_id
    );

    Ok(CopyOutcome::Copied(CopyReport {
        shifts_copied: batch.len(),
        employees: employees.len(),
    }))
}

/// Delete an employee's shifts at a branch within the viewed range.
/// Returns how many shifts were removed.
pub fn remove_employee_from_branch(
    store: &ShiftStore,
    employee_id: &str,
    branch_id: &str,
    mode: ViewMode,
    anchor: NaiveDate,
) -> Result<usize, ScheduleError> {
    let (view_start, view_end) = period::period_bounds(mode, anchor);
    let shifts = store.db().shifts_for_branch_in_range(
        branch_id,
        &view_start.to_string(),
        &view_end.to_string(),
    )?;

    let mut removed = 0;
    for shift in shifts {
        if shift.employee_id.as_deref() != Some(employee_id) {
            continue;
        }
        let date = NaiveDate::parse_from_str(&shift.date, "%Y-%m-%d")
            .map_err(|_| ScheduleError::InvalidDate(shift.date.clone()))?;
        if store.clear_shift(employee_id, branch_id, date)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Map a source-period date to its slot in the target period: +7 days for
/// week mode, same day-of-month clamped to the target month for month
/// mode.
fn remap_date(mode: ViewMode, src: NaiveDate, view_start: NaiveDate) -> Option<NaiveDate> {
    match mode {
        ViewMode::Week => Some(src + Duration::days(7)),
        ViewMode::Month => {
            let day = src.day().min(period::days_in_month(view_start));
            NaiveDate::from_ymd_opt(view_start.year(), view_start.month(), day)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ScheduleDb;
    use crate::settings::{PartnerSettings, SettingsHandle};
    use crate::types::{Branch, EmploymentStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn seed_employee(db: &ScheduleDb, id: &str, first: &str) -> Employee {
        let employee = Employee {
            id: id.to_string(),
            partner_id: "p1".to_string(),
            first_name: first.to_string(),
            last_name: "Orlova".to_string(),
            position_id: None,
            status: EmploymentStatus::Working,
            dismissal_date: None,
            active: true,
            photo_ref: None,
            telegram_chat_id: None,
        };
        db.insert_employee(&employee).expect("insert employee");
        employee
    }

    fn test_store() -> ShiftStore {
        let db = ScheduleDb::open_in_memory().expect("open db");
        db.insert_branch(&Branch {
            id: "branch-a".to_string(),
            partner_id: "p1".to_string(),
            name: "Branch A".to_string(),
            display_order: None,
            min_staff_per_day: 0,
        })
        .expect("insert branch");
        let settings = SettingsHandle::new(PartnerSettings::new("p1"));
        ShiftStore::new(db, settings).0
    }

    /// Seed a shift directly into a source period, bypassing the store
    /// guards.
    fn seed_period_shift(
        store: &mut ShiftStore,
        employee: &Employee,
        mode: ViewMode,
        on: NaiveDate,
        start: &str,
        end: &str,
    ) {
        store.ensure_period_for_view(mode, on).expect("period");
        store
            .save_shift(employee, "branch-a", None, on, start, end)
            .expect("save");
    }

    #[test]
    fn test_week_copy_moves_shifts_seven_days_forward() {
        let mut store = test_store();
        let anna = seed_employee(store.db(), "emp-anna", "Anna");
        let boris = seed_employee(store.db(), "emp-boris", "Boris");

        seed_period_shift(&mut store, &anna, ViewMode::Week, date(2024, 7, 1), "09:00", "18:00");
        seed_period_shift(&mut store, &boris, ViewMode::Week, date(2024, 7, 3), "12:00", "20:00");

        let anchor = date(2024, 7, 8);
        store
            .ensure_period_for_view(ViewMode::Week, anchor)
            .expect("period");
        let outcome =
            copy_from_previous_period(&store, "branch-a", ViewMode::Week, anchor).expect("copy");

        match outcome {
            CopyOutcome::Copied(report) => {
                assert_eq!(report.shifts_copied, 2);
                assert_eq!(report.employees, 2);
            }
            other => panic!("expected Copied, got {:?}", other),
        }

        let copied = store
            .db()
            .get_shift("emp-anna", "branch-a", "2024-07-08")
            .expect("lookup")
            .expect("copied shift");
        assert_eq!(copied.start_time, "09:00");
        assert_eq!(copied.status, ShiftStatus::Scheduled);
        assert_eq!(
            copied.confirmation_status,
            Some(ConfirmationStatus::Pending)
        );
        assert!(store
            .db()
            .get_shift("emp-boris", "branch-a", "2024-07-10")
            .expect("lookup")
            .is_some());
    }

    #[test]
    fn test_copy_is_idempotent() {
        let mut store = test_store();
        let anna = seed_employee(store.db(), "emp-anna", "Anna");
        seed_period_shift(&mut store, &anna, ViewMode::Week, date(2024, 7, 1), "09:00", "18:00");

        let anchor = date(2024, 7, 8);
        store
            .ensure_period_for_view(ViewMode::Week, anchor)
            .expect("period");

        assert!(matches!(
            copy_from_previous_period(&store, "branch-a", ViewMode::Week, anchor).expect("copy"),
            CopyOutcome::Copied(_)
        ));
        // Second run finds every slot taken and inserts nothing.
        assert!(matches!(
            copy_from_previous_period(&store, "branch-a", ViewMode::Week, anchor).expect("copy"),
            CopyOutcome::AllSlotsOccupied
        ));

        let total: i64 = store
            .db()
            .conn_ref()
            .query_row(
                "SELECT COUNT(*) FROM shifts WHERE date = '2024-07-08'",
                [],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(total, 1);
    }

    #[test]
    fn test_month_copy_clamps_day_of_month() {
        let mut store = test_store();
        let anna = seed_employee(store.db(), "emp-anna", "Anna");

        // March 31st has no counterpart in April; it lands on the 30th.
        seed_period_shift(&mut store, &anna, ViewMode::Month, date(2024, 3, 31), "09:00", "18:00");

        let anchor = date(2024, 4, 10);
        store
            .ensure_period_for_view(ViewMode::Month, anchor)
            .expect("period");
        let outcome =
            copy_from_previous_period(&store, "branch-a", ViewMode::Month, anchor).expect("copy");
        assert!(matches!(outcome, CopyOutcome::Copied(_)));

        assert!(store
            .db()
            .get_shift("emp-anna", "branch-a", "2024-04-30")
            .expect("lookup")
            .is_some());
    }

    #[test]
    fn test_month_clamp_collision_keeps_one_shift() {
        let mut store = test_store();
        let anna = seed_employee(store.db(), "emp-anna", "Anna");

        // Jan 30 and Jan 31 both clamp to Feb 29 in a leap year; only the
        // first claims the slot.
        seed_period_shift(&mut store, &anna, ViewMode::Month, date(2024, 1, 30), "09:00", "18:00");
        seed_period_shift(&mut store, &anna, ViewMode::Month, date(2024, 1, 31), "10:00", "19:00");

        let anchor = date(2024, 2, 15);
        store
            .ensure_period_for_view(ViewMode::Month, anchor)
            .expect("period");
        let outcome =
            copy_from_previous_period(&store, "branch-a", ViewMode::Month, anchor).expect("copy");
        match outcome {
            CopyOutcome::Copied(report) => assert_eq!(report.shifts_copied, 1),
            other => panic!("expected Copied, got {:?}", other),
        }
        let copied = store
            .db()
            .get_shift("emp-anna", "branch-a", "2024-02-29")
            .expect("lookup")
            .expect("shift");
        assert_eq!(copied.start_time, "09:00");
    }

    #[test]
    fn test_copy_skips_dismissed_employees() {
        let mut store = test_store();
        let anna = seed_employee(store.db(), "emp-anna", "Anna");
        let boris = seed_employee(store.db(), "emp-boris", "Boris");

        seed_period_shift(&mut store, &anna, ViewMode::Week, date(2024, 7, 1), "09:00", "18:00");
        seed_period_shift(&mut store, &boris, ViewMode::Week, date(2024, 7, 2), "09:00", "18:00");

        // Boris leaves before the target week.
        store
            .db()
            .conn_ref()
            .execute(
                "UPDATE employees SET status = 'pending_dismissal', dismissal_date = '2024-07-08'
                 WHERE id = 'emp-boris'",
                [],
            )
            .expect("update");

        let anchor = date(2024, 7, 8);
        store
            .ensure_period_for_view(ViewMode::Week, anchor)
            .expect("period");
        let outcome =
            copy_from_previous_period(&store, "branch-a", ViewMode::Week, anchor).expect("copy");
        match outcome {
            CopyOutcome::Copied(report) => {
                assert_eq!(report.shifts_copied, 1);
                assert_eq!(report.employees, 1);
            }
            other => panic!("expected Copied, got {:?}", other),
        }
        assert!(store
            .db()
            .get_shift("emp-boris", "branch-a", "2024-07-09")
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn test_copy_with_empty_previous_period_reports_nothing() {
        let mut store = test_store();
        let anchor = date(2024, 7, 8);
        store
            .ensure_period_for_view(ViewMode::Week, anchor)
            .expect("period");
        assert!(matches!(
            copy_from_previous_period(&store, "branch-a", ViewMode::Week, anchor).expect("copy"),
            CopyOutcome::NothingToCopy
        ));
    }

    #[test]
    fn test_copy_requires_active_period() {
        let store = test_store();
        assert!(matches!(
            copy_from_previous_period(&store, "branch-a", ViewMode::Week, date(2024, 7, 8)),
            Err(ScheduleError::MissingPeriod)
        ));
    }

    #[test]
    fn test_remove_employee_from_branch_scopes_to_view_range() {
        let mut store = test_store();
        let anna = seed_employee(store.db(), "emp-anna", "Anna");
        let boris = seed_employee(store.db(), "emp-boris", "Boris");

        seed_period_shift(&mut store, &anna, ViewMode::Week, date(2024, 7, 1), "09:00", "18:00");
        seed_period_shift(&mut store, &anna, ViewMode::Week, date(2024, 7, 3), "09:00", "18:00");
        seed_period_shift(&mut store, &boris, ViewMode::Week, date(2024, 7, 1), "12:00", "20:00");
        // Outside the viewed week.
        seed_period_shift(&mut store, &anna, ViewMode::Week, date(2024, 7, 10), "09:00", "18:00");

        let removed = remove_employee_from_branch(
            &store,
            "emp-anna",
            "branch-a",
            ViewMode::Week,
            date(2024, 7, 1),
        )
        .expect("remove");
        assert_eq!(removed, 2);

        assert!(store
            .db()
            .get_shift("emp-boris", "branch-a", "2024-07-01")
            .expect("lookup")
            .is_some());
        assert!(store
            .db()
            .get_shift("emp-anna", "branch-a", "2024-07-10")
            .expect("lookup")
            .is_some());
    }
}
