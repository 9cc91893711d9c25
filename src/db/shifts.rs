use std::collections::HashMap;

use rusqlite::params;

use super::*;
use crate::types::{AttendanceStatus, ConfirmationStatus, ResponsibleDecision, Shift, ShiftStatus};

impl ScheduleDb {
    // =========================================================================
    // Shifts — reads
    // =========================================================================

    /// All of a partner's shifts with `date` in the inclusive range.
    pub fn shifts_in_range(
        &self,
        partner_id: &str,
        date_start: &str,
        date_end: &str,
    ) -> Result<Vec<Shift>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts
             WHERE partner_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, start_time"
        ))?;
        let rows = stmt.query_map(params![partner_id, date_start, date_end], map_shift_row)?;

        let mut shifts = Vec::new();
        for row in rows {
            shifts.push(row?);
        }
        Ok(shifts)
    }

    /// A branch's shifts with `date` in the inclusive range.
    pub fn shifts_for_branch_in_range(
        &self,
        branch_id: &str,
        date_start: &str,
        date_end: &str,
    ) -> Result<Vec<Shift>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts
             WHERE branch_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, start_time"
        ))?;
        let rows = stmt.query_map(params![branch_id, date_start, date_end], map_shift_row)?;

        let mut shifts = Vec::new();
        for row in rows {
            shifts.push(row?);
        }
        Ok(shifts)
    }

    /// The employee's shifts on a single date, across all branches.
    pub fn shifts_for_employee_on_date(
        &self,
        employee_id: &str,
        date: &str,
    ) -> Result<Vec<Shift>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts
             WHERE employee_id = ?1 AND date = ?2
             ORDER BY start_time"
        ))?;
        let rows = stmt.query_map(params![employee_id, date], map_shift_row)?;

        let mut shifts = Vec::new();
        for row in rows {
            shifts.push(row?);
        }
        Ok(shifts)
    }

    /// All of a partner's shifts on a single date. Used by the attendance
    /// sweeps.
    pub fn shifts_on_date(&self, partner_id: &str, date: &str) -> Result<Vec<Shift>, DbError> {
        self.shifts_in_range(partner_id, date, date)
    }

    /// Look up the unique shift for (employee, branch, date).
    pub fn get_shift(
        &self,
        employee_id: &str,
        branch_id: &str,
        date: &str,
    ) -> Result<Option<Shift>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts
             WHERE employee_id = ?1 AND branch_id = ?2 AND date = ?3"
        ))?;
        let mut rows = stmt.query_map(params![employee_id, branch_id, date], map_shift_row)?;
        match rows.next() {
            Some(Ok(shift)) => Ok(Some(shift)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    pub fn get_shift_by_id(&self, id: &str) -> Result<Option<Shift>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], map_shift_row)?;
        match rows.next() {
            Some(Ok(shift)) => Ok(Some(shift)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    /// Count of assigned shifts per date at a branch, keyed by `"YYYY-MM-DD"`.
    /// Unassigned rows (employee cleared by an accepted cancellation) do not
    /// count toward staffing.
    pub fn count_assigned_by_date(
        &self,
        branch_id: &str,
        date_start: &str,
        date_end: &str,
    ) -> Result<HashMap<String, i64>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, COUNT(*) FROM shifts
             WHERE branch_id = ?1 AND date >= ?2 AND date <= ?3
               AND employee_id IS NOT NULL
             GROUP BY date",
        )?;
        let rows = stmt.query_map(params![branch_id, date_start, date_end], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (date, count) = row?;
            counts.insert(date, count);
        }
        Ok(counts)
    }

    // =========================================================================
    // Shifts — writes
    // =========================================================================

    /// Insert a full shift row. A violation of the (employee, branch, date)
    /// composite surfaces as `DbError::UniqueViolation`.
    pub fn insert_shift(&self, shift: &Shift) -> Result<(), DbError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO shifts ({SHIFT_COLUMNS}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                      ?31, ?32, ?33, ?34, ?35, ?36)"
                ),
                params![
                    shift.id,
                    shift.partner_id,
                    shift.branch_id,
                    shift.employee_id,
                    shift.position_id,
                    shift.period_id,
                    shift.date,
                    shift.start_time,
                    shift.end_time,
                    shift.total_minutes,
                    shift.status,
                    shift.attendance_status,
                    shift.confirmation_status,
                    shift.actual_start_at,
                    shift.actual_end_at,
                    shift.no_show_at,
                    shift.confirmed_at,
                    shift.declined_at,
                    shift.decided_at,
                    shift.early_leave_at,
                    shift.late_minutes,
                    shift.early_leave_minutes,
                    shift.early_leave_reset,
                    shift.decline_reason,
                    shift.no_show_reason_text,
                    shift.no_show_reason_status,
                    shift.no_show_approved_by,
                    shift.no_show_approved_at,
                    shift.no_show_rejected_by,
                    shift.no_show_rejected_at,
                    shift.responsible_decision,
                    shift.decided_by_responsible_id,
                    shift.is_replacement,
                    shift.replacement_status,
                    shift.reminder_before_sent_at,
                    shift.reminder_late_sent_at,
                ],
            )
            .map_err(DbError::from_sqlite)?;
        Ok(())
    }

    /// Update the time window and derived minutes of an existing shift.
    pub fn update_shift_times(
        &self,
        id: &str,
        start_time: &str,
        end_time: &str,
        total_minutes: i64,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET start_time = ?1, end_time = ?2, total_minutes = ?3
             WHERE id = ?4",
            params![start_time, end_time, total_minutes, id],
        )?;
        Ok(())
    }

    /// Clear stale pre-shift markers after a time edit on a shift that has
    /// not started: attendance placeholder, no-show stamp, late minutes and
    /// both reminder-sent timestamps.
    pub fn reset_unstarted_markers(&self, id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET attendance_status = NULL,
                 no_show_at = NULL,
                 late_minutes = NULL,
                 reminder_before_sent_at = NULL,
                 reminder_late_sent_at = NULL
             WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Delete a shift row. Returns true when a row was removed.
    pub fn delete_shift(&self, id: &str) -> Result<bool, DbError> {
        let affected = self
            .conn
            .execute("DELETE FROM shifts WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // =========================================================================
    // Shifts — confirmation and attendance column updates
    // =========================================================================

    pub fn set_confirmed(&self, id: &str, confirmed_at: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET confirmation_status = ?1, confirmed_at = ?2
             WHERE id = ?3",
            params![ConfirmationStatus::Confirmed, confirmed_at, id],
        )?;
        Ok(())
    }

    pub fn set_declined(
        &self,
        id: &str,
        status: ConfirmationStatus,
        reason: Option<&str>,
        declined_at: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET confirmation_status = ?1, decline_reason = ?2, declined_at = ?3
             WHERE id = ?4",
            params![status, reason, declined_at, id],
        )?;
        Ok(())
    }

    /// Accepted cancellation: shift becomes declined and the employee is
    /// unassigned. The decline reason is kept.
    pub fn apply_accept_cancellation(
        &self,
        id: &str,
        responsible_id: &str,
        decided_at: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET confirmation_status = ?1,
                 employee_id = NULL,
                 responsible_decision = ?2,
                 decided_by_responsible_id = ?3,
                 decided_at = ?4
             WHERE id = ?5",
            params![
                ConfirmationStatus::Declined,
                ResponsibleDecision::ApprovedCancel,
                responsible_id,
                decided_at,
                id
            ],
        )?;
        Ok(())
    }

    /// Rejected cancellation: shift reverts to confirmed and the decline
    /// fields are explicitly cleared.
    pub fn apply_reject_cancellation(
        &self,
        id: &str,
        responsible_id: &str,
        decided_at: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET confirmation_status = ?1,
                 declined_at = NULL,
                 decline_reason = NULL,
                 responsible_decision = ?2,
                 decided_by_responsible_id = ?3,
                 decided_at = ?4
             WHERE id = ?5",
            params![
                ConfirmationStatus::Confirmed,
                ResponsibleDecision::RejectedCancel,
                responsible_id,
                decided_at,
                id
            ],
        )?;
        Ok(())
    }

    pub fn apply_open(
        &self,
        id: &str,
        actual_start_at: &str,
        attendance: AttendanceStatus,
        late_minutes: i64,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET status = ?1, attendance_status = ?2, actual_start_at = ?3, late_minutes = ?4
             WHERE id = ?5",
            params![
                ShiftStatus::Opened,
                attendance,
                actual_start_at,
                late_minutes,
                id
            ],
        )?;
        Ok(())
    }

    pub fn apply_close(
        &self,
        id: &str,
        actual_end_at: &str,
        early_leave_minutes: Option<i64>,
        early_leave_at: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET status = ?1, attendance_status = ?2, actual_end_at = ?3,
                 early_leave_minutes = ?4, early_leave_at = ?5
             WHERE id = ?6",
            params![
                ShiftStatus::Closed,
                AttendanceStatus::Closed,
                actual_end_at,
                early_leave_minutes,
                early_leave_at,
                id
            ],
        )?;
        Ok(())
    }

    pub fn apply_no_show(&self, id: &str, no_show_at: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET attendance_status = ?1, no_show_at = ?2
             WHERE id = ?3",
            params![AttendanceStatus::NoShow, no_show_at, id],
        )?;
        Ok(())
    }

    pub fn set_no_show_reason(&self, id: &str, reason_text: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET no_show_reason_text = ?1, no_show_reason_status = ?2
             WHERE id = ?3",
            params![reason_text, crate::types::NoShowReasonStatus::Pending, id],
        )?;
        Ok(())
    }

    /// Record a no-show reason decision. Approval and rejection are
    /// mutually exclusive: the losing side's identity and timestamp are
    /// cleared on every change.
    pub fn apply_no_show_decision(
        &self,
        id: &str,
        approved: bool,
        responsible_id: &str,
        decided_at: &str,
    ) -> Result<(), DbError> {
        if approved {
            self.conn.execute(
                "UPDATE shifts
                 SET no_show_reason_status = ?1,
                     no_show_approved_by = ?2,
                     no_show_approved_at = ?3,
                     no_show_rejected_by = NULL,
                     no_show_rejected_at = NULL
                 WHERE id = ?4",
                params![
                    crate::types::NoShowReasonStatus::Approved,
                    responsible_id,
                    decided_at,
                    id
                ],
            )?;
        } else {
            self.conn.execute(
                "UPDATE shifts
                 SET no_show_reason_status = ?1,
                     no_show_rejected_by = ?2,
                     no_show_rejected_at = ?3,
                     no_show_approved_by = NULL,
                     no_show_approved_at = NULL
                 WHERE id = ?4",
                params![
                    crate::types::NoShowReasonStatus::Rejected,
                    responsible_id,
                    decided_at,
                    id
                ],
            )?;
        }
        Ok(())
    }

    pub fn set_reminder_before_sent(&self, id: &str, sent_at: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts SET reminder_before_sent_at = ?1 WHERE id = ?2",
            params![sent_at, id],
        )?;
        Ok(())
    }

    pub fn set_reminder_late_sent(&self, id: &str, sent_at: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts SET reminder_late_sent_at = ?1 WHERE id = ?2",
            params![sent_at, id],
        )?;
        Ok(())
    }

    /// Flag an early-leave annotation as reset and clear its measurement.
    pub fn apply_early_leave_reset(&self, id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE shifts
             SET early_leave_reset = 1, early_leave_minutes = NULL, early_leave_at = NULL
             WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Work segments
    // =========================================================================

    pub fn open_work_segment(&self, shift_id: &str, started_at: &str) -> Result<String, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO work_segments (id, shift_id, started_at) VALUES (?1, ?2, ?3)",
            params![id, shift_id, started_at],
        )?;
        Ok(id)
    }

    /// Set `ended_at` on every open segment of a shift. Returns how many
    /// segments were closed.
    pub fn close_open_segments(&self, shift_id: &str, ended_at: &str) -> Result<usize, DbError> {
        let affected = self.conn.execute(
            "UPDATE work_segments
             SET ended_at = ?1
             WHERE shift_id = ?2 AND ended_at IS NULL",
            params![ended_at, shift_id],
        )?;
        Ok(affected)
    }

    pub fn open_segment_count(&self, shift_id: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM work_segments WHERE shift_id = ?1 AND ended_at IS NULL",
            params![shift_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
