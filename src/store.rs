//! Shift store adapter.
//!
//! Every mutation runs its sub-steps strictly in sequence: validate,
//! conflict-check, compute minutes, mutate the store, then let the caller
//! reload. Mutations emit a `StoreEvent` on the session channel so other
//! consumers can pick up out-of-band changes and resynchronize from the
//! source of truth instead of merging partial state.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::mpsc;

use crate::attendance::{NO_SHOW_ALERT_CONTEXT, NO_SHOW_DECISION_CONTEXT};
use crate::conflict;
use crate::db::{DbError, ScheduleDb};
use crate::error::ScheduleError;
use crate::period;
use crate::settings::SettingsHandle;
use crate::types::{
    AttendanceStatus, ConfirmationStatus, Employee, Shift, ShiftStatus, ViewMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Insert,
    Update,
    Delete,
}

/// Change notification emitted after a successful mutation.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub table: &'static str,
    pub op: StoreOp,
    pub row_id: String,
}

pub struct ShiftStore {
    db: ScheduleDb,
    settings: SettingsHandle,
    events: mpsc::UnboundedSender<StoreEvent>,
    current_period_id: Option<String>,
}

impl ShiftStore {
    /// Build a store around an opened database. Returns the receiving end
    /// of the change-event channel for the session to drain.
    pub fn new(
        db: ScheduleDb,
        settings: SettingsHandle,
    ) -> (Self, mpsc::UnboundedReceiver<StoreEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                db,
                settings,
                events,
                current_period_id: None,
            },
            receiver,
        )
    }

    pub fn db(&self) -> &ScheduleDb {
        &self.db
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn current_period_id(&self) -> Option<&str> {
        self.current_period_id.as_deref()
    }

    pub(crate) fn emit(&self, table: &'static str, op: StoreOp, row_id: &str) {
        let _ = self.events.send(StoreEvent {
            table,
            op,
            row_id: row_id.to_string(),
        });
    }

    /// Get-or-create the schedule period for the viewed range and make it
    /// the current one. Must run before any shift insert.
    pub fn ensure_period_for_view(
        &mut self,
        mode: ViewMode,
        anchor: NaiveDate,
    ) -> Result<String, ScheduleError> {
        let (start, end) = period::period_bounds(mode, anchor);
        let name = period::format_period_label(mode, start, end);
        let partner_id = self.settings.snapshot().partner_id;
        let id = self.db.ensure_period_exists(
            &partner_id,
            mode,
            &start.to_string(),
            &end.to_string(),
            &name,
        )?;
        self.current_period_id = Some(id.clone());
        Ok(id)
    }

    /// The load window: the union of the requested view range and
    /// `[today, today + horizon]` in the partner's timezone, so horizon
    /// checks always have their data even when the visible window is
    /// narrower.
    pub fn effective_range(
        &self,
        view_start: NaiveDate,
        view_end: NaiveDate,
        now: DateTime<Utc>,
    ) -> (NaiveDate, NaiveDate) {
        let settings = self.settings.snapshot();
        let today = settings.today(now);
        let horizon_end = today + Duration::days(settings.planning_horizon_days);
        (view_start.min(today), view_end.max(horizon_end))
    }

    /// Load the partner's shifts for the effective range around the view.
    pub fn load_shifts(
        &self,
        view_start: NaiveDate,
        view_end: NaiveDate,
    ) -> Result<Vec<Shift>, ScheduleError> {
        let (start, end) = self.effective_range(view_start, view_end, Utc::now());
        let partner_id = self.settings.snapshot().partner_id;
        Ok(self
            .db
            .shifts_in_range(&partner_id, &start.to_string(), &end.to_string())?)
    }

    /// Create or retime the shift for (employee, branch, date).
    ///
    /// Guard order: active period, dismissal, cross-branch conflict. Only
    /// then is the store touched. A time change on a not-yet-started,
    /// purely scheduled shift clears its stale attendance markers and
    /// reminder stamps; a previously recorded no-show additionally purges
    /// its outbound notifications before the clear.
    pub fn save_shift(
        &self,
        employee: &Employee,
        branch_id: &str,
        position_id: Option<&str>,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<Shift, ScheduleError> {
        let period_id = self
            .current_period_id
            .clone()
            .ok_or(ScheduleError::MissingPeriod)?;

        if employee.is_dismissed_for(date) {
            return Err(ScheduleError::Dismissed {
                name: employee.full_name(),
                date: date.to_string(),
            });
        }

        let date_str = date.to_string();
        if let Some(found) = conflict::check_shift_conflict(
            &self.db,
            &employee.id,
            &date_str,
            start_time,
            end_time,
            branch_id,
        )? {
            return Err(ScheduleError::Conflict(found));
        }

        let start_min = conflict::parse_hhmm(start_time)?;
        let end_min = conflict::parse_hhmm(end_time)?;
        let total = conflict::total_minutes(start_min, end_min);

        let saved_id = match self.db.get_shift(&employee.id, branch_id, &date_str)? {
            Some(existing) => {
                let time_changed =
                    existing.start_time != start_time || existing.end_time != end_time;
                if time_changed {
                    self.db
                        .update_shift_times(&existing.id, start_time, end_time, total)?;

                    if !existing.has_started() && existing.status == ShiftStatus::Scheduled {
                        if existing.attendance_status == Some(AttendanceStatus::NoShow) {
                            // The no-show never happened against the new window;
                            // its outbound messages must not survive the reset.
                            self.db
                                .purge_notifications(&existing.id, NO_SHOW_ALERT_CONTEXT)?;
                            self.db
                                .purge_notifications(&existing.id, NO_SHOW_DECISION_CONTEXT)?;
                        }
                        self.db.reset_unstarted_markers(&existing.id)?;
                    }
                    self.emit("shifts", StoreOp::Update, &existing.id);
                }
                existing.id
            }
            None => {
                let shift = Shift {
                    id: uuid::Uuid::new_v4().to_string(),
                    partner_id: employee.partner_id.clone(),
                    branch_id: branch_id.to_string(),
                    employee_id: Some(employee.id.clone()),
                    position_id: position_id.map(|p| p.to_string()),
                    period_id: Some(period_id),
                    date: date_str.clone(),
                    start_time: start_time.to_string(),
                    end_time: end_time.to_string(),
                    total_minutes: total,
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
                };
                match self.db.insert_shift(&shift) {
                    Ok(()) => {}
                    Err(DbError::UniqueViolation) => {
                        return Err(ScheduleError::ShiftAlreadyExists)
                    }
                    Err(e) => return Err(e.into()),
                }
                self.emit("shifts", StoreOp::Insert, &shift.id);
                shift.id
            }
        };

        self.db
            .get_shift_by_id(&saved_id)?
            .ok_or(ScheduleError::ShiftNotFound(saved_id))
    }

    /// Delete the shift for (employee, branch, date). An opened shift has
    /// its open work segments closed first so time accounting is never
    /// left dangling. Returns false when no shift existed.
    pub fn clear_shift(
        &self,
        employee_id: &str,
        branch_id: &str,
        date: NaiveDate,
    ) -> Result<bool, ScheduleError> {
        let shift = match self.db.get_shift(employee_id, branch_id, &date.to_string())? {
            Some(shift) => shift,
            None => return Ok(false),
        };

        if shift.status == ShiftStatus::Opened {
            let closed = self
                .db
                .close_open_segments(&shift.id, &Utc::now().to_rfc3339())?;
            if closed > 0 {
                log::info!(
                    "Closed {} open work segment(s) before deleting shift {}",
                    closed,
                    shift.id
                );
            }
        }

        self.db.delete_shift(&shift.id)?;
        self.emit("shifts", StoreOp::Delete, &shift.id);
        Ok(true)
    }
}
