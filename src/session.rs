//! Scheduler session context.
//!
//! One live editing session over a partner's schedule: the store, the
//! change-event channel, the notification sink and the current view. All
//! derived state (branches, employees, shifts, grid rows, coverage) lives
//! in a single `SessionState` that `reload` replaces wholesale after any
//! write — mutations never merge partial results into it. Consumers call
//! `pump_events` to pick up out-of-band store changes.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::mpsc;

use crate::attendance::{AttendanceEngine, ReminderReport};
use crate::copy::{self, CopyOutcome};
use crate::db::ScheduleDb;
use crate::error::ScheduleError;
use crate::horizon::{self, HorizonCoverage};
use crate::notify::NotificationSink;
use crate::period::{self, DayColumn};
use crate::roster::{self, RosterRow};
use crate::settings::SettingsHandle;
use crate::store::{ShiftStore, StoreEvent};
use crate::types::{Branch, Employee, Position, Shift, ViewMode};

/// Everything the grid needs, replaced wholesale on every reload.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub branches: Vec<Branch>,
    pub positions: Vec<Position>,
    pub employees: Vec<Employee>,
    pub shifts: Vec<Shift>,
    /// Derived grid rows per branch id.
    pub rows: HashMap<String, Vec<RosterRow>>,
    pub current_period_id: Option<String>,
}

pub struct ScheduleSession {
    store: ShiftStore,
    events: mpsc::UnboundedReceiver<StoreEvent>,
    sink: Box<dyn NotificationSink>,
    mode: ViewMode,
    anchor: NaiveDate,
    state: SessionState,
}

impl ScheduleSession {
    /// Open a session over the given database, positioned on the period
    /// containing `anchor`.
    pub fn new(
        db: ScheduleDb,
        settings: SettingsHandle,
        sink: Box<dyn NotificationSink>,
        mode: ViewMode,
        anchor: NaiveDate,
    ) -> Result<Self, ScheduleError> {
        let (store, events) = ShiftStore::new(db, settings);
        let mut session = Self {
            store,
            events,
            sink,
            mode,
            anchor,
            state: SessionState::default(),
        };
        session.set_view(mode, anchor)?;
        Ok(session)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn view(&self) -> (ViewMode, NaiveDate) {
        (self.mode, self.anchor)
    }

    /// Day columns of the current view.
    pub fn days(&self) -> Vec<DayColumn> {
        period::build_days_range(self.mode, self.anchor)
    }

    /// Switch the viewed period; ensures its row exists and reloads.
    pub fn set_view(&mut self, mode: ViewMode, anchor: NaiveDate) -> Result<(), ScheduleError> {
        self.mode = mode;
        self.anchor = anchor;
        self.store.ensure_period_for_view(mode, anchor)?;
        self.reload()
    }

    /// Rebuild the whole state from the store.
    pub fn reload(&mut self) -> Result<(), ScheduleError> {
        let partner_id = self.store.settings().snapshot().partner_id;
        let (view_start, view_end) = period::period_bounds(self.mode, self.anchor);

        let branches = self.store.db().list_branches(&partner_id)?;
        let positions = self.store.db().list_positions(&partner_id)?;
        let employees = self.store.db().list_employees(&partner_id)?;
        let shifts = self.store.load_shifts(view_start, view_end)?;
        let rows = roster::group_rows(&shifts);

        self.state = SessionState {
            branches,
            positions,
            employees,
            shifts,
            rows,
            current_period_id: self.store.current_period_id().map(|id| id.to_string()),
        };
        Ok(())
    }

    /// Drain pending store events; any shift change triggers one reload.
    /// Returns how many events were drained.
    pub fn pump_events(&mut self) -> Result<usize, ScheduleError> {
        let mut drained = 0;
        let mut needs_reload = false;
        while let Ok(event) = self.events.try_recv() {
            drained += 1;
            if event.table == "shifts" {
                needs_reload = true;
            }
        }
        if needs_reload {
            self.reload()?;
        }
        Ok(drained)
    }

    /// Reload after a mutation attempt. Validation rejections leave the
    /// store untouched, so state stays current without a reload.
    fn settle<T>(&mut self, result: Result<T, ScheduleError>) -> Result<T, ScheduleError> {
        let resync = match &result {
            Ok(_) => true,
            Err(e) => !e.is_validation(),
        };
        if resync {
            self.reload()?;
        }
        result
    }

    fn engine(&self) -> AttendanceEngine<'_> {
        AttendanceEngine::new(self.store.db(), self.store.settings(), self.sink.as_ref())
    }

    // =========================================================================
    // Mutations (each settles with a wholesale reload)
    // =========================================================================

    pub fn save_shift(
        &mut self,
        employee_id: &str,
        branch_id: &str,
        position_id: Option<&str>,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<Shift, ScheduleError> {
        let employee = self
            .state
            .employees
            .iter()
            .find(|e| e.id == employee_id)
            .cloned()
            .ok_or_else(|| ScheduleError::EmployeeNotFound(employee_id.to_string()))?;
        let result = self
            .store
            .save_shift(&employee, branch_id, position_id, date, start_time, end_time);
        self.settle(result)
    }

    pub fn clear_shift(
        &mut self,
        employee_id: &str,
        branch_id: &str,
        date: NaiveDate,
    ) -> Result<bool, ScheduleError> {
        let result = self.store.clear_shift(employee_id, branch_id, date);
        self.settle(result)
    }

    pub fn copy_from_previous_period(
        &mut self,
        branch_id: &str,
    ) -> Result<CopyOutcome, ScheduleError> {
        let result = copy::copy_from_previous_period(&self.store, branch_id, self.mode, self.anchor);
        self.settle(result)
    }

    pub fn remove_employee_from_branch(
        &mut self,
        employee_id: &str,
        branch_id: &str,
    ) -> Result<usize, ScheduleError> {
        let result = copy::remove_employee_from_branch(
            &self.store,
            employee_id,
            branch_id,
            self.mode,
            self.anchor,
        );
        self.settle(result)
    }

    pub fn confirm_shift(&mut self, shift_id: &str) -> Result<Shift, ScheduleError> {
        let result = self.engine().confirm(shift_id, Utc::now());
        self.settle(result)
    }

    pub fn decline_shift(
        &mut self,
        shift_id: &str,
        reason: Option<&str>,
    ) -> Result<Shift, ScheduleError> {
        let result = self.engine().decline(shift_id, reason, Utc::now());
        self.settle(result)
    }

    pub fn accept_cancellation(
        &mut self,
        shift_id: &str,
        responsible_id: &str,
    ) -> Result<Shift, ScheduleError> {
        let result = self
            .engine()
            .accept_cancellation(shift_id, responsible_id, Utc::now());
        self.settle(result)
    }

    pub fn reject_cancellation(
        &mut self,
        shift_id: &str,
        responsible_id: &str,
    ) -> Result<Shift, ScheduleError> {
        let result = self
            .engine()
            .reject_cancellation(shift_id, responsible_id, Utc::now());
        self.settle(result)
    }

    pub fn open_shift(&mut self, shift_id: &str) -> Result<Shift, ScheduleError> {
        let result = self.engine().open_shift(shift_id, Utc::now());
        self.settle(result)
    }

    pub fn close_shift(&mut self, shift_id: &str) -> Result<Shift, ScheduleError> {
        let result = self.engine().close_shift(shift_id, Utc::now());
        self.settle(result)
    }

    pub fn reset_early_leave(&mut self, shift_id: &str) -> Result<Shift, ScheduleError> {
        let result = self.engine().reset_early_leave(shift_id);
        self.settle(result)
    }

    pub fn submit_no_show_reason(
        &mut self,
        shift_id: &str,
        reason_text: &str,
    ) -> Result<Shift, ScheduleError> {
        let result = self.engine().submit_no_show_reason(shift_id, reason_text);
        self.settle(result)
    }

    pub fn decide_no_show_reason(
        &mut self,
        shift_id: &str,
        approve: bool,
        responsible_id: &str,
    ) -> Result<Shift, ScheduleError> {
        let result = self
            .engine()
            .decide_no_show_reason(shift_id, approve, responsible_id, Utc::now());
        self.settle(result)
    }

    /// Run the periodic sweeps: no-show marking, reminders, auto-close.
    pub fn run_sweeps(&mut self, now: DateTime<Utc>) -> Result<ReminderReport, ScheduleError> {
        let result = (|| -> Result<ReminderReport, ScheduleError> {
            let engine = self.engine();
            engine.mark_no_shows(now)?;
            let report = engine.send_due_reminders(now)?;
            engine.auto_close_overdue(now)?;
            Ok(report)
        })();
        self.settle(result)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Horizon coverage per branch, anchored to today regardless of the
    /// viewed range.
    pub fn coverage(&self, now: DateTime<Utc>) -> Result<Vec<HorizonCoverage>, ScheduleError> {
        let settings = self.store.settings().snapshot();
        self.state
            .branches
            .iter()
            .map(|branch| horizon::check_horizon_coverage(self.store.db(), &settings, branch, now))
            .collect()
    }

    /// Understaffed dates per branch within the visible range.
    pub fn visible_problems(&self) -> Result<HashMap<String, Vec<String>>, ScheduleError> {
        let days = self.days();
        let mut problems = HashMap::new();
        for branch in &self.state.branches {
            let dates = horizon::check_branch_problems(self.store.db(), branch, &days)?;
            if !dates.is_empty() {
                problems.insert(branch.id.clone(), dates);
            }
        }
        Ok(problems)
    }
}
