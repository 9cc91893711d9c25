//! Attendance and confirmation state machine.
//!
//! Confirmation: `not_required → pending → {confirmed, declined,
//! late_decline_pending}`. A late decline is arbitrated by a responsible
//! party: accepting the cancellation declines the shift and unassigns the
//! employee, rejecting it reverts the shift to confirmed.
//!
//! Shift-day lifecycle: `scheduled → opened → closed`, with `no_show`
//! reachable from `scheduled` once the partner's threshold passes without
//! the shift opening, and an early-leave annotation on closes that beat
//! the scheduled end by more than the threshold.
//!
//! Decline reasons and no-show reason text are never silently dropped;
//! they clear only on the explicit paths (time edit of an unstarted shift,
//! responsible rejecting a cancellation).

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::ScheduleDb;
use crate::error::ScheduleError;
use crate::notify::{upsert_decision_message, NotificationSink};
use crate::settings::SettingsHandle;
use crate::types::{AttendanceStatus, ConfirmationStatus, Employee, Shift, ShiftStatus};

/// Notification-log context for the automatic no-show alert.
pub const NO_SHOW_ALERT_CONTEXT: &str = "no_show_alert";
/// Notification-log context for the (re-editable) no-show reason decision.
pub const NO_SHOW_DECISION_CONTEXT: &str = "no_show_decision";
const REMINDER_BEFORE_CONTEXT: &str = "reminder_before";
const REMINDER_LATE_CONTEXT: &str = "reminder_late";

/// Counts from a reminder sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderReport {
    pub before_sent: usize,
    pub late_sent: usize,
}

pub struct AttendanceEngine<'a> {
    db: &'a ScheduleDb,
    settings: &'a SettingsHandle,
    sink: &'a dyn NotificationSink,
}

impl<'a> AttendanceEngine<'a> {
    pub fn new(
        db: &'a ScheduleDb,
        settings: &'a SettingsHandle,
        sink: &'a dyn NotificationSink,
    ) -> Self {
        Self { db, settings, sink }
    }

    fn shift(&self, shift_id: &str) -> Result<Shift, ScheduleError> {
        self.db
            .get_shift_by_id(shift_id)?
            .ok_or_else(|| ScheduleError::ShiftNotFound(shift_id.to_string()))
    }

    fn employee_of(&self, shift: &Shift) -> Result<Option<Employee>, ScheduleError> {
        match shift.employee_id.as_deref() {
            Some(id) => Ok(self.db.get_employee(id)?),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Confirmation transitions
    // =========================================================================

    /// `pending → confirmed`.
    pub fn confirm(&self, shift_id: &str, now: DateTime<Utc>) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        require_confirmation(&shift, ConfirmationStatus::Pending, "confirm")?;
        self.db.set_confirmed(shift_id, &now.to_rfc3339())?;
        self.shift(shift_id)
    }

    /// `pending → declined`, or `pending → late_decline_pending` when the
    /// decline lands within the partner's late-decline window of shift
    /// start — then a responsible party must arbitrate.
    pub fn decline(
        &self,
        shift_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        require_confirmation(&shift, ConfirmationStatus::Pending, "decline")?;

        let settings = self.settings.snapshot();
        let start = scheduled_start_utc(&shift, settings.timezone)?;
        let minutes_to_start = (start - now).num_minutes();
        let status = if minutes_to_start < settings.late_decline_window_minutes {
            ConfirmationStatus::LateDeclinePending
        } else {
            ConfirmationStatus::Declined
        };

        self.db
            .set_declined(shift_id, status, reason, &now.to_rfc3339())?;
        self.shift(shift_id)
    }

    /// Responsible accepts a late cancellation: the shift is declined and
    /// the employee unassigned. The decline reason survives.
    pub fn accept_cancellation(
        &self,
        shift_id: &str,
        responsible_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        require_confirmation(&shift, ConfirmationStatus::LateDeclinePending, "accept cancel")?;
        self.db
            .apply_accept_cancellation(shift_id, responsible_id, &now.to_rfc3339())?;
        self.shift(shift_id)
    }

    /// Responsible rejects a late cancellation: the shift reverts to
    /// confirmed and the decline fields are explicitly cleared.
    pub fn reject_cancellation(
        &self,
        shift_id: &str,
        responsible_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        require_confirmation(&shift, ConfirmationStatus::LateDeclinePending, "reject cancel")?;
        self.db
            .apply_reject_cancellation(shift_id, responsible_id, &now.to_rfc3339())?;
        self.shift(shift_id)
    }

    // =========================================================================
    // Shift-day lifecycle
    // =========================================================================

    /// `scheduled → opened`. Stamps the actual start, measures lateness
    /// against the scheduled start, and opens a work segment.
    pub fn open_shift(&self, shift_id: &str, now: DateTime<Utc>) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        if shift.status != ShiftStatus::Scheduled {
            return Err(ScheduleError::InvalidTransition {
                action: "open",
                state: shift.status.as_str().to_string(),
            });
        }

        let settings = self.settings.snapshot();
        let start = scheduled_start_utc(&shift, settings.timezone)?;
        let late_minutes = (now - start).num_minutes().max(0);
        let attendance = if late_minutes > 0 {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Opened
        };

        let now_iso = now.to_rfc3339();
        self.db
            .apply_open(shift_id, &now_iso, attendance, late_minutes)?;
        self.db.open_work_segment(shift_id, &now_iso)?;
        self.shift(shift_id)
    }

    /// `opened → closed`. Closes open work segments and annotates an early
    /// leave when the close beats the scheduled end by more than the
    /// partner's threshold (unless the annotation was reset).
    pub fn close_shift(&self, shift_id: &str, now: DateTime<Utc>) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        if shift.status != ShiftStatus::Opened {
            return Err(ScheduleError::InvalidTransition {
                action: "close",
                state: shift.status.as_str().to_string(),
            });
        }

        let settings = self.settings.snapshot();
        let end = scheduled_end_utc(&shift, settings.timezone)?;
        let minutes_short = (end - now).num_minutes();
        let (early_minutes, early_at) = if !shift.early_leave_reset
            && minutes_short > settings.early_leave_threshold_minutes
        {
            (Some(minutes_short), Some(now.to_rfc3339()))
        } else {
            (None, None)
        };

        let now_iso = now.to_rfc3339();
        self.db.close_open_segments(shift_id, &now_iso)?;
        self.db
            .apply_close(shift_id, &now_iso, early_minutes, early_at.as_deref())?;
        self.shift(shift_id)
    }

    /// Clear an early-leave annotation and keep it cleared.
    pub fn reset_early_leave(&self, shift_id: &str) -> Result<Shift, ScheduleError> {
        self.shift(shift_id)?;
        self.db.apply_early_leave_reset(shift_id)?;
        self.shift(shift_id)
    }

    /// Sweep today's unopened shifts and mark the ones past the no-show
    /// threshold, alerting each assigned employee. Returns how many shifts
    /// were marked.
    pub fn mark_no_shows(&self, now: DateTime<Utc>) -> Result<usize, ScheduleError> {
        let settings = self.settings.snapshot();
        let today = settings.today(now).to_string();
        let mut marked = 0;

        for shift in self.db.shifts_on_date(&settings.partner_id, &today)? {
            if shift.status != ShiftStatus::Scheduled
                || shift.has_started()
                || shift.attendance_status == Some(AttendanceStatus::NoShow)
                || shift.employee_id.is_none()
            {
                continue;
            }
            // A declined shift (final or awaiting arbitration) is not an
            // attendance failure.
            if matches!(
                shift.confirmation_status,
                Some(ConfirmationStatus::Declined) | Some(ConfirmationStatus::LateDeclinePending)
            ) {
                continue;
            }
            let start = scheduled_start_utc(&shift, settings.timezone)?;
            if now < start + Duration::minutes(settings.no_show_threshold_minutes) {
                continue;
            }

            self.db.apply_no_show(&shift.id, &now.to_rfc3339())?;
            marked += 1;

            if let Some(employee) = self.employee_of(&shift)? {
                if let Some(chat_id) = employee.telegram_chat_id {
                    let text = format!(
                        "You did not open your shift scheduled {} at {}. Please submit a reason.",
                        shift.date, shift.start_time
                    );
                    upsert_decision_message(
                        self.db,
                        self.sink,
                        &shift.id,
                        NO_SHOW_ALERT_CONTEXT,
                        chat_id,
                        &text,
                    );
                }
            }
        }
        Ok(marked)
    }

    // =========================================================================
    // No-show reason arbitration
    // =========================================================================

    /// Employee submits (or replaces) the reason for a recorded no-show.
    pub fn submit_no_show_reason(
        &self,
        shift_id: &str,
        reason_text: &str,
    ) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        if shift.attendance_status != Some(AttendanceStatus::NoShow) {
            return Err(ScheduleError::InvalidTransition {
                action: "submit no-show reason",
                state: attendance_state_name(&shift),
            });
        }
        self.db.set_no_show_reason(shift_id, reason_text)?;
        self.shift(shift_id)
    }

    /// Responsible approves or rejects a submitted no-show reason.
    ///
    /// The decision is re-editable: every change updates the shift row,
    /// replaces the employee's previous decision message (delete old, send
    /// new, re-record), and keeps approval/rejection mutually exclusive.
    pub fn decide_no_show_reason(
        &self,
        shift_id: &str,
        approve: bool,
        responsible_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Shift, ScheduleError> {
        let shift = self.shift(shift_id)?;
        if shift.attendance_status != Some(AttendanceStatus::NoShow)
            || shift.no_show_reason_text.is_none()
        {
            return Err(ScheduleError::InvalidTransition {
                action: "decide no-show reason",
                state: attendance_state_name(&shift),
            });
        }

        self.db
            .apply_no_show_decision(shift_id, approve, responsible_id, &now.to_rfc3339())?;

        if let Some(employee) = self.employee_of(&shift)? {
            if let Some(chat_id) = employee.telegram_chat_id {
                let verdict = if approve { "approved" } else { "rejected" };
                let text = format!(
                    "Your no-show reason for {} was {}.",
                    shift.date, verdict
                );
                upsert_decision_message(
                    self.db,
                    self.sink,
                    shift_id,
                    NO_SHOW_DECISION_CONTEXT,
                    chat_id,
                    &text,
                );
            }
        }
        self.shift(shift_id)
    }

    // =========================================================================
    // Reminder sweeps
    // =========================================================================

    /// Send due before-start and late reminders for today's shifts,
    /// stamping the sent timestamps so each fires at most once per window.
    pub fn send_due_reminders(&self, now: DateTime<Utc>) -> Result<ReminderReport, ScheduleError> {
        let settings = self.settings.snapshot();
        let today = settings.today(now).to_string();
        let mut report = ReminderReport::default();

        for shift in self.db.shifts_on_date(&settings.partner_id, &today)? {
            if shift.status != ShiftStatus::Scheduled || shift.has_started() {
                continue;
            }
            let employee = match self.employee_of(&shift)? {
                Some(employee) => employee,
                None => continue,
            };
            let chat_id = match employee.telegram_chat_id {
                Some(chat_id) => chat_id,
                None => continue,
            };
            let start = scheduled_start_utc(&shift, settings.timezone)?;

            if settings.reminders.enabled
                && shift.reminder_before_sent_at.is_none()
                && now < start
                && now >= start - Duration::minutes(settings.reminders.offset_before_start_minutes)
            {
                let mut text = format!(
                    "Reminder: your shift starts today at {}.",
                    shift.start_time
                );
                if let Some(comment) = settings.reminders.comment.as_deref() {
                    text.push(' ');
                    text.push_str(comment);
                }
                self.deliver(&shift.id, REMINDER_BEFORE_CONTEXT, chat_id, &text);
                self.db
                    .set_reminder_before_sent(&shift.id, &now.to_rfc3339())?;
                report.before_sent += 1;
            }

            if shift.reminder_late_sent_at.is_none()
                && shift.attendance_status != Some(AttendanceStatus::NoShow)
                && now >= start
                && now < start + Duration::minutes(settings.no_show_threshold_minutes)
            {
                let text = format!(
                    "Your shift started at {} and is not opened yet.",
                    shift.start_time
                );
                self.deliver(&shift.id, REMINDER_LATE_CONTEXT, chat_id, &text);
                self.db
                    .set_reminder_late_sent(&shift.id, &now.to_rfc3339())?;
                report.late_sent += 1;
            }
        }
        Ok(report)
    }

    /// Close opened shifts whose scheduled end passed more than the
    /// auto-close offset ago. Scans yesterday too, for overnight shifts.
    pub fn auto_close_overdue(&self, now: DateTime<Utc>) -> Result<usize, ScheduleError> {
        let settings = self.settings.snapshot();
        if !settings.reminders.close_reminder_enabled {
            return Ok(0);
        }

        let today = settings.today(now);
        let from = (today - Duration::days(1)).to_string();
        let mut closed = 0;

        for shift in
            self.db
                .shifts_in_range(&settings.partner_id, &from, &today.to_string())?
        {
            if shift.status != ShiftStatus::Opened {
                continue;
            }
            let end = scheduled_end_utc(&shift, settings.timezone)?;
            if now >= end + Duration::minutes(settings.reminders.auto_close_after_minutes) {
                self.close_shift(&shift.id, now)?;
                closed += 1;
            }
        }
        Ok(closed)
    }

    /// Fire-and-forget delivery with log bookkeeping; failures never
    /// propagate.
    fn deliver(&self, shift_id: &str, context: &str, chat_id: i64, text: &str) {
        match self.sink.send_message(chat_id, text) {
            Ok(message_id) => {
                if let Err(e) =
                    self.db
                        .record_notification(shift_id, context, chat_id, message_id, text)
                {
                    log::warn!("Failed to record {} for shift {}: {}", context, shift_id, e);
                }
            }
            Err(e) => {
                log::warn!("Failed to send {} for shift {}: {}", context, shift_id, e);
            }
        }
    }
}

fn require_confirmation(
    shift: &Shift,
    expected: ConfirmationStatus,
    action: &'static str,
) -> Result<(), ScheduleError> {
    if shift.confirmation_status != Some(expected) {
        return Err(ScheduleError::InvalidTransition {
            action,
            state: shift
                .confirmation_status
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "none".to_string()),
        });
    }
    Ok(())
}

fn attendance_state_name(shift: &Shift) -> String {
    shift
        .attendance_status
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Scheduled start instant of a shift in UTC, interpreting its date and
/// start time in the partner's timezone.
pub fn scheduled_start_utc(shift: &Shift, tz: Tz) -> Result<DateTime<Utc>, ScheduleError> {
    let date = NaiveDate::parse_from_str(&shift.date, "%Y-%m-%d")
        .map_err(|_| ScheduleError::InvalidDate(shift.date.clone()))?;
    let time = NaiveTime::parse_from_str(&shift.start_time, "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(shift.start_time.clone()))?;
    Ok(resolve_local(date.and_time(time), tz))
}

/// Scheduled end instant in UTC. An end time at or before the start time
/// means the shift wraps past midnight onto the next day.
pub fn scheduled_end_utc(shift: &Shift, tz: Tz) -> Result<DateTime<Utc>, ScheduleError> {
    let date = NaiveDate::parse_from_str(&shift.date, "%Y-%m-%d")
        .map_err(|_| ScheduleError::InvalidDate(shift.date.clone()))?;
    let start = NaiveTime::parse_from_str(&shift.start_time, "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(shift.start_time.clone()))?;
    let end = NaiveTime::parse_from_str(&shift.end_time, "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(shift.end_time.clone()))?;

    let end_date = if end <= start && shift.total_minutes > 0 {
        date + Duration::days(1)
    } else {
        date
    };
    Ok(resolve_local(end_date.and_time(end), tz))
}

/// Map a local wall-clock time to UTC, picking the earlier instant on DST
/// ambiguity and falling back to a literal UTC read inside a DST gap.
fn resolve_local(local: chrono::NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    use chrono::offset::LocalResult;
    use chrono::TimeZone;

    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&local),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;
    use crate::notify::NotifyError;
    use crate::settings::PartnerSettings;
    use crate::store::ShiftStore;
    use crate::types::{Branch, EmploymentStatus, ViewMode};

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(i64, String)>>,
        deleted: Mutex<Vec<i64>>,
        next_id: Mutex<i64>,
    }

    impl NotificationSink for RecordingSink {
        fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, NotifyError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(*next)
        }

        fn delete_message(&self, _chat_id: i64, message_id: i64) -> Result<(), NotifyError> {
            self.deleted.lock().unwrap().push(message_id);
            Ok(())
        }
    }

    struct Fixture {
        store: ShiftStore,
        settings: SettingsHandle,
        employee: crate::types::Employee,
    }

    fn fixture() -> Fixture {
        let db = ScheduleDb::open_in_memory().expect("open db");
        db.insert_branch(&Branch {
            id: "branch-a".to_string(),
            partner_id: "p1".to_string(),
            name: "Branch A".to_string(),
            display_order: None,
            min_staff_per_day: 0,
        })
        .expect("insert branch");

        let employee = crate::types::Employee {
            id: "emp-1".to_string(),
            partner_id: "p1".to_string(),
            first_name: "Anna".to_string(),
            last_name: "Serova".to_string(),
            position_id: None,
            status: EmploymentStatus::Working,
            dismissal_date: None,
            active: true,
            photo_ref: None,
            telegram_chat_id: Some(777),
        };
        db.insert_employee(&employee).expect("insert employee");

        let settings = SettingsHandle::new(PartnerSettings::new("p1"));
        let (mut store, _events) = ShiftStore::new(db, settings.clone());
        store
            .ensure_period_for_view(
                ViewMode::Week,
                NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date"),
            )
            .expect("ensure period");
        Fixture {
            store,
            settings,
            employee,
        }
    }

    fn seed_shift(fx: &Fixture, start: &str, end: &str) -> crate::types::Shift {
        fx.store
            .save_shift(
                &fx.employee,
                "branch-a",
                None,
                NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date"),
                start,
                end,
            )
            .expect("save shift")
    }

    fn at(h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, h, min, 0).unwrap()
    }

    #[test]
    fn test_confirm_from_pending() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");

        let confirmed = engine.confirm(&shift.id, at(7, 0)).expect("confirm");
        assert_eq!(
            confirmed.confirmation_status,
            Some(ConfirmationStatus::Confirmed)
        );
        assert!(confirmed.confirmed_at.is_some());

        // Confirming again is an invalid transition.
        assert!(matches!(
            engine.confirm(&shift.id, at(7, 5)),
            Err(ScheduleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_decline_far_ahead_is_final() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");

        // 09:00 start, declined the evening before: well outside the
        // 240-minute window.
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 20, 0, 0).unwrap();
        let declined = engine
            .decline(&shift.id, Some("sick"), now)
            .expect("decline");
        assert_eq!(
            declined.confirmation_status,
            Some(ConfirmationStatus::Declined)
        );
        assert_eq!(declined.decline_reason.as_deref(), Some("sick"));
    }

    #[test]
    fn test_late_decline_requires_arbitration() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");

        // 2 hours before start, inside the 240-minute window.
        let pending = engine
            .decline(&shift.id, Some("overslept"), at(7, 0))
            .expect("decline");
        assert_eq!(
            pending.confirmation_status,
            Some(ConfirmationStatus::LateDeclinePending)
        );
        assert_eq!(pending.decline_reason.as_deref(), Some("overslept"));
    }

    #[test]
    fn test_accept_cancellation_unassigns_and_keeps_reason() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");
        engine
            .decline(&shift.id, Some("overslept"), at(7, 0))
            .expect("decline");

        let decided = engine
            .accept_cancellation(&shift.id, "resp-1", at(7, 30))
            .expect("accept");
        assert_eq!(
            decided.confirmation_status,
            Some(ConfirmationStatus::Declined)
        );
        assert_eq!(decided.employee_id, None);
        assert_eq!(
            decided.responsible_decision,
            Some(crate::types::ResponsibleDecision::ApprovedCancel)
        );
        assert_eq!(decided.decided_by_responsible_id.as_deref(), Some("resp-1"));
        assert!(decided.decided_at.is_some());
        // Reason is preserved for the record.
        assert_eq!(decided.decline_reason.as_deref(), Some("overslept"));
    }

    #[test]
    fn test_reject_cancellation_reverts_to_confirmed_and_clears_decline() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");
        engine
            .decline(&shift.id, Some("overslept"), at(7, 0))
            .expect("decline");

        let decided = engine
            .reject_cancellation(&shift.id, "resp-1", at(7, 30))
            .expect("reject");
        assert_eq!(
            decided.confirmation_status,
            Some(ConfirmationStatus::Confirmed)
        );
        assert_eq!(decided.decline_reason, None);
        assert_eq!(decided.declined_at, None);
        assert_eq!(
            decided.responsible_decision,
            Some(crate::types::ResponsibleDecision::RejectedCancel)
        );
    }

    #[test]
    fn test_open_on_time_and_late() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);

        let shift = seed_shift(&fx, "09:00", "18:00");
        let opened = engine.open_shift(&shift.id, at(9, 0)).expect("open");
        assert_eq!(opened.status, ShiftStatus::Opened);
        assert_eq!(opened.attendance_status, Some(AttendanceStatus::Opened));
        assert_eq!(opened.late_minutes, Some(0));
        assert_eq!(
            fx.store.db().open_segment_count(&shift.id).expect("count"),
            1
        );

        // Opening an opened shift is rejected.
        assert!(matches!(
            engine.open_shift(&shift.id, at(9, 1)),
            Err(ScheduleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_open_late_records_minutes() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");

        let opened = engine.open_shift(&shift.id, at(9, 25)).expect("open");
        assert_eq!(opened.attendance_status, Some(AttendanceStatus::Late));
        assert_eq!(opened.late_minutes, Some(25));
    }

    #[test]
    fn test_close_past_threshold_records_early_leave() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");
        engine.open_shift(&shift.id, at(9, 0)).expect("open");

        // 90 minutes early, threshold is 15.
        let closed = engine.close_shift(&shift.id, at(16, 30)).expect("close");
        assert_eq!(closed.status, ShiftStatus::Closed);
        assert_eq!(closed.early_leave_minutes, Some(90));
        assert!(closed.early_leave_at.is_some());
        assert_eq!(
            fx.store.db().open_segment_count(&shift.id).expect("count"),
            0
        );
    }

    #[test]
    fn test_close_within_threshold_has_no_annotation() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");
        engine.open_shift(&shift.id, at(9, 0)).expect("open");

        let closed = engine.close_shift(&shift.id, at(17, 50)).expect("close");
        assert_eq!(closed.early_leave_minutes, None);
        assert_eq!(closed.early_leave_at, None);
    }

    #[test]
    fn test_mark_no_shows_threshold_boundary() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");

        // 29 minutes past start: under the 30-minute threshold.
        assert_eq!(engine.mark_no_shows(at(9, 29)).expect("sweep"), 0);
        // Exactly at the threshold.
        assert_eq!(engine.mark_no_shows(at(9, 30)).expect("sweep"), 1);
        // Idempotent.
        assert_eq!(engine.mark_no_shows(at(9, 31)).expect("sweep"), 0);

        let marked = fx
            .store
            .db()
            .get_shift_by_id(&shift.id)
            .expect("lookup")
            .expect("shift");
        assert_eq!(marked.attendance_status, Some(AttendanceStatus::NoShow));
        assert!(marked.no_show_at.is_some());
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_declined_shifts_are_not_swept_as_no_shows() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");

        // Declined inside the late-decline window, still awaiting
        // arbitration when the start passes.
        let pending = engine
            .decline(&shift.id, Some("sick"), at(7, 0))
            .expect("decline");
        assert_eq!(
            pending.confirmation_status,
            Some(ConfirmationStatus::LateDeclinePending)
        );

        assert_eq!(engine.mark_no_shows(at(10, 0)).expect("sweep"), 0);

        // Arbitrated to a final decline: still exempt.
        engine
            .accept_cancellation(&shift.id, "resp-1", at(10, 5))
            .expect("accept");
        assert_eq!(engine.mark_no_shows(at(10, 10)).expect("sweep"), 0);

        let untouched = fx
            .store
            .db()
            .get_shift_by_id(&shift.id)
            .expect("lookup")
            .expect("shift");
        assert_ne!(untouched.attendance_status, Some(AttendanceStatus::NoShow));
        assert!(untouched.no_show_at.is_none());
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_show_decision_is_reversible_and_exclusive() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");
        engine.mark_no_shows(at(10, 0)).expect("sweep");
        engine
            .submit_no_show_reason(&shift.id, "hospital visit")
            .expect("submit reason");

        let approved = engine
            .decide_no_show_reason(&shift.id, true, "resp-1", at(11, 0))
            .expect("approve");
        assert_eq!(
            approved.no_show_reason_status,
            Some(crate::types::NoShowReasonStatus::Approved)
        );
        assert_eq!(approved.no_show_approved_by.as_deref(), Some("resp-1"));
        assert_eq!(approved.no_show_rejected_by, None);

        let rejected = engine
            .decide_no_show_reason(&shift.id, false, "resp-2", at(12, 0))
            .expect("reject");
        assert_eq!(
            rejected.no_show_reason_status,
            Some(crate::types::NoShowReasonStatus::Rejected)
        );
        assert_eq!(rejected.no_show_rejected_by.as_deref(), Some("resp-2"));
        assert!(rejected.no_show_rejected_at.is_some());
        assert_eq!(rejected.no_show_approved_by, None);
        assert_eq!(rejected.no_show_approved_at, None);
        // Reason text survived both decisions.
        assert_eq!(
            rejected.no_show_reason_text.as_deref(),
            Some("hospital visit")
        );

        // Replace-not-append: exactly one live decision message.
        let live = fx
            .store
            .db()
            .latest_notification(&shift.id, NO_SHOW_DECISION_CONTEXT)
            .expect("lookup")
            .expect("record");
        assert!(live.body.contains("rejected"));
        let decision_rows: i64 = fx
            .store
            .db()
            .conn_ref()
            .query_row(
                "SELECT COUNT(*) FROM notification_log WHERE context = ?1",
                [NO_SHOW_DECISION_CONTEXT],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(decision_rows, 1);
    }

    #[test]
    fn test_reminder_sweep_sends_once() {
        let fx = fixture();
        fx.settings.update(|s| {
            s.reminders.enabled = true;
            s.reminders.offset_before_start_minutes = 60;
            s.reminders.comment = Some("Wear the uniform.".to_string());
        });
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        seed_shift(&fx, "09:00", "18:00");

        // Too early: 08:00 reminder window opens at 08:00 sharp.
        let early = engine.send_due_reminders(at(7, 59)).expect("sweep");
        assert_eq!(early.before_sent, 0);

        let due = engine.send_due_reminders(at(8, 10)).expect("sweep");
        assert_eq!(due.before_sent, 1);
        assert!(sink.sent.lock().unwrap()[0].1.contains("Wear the uniform."));

        // Already stamped: nothing more to send.
        let again = engine.send_due_reminders(at(8, 20)).expect("sweep");
        assert_eq!(again.before_sent, 0);
    }

    #[test]
    fn test_late_reminder_before_no_show_window_closes() {
        let fx = fixture();
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        seed_shift(&fx, "09:00", "18:00");

        let report = engine.send_due_reminders(at(9, 10)).expect("sweep");
        assert_eq!(report.late_sent, 1);
        let repeat = engine.send_due_reminders(at(9, 15)).expect("sweep");
        assert_eq!(repeat.late_sent, 0);
    }

    #[test]
    fn test_auto_close_overdue_respects_offset() {
        let fx = fixture();
        fx.settings.update(|s| {
            s.reminders.close_reminder_enabled = true;
            s.reminders.auto_close_after_minutes = 120;
        });
        let sink = RecordingSink::default();
        let engine = AttendanceEngine::new(fx.store.db(), &fx.settings, &sink);
        let shift = seed_shift(&fx, "09:00", "18:00");
        engine.open_shift(&shift.id, at(9, 0)).expect("open");

        assert_eq!(engine.auto_close_overdue(at(19, 0)).expect("sweep"), 0);
        assert_eq!(engine.auto_close_overdue(at(20, 0)).expect("sweep"), 1);

        let closed = fx
            .store
            .db()
            .get_shift_by_id(&shift.id)
            .expect("lookup")
            .expect("shift");
        assert_eq!(closed.status, ShiftStatus::Closed);
    }
}
