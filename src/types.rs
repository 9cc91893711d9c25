//! Shared domain types for the schedule engine.
//!
//! Status columns are stored as short snake_case strings in SQLite and
//! round-trip through the enums below. Dates are `"YYYY-MM-DD"`, times of
//! day are `"HH:MM"`, instants are RFC 3339 UTC strings — parsing happens
//! at the point of use, never in the row structs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar view granularity for the schedule grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Week,
    Month,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Week => "week",
            ViewMode::Month => "month",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "week" => Some(ViewMode::Week),
            "month" => Some(ViewMode::Month),
            _ => None,
        }
    }
}

/// Current employment state of an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Working,
    OnVacation,
    PendingDismissal,
    Fired,
}

impl EmploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentStatus::Working => "working",
            EmploymentStatus::OnVacation => "on_vacation",
            EmploymentStatus::PendingDismissal => "pending_dismissal",
            EmploymentStatus::Fired => "fired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "working" => Some(EmploymentStatus::Working),
            "on_vacation" => Some(EmploymentStatus::OnVacation),
            "pending_dismissal" => Some(EmploymentStatus::PendingDismissal),
            "fired" => Some(EmploymentStatus::Fired),
            _ => None,
        }
    }
}

/// Shift-day lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    Opened,
    Closed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Scheduled => "scheduled",
            ShiftStatus::Opened => "opened",
            ShiftStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(ShiftStatus::Scheduled),
            "opened" => Some(ShiftStatus::Opened),
            "closed" => Some(ShiftStatus::Closed),
            _ => None,
        }
    }
}

/// Measured attendance outcome for a shift. `None` on the row means no
/// attendance has been recorded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Scheduled,
    Opened,
    Closed,
    Late,
    NoShow,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Scheduled => "scheduled",
            AttendanceStatus::Opened => "opened",
            AttendanceStatus::Closed => "closed",
            AttendanceStatus::Late => "late",
            AttendanceStatus::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(AttendanceStatus::Scheduled),
            "opened" => Some(AttendanceStatus::Opened),
            "closed" => Some(AttendanceStatus::Closed),
            "late" => Some(AttendanceStatus::Late),
            "no_show" => Some(AttendanceStatus::NoShow),
            _ => None,
        }
    }

    /// True when this value represents real recorded attendance, as
    /// opposed to the pre-shift placeholder states.
    pub fn is_recorded(&self) -> bool {
        !matches!(self, AttendanceStatus::Scheduled)
    }
}

/// Employee confirmation state for an assigned shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    NotRequired,
    Pending,
    Confirmed,
    Declined,
    LateDeclinePending,
    PartiallyConfirmed,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::NotRequired => "not_required",
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Confirmed => "confirmed",
            ConfirmationStatus::Declined => "declined",
            ConfirmationStatus::LateDeclinePending => "late_decline_pending",
            ConfirmationStatus::PartiallyConfirmed => "partially_confirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_required" => Some(ConfirmationStatus::NotRequired),
            "pending" => Some(ConfirmationStatus::Pending),
            "confirmed" => Some(ConfirmationStatus::Confirmed),
            "declined" => Some(ConfirmationStatus::Declined),
            "late_decline_pending" => Some(ConfirmationStatus::LateDeclinePending),
            "partially_confirmed" => Some(ConfirmationStatus::PartiallyConfirmed),
            _ => None,
        }
    }
}

/// Review state of a submitted no-show reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoShowReasonStatus {
    Pending,
    Approved,
    Rejected,
}

impl NoShowReasonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoShowReasonStatus::Pending => "pending",
            NoShowReasonStatus::Approved => "approved",
            NoShowReasonStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(NoShowReasonStatus::Pending),
            "approved" => Some(NoShowReasonStatus::Approved),
            "rejected" => Some(NoShowReasonStatus::Rejected),
            _ => None,
        }
    }
}

/// Outcome of late-decline arbitration by a responsible party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsibleDecision {
    ApprovedCancel,
    RejectedCancel,
}

impl ResponsibleDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsibleDecision::ApprovedCancel => "approved_cancel",
            ResponsibleDecision::RejectedCancel => "rejected_cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved_cancel" => Some(ResponsibleDecision::ApprovedCancel),
            "rejected_cancel" => Some(ResponsibleDecision::RejectedCancel),
            _ => None,
        }
    }
}

/// A row from the `branches` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub partner_id: String,
    pub name: String,
    /// Display position in the schedule grid. Unset branches sort last.
    pub display_order: Option<i64>,
    pub min_staff_per_day: i64,
}

/// A row from the `positions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub partner_id: String,
    pub name: String,
    pub visible: bool,
}

/// A row from the `employees` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub partner_id: String,
    pub first_name: String,
    pub last_name: String,
    pub position_id: Option<String>,
    pub status: EmploymentStatus,
    /// `"YYYY-MM-DD"` — last day before which shifts may still be assigned.
    pub dismissal_date: Option<String>,
    pub active: bool,
    pub photo_ref: Option<String>,
    /// Telegram chat for shift reminders and decision messages.
    pub telegram_chat_id: Option<i64>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// True when no new shift may be assigned to this employee on `date`.
    ///
    /// Fired employees are always out. Otherwise the dismissal date is the
    /// boundary: a shift on or after it is rejected, the day before passes.
    pub fn is_dismissed_for(&self, date: NaiveDate) -> bool {
        if self.status == EmploymentStatus::Fired {
            return true;
        }
        match self
            .dismissal_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        {
            Some(dismissal) => date >= dismissal,
            None => false,
        }
    }
}

/// A row from the `schedule_periods` table.
///
/// At most one period exists per (partner, type, date_start, date_end);
/// periods are created lazily the first time a range is viewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePeriod {
    pub id: String,
    pub partner_id: String,
    pub period_type: ViewMode,
    pub date_start: String,
    pub date_end: String,
    pub name: String,
}

/// A row from the `shifts` table — the central entity of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: String,
    pub partner_id: String,
    pub branch_id: String,
    /// Cleared when a late-decline cancellation is accepted.
    pub employee_id: Option<String>,
    pub position_id: Option<String>,
    pub period_id: Option<String>,
    /// Calendar day, `"YYYY-MM-DD"`.
    pub date: String,
    /// `"HH:MM"` time of day.
    pub start_time: String,
    /// `"HH:MM"`. May be earlier than `start_time` for overnight shifts.
    pub end_time: String,
    /// Derived: `end - start`, or `(24h - start) + end` past midnight.
    pub total_minutes: i64,

    pub status: ShiftStatus,
    pub attendance_status: Option<AttendanceStatus>,
    pub confirmation_status: Option<ConfirmationStatus>,

    pub actual_start_at: Option<String>,
    pub actual_end_at: Option<String>,
    pub no_show_at: Option<String>,
    pub confirmed_at: Option<String>,
    pub declined_at: Option<String>,
    pub decided_at: Option<String>,
    pub early_leave_at: Option<String>,

    pub late_minutes: Option<i64>,
    pub early_leave_minutes: Option<i64>,
    pub early_leave_reset: bool,

    pub decline_reason: Option<String>,
    pub no_show_reason_text: Option<String>,
    pub no_show_reason_status: Option<NoShowReasonStatus>,
    pub no_show_approved_by: Option<String>,
    pub no_show_approved_at: Option<String>,
    pub no_show_rejected_by: Option<String>,
    pub no_show_rejected_at: Option<String>,

    pub responsible_decision: Option<ResponsibleDecision>,
    pub decided_by_responsible_id: Option<String>,

    pub is_replacement: bool,
    pub replacement_status: Option<String>,

    /// Cleared when the time window of a not-yet-started shift changes, so
    /// stale reminders are not suppressed against the new window.
    pub reminder_before_sent_at: Option<String>,
    pub reminder_late_sent_at: Option<String>,
}

impl Shift {
    /// True once real attendance exists: the shift was opened or a no-show
    /// was recorded against it.
    pub fn has_started(&self) -> bool {
        self.actual_start_at.is_some()
            || matches!(
                self.attendance_status,
                Some(AttendanceStatus::Opened)
                    | Some(AttendanceStatus::Late)
                    | Some(AttendanceStatus::Closed)
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(status: EmploymentStatus, dismissal_date: Option<&str>) -> Employee {
        Employee {
            id: "emp-1".to_string(),
            partner_id: "p-1".to_string(),
            first_name: "Anna".to_string(),
            last_name: "Serova".to_string(),
            position_id: None,
            status,
            dismissal_date: dismissal_date.map(|d| d.to_string()),
            active: true,
            photo_ref: None,
            telegram_chat_id: None,
        }
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            ConfirmationStatus::NotRequired,
            ConfirmationStatus::Pending,
            ConfirmationStatus::Confirmed,
            ConfirmationStatus::Declined,
            ConfirmationStatus::LateDeclinePending,
            ConfirmationStatus::PartiallyConfirmed,
        ] {
            assert_eq!(ConfirmationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConfirmationStatus::parse("unknown"), None);
        assert_eq!(AttendanceStatus::parse("no_show"), Some(AttendanceStatus::NoShow));
    }

    #[test]
    fn test_dismissal_boundary() {
        let emp = employee(EmploymentStatus::PendingDismissal, Some("2024-06-01"));
        let day_before = NaiveDate::from_ymd_opt(2024, 5, 31).expect("valid date");
        let boundary = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        let after = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

        assert!(!emp.is_dismissed_for(day_before));
        assert!(emp.is_dismissed_for(boundary));
        assert!(emp.is_dismissed_for(after));
    }

    #[test]
    fn test_fired_employee_blocked_regardless_of_date() {
        let emp = employee(EmploymentStatus::Fired, None);
        let any_day = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        assert!(emp.is_dismissed_for(any_day));
    }

    #[test]
    fn test_working_employee_without_dismissal_is_assignable() {
        let emp = employee(EmploymentStatus::Working, None);
        let any_day = NaiveDate::from_ymd_opt(2030, 12, 31).expect("valid date");
        assert!(!emp.is_dismissed_for(any_day));
    }
}
