//! Shared type definitions and row mappers for the storage layer.

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    AttendanceStatus, ConfirmationStatus, EmploymentStatus, NoShowReasonStatus,
    ResponsibleDecision, Shift, ShiftStatus, ViewMode,
};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// A composite-key uniqueness constraint was violated. Surfaced
    /// separately so callers can report "already exists" instead of a
    /// generic failure.
    #[error("Unique constraint violated")]
    UniqueViolation,
}

impl DbError {
    /// Wrap a rusqlite error, promoting constraint violations to the
    /// dedicated variant.
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        if matches!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        ) {
            DbError::UniqueViolation
        } else {
            DbError::Sqlite(err)
        }
    }
}

/// Current instant as an RFC 3339 UTC string, the format of every
/// timestamp column in the schema.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Fresh row id.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A row from the `notification_log` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub shift_id: String,
    pub context: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub body: String,
    pub sent_at: String,
}

macro_rules! text_column {
    ($ty:ty) => {
        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::parse(raw).ok_or(FromSqlError::InvalidType)
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }
    };
}

text_column!(ViewMode);
text_column!(EmploymentStatus);
text_column!(ShiftStatus);
text_column!(AttendanceStatus);
text_column!(ConfirmationStatus);
text_column!(NoShowReasonStatus);
text_column!(ResponsibleDecision);

/// Column list matching `map_shift_row`. Keep the two in sync.
pub(crate) const SHIFT_COLUMNS: &str = "id, partner_id, branch_id, employee_id, position_id, \
     period_id, date, start_time, end_time, total_minutes, status, attendance_status, \
     confirmation_status, actual_start_at, actual_end_at, no_show_at, confirmed_at, \
     declined_at, decided_at, early_leave_at, late_minutes, early_leave_minutes, \
     early_leave_reset, decline_reason, no_show_reason_text, no_show_reason_status, \
     no_show_approved_by, no_show_approved_at, no_show_rejected_by, no_show_rejected_at, \
     responsible_decision, decided_by_responsible_id, is_replacement, replacement_status, \
     reminder_before_sent_at, reminder_late_sent_at";

/// Row mapper for shift SELECT queries (36 columns).
pub(crate) fn map_shift_row(row: &rusqlite::Row) -> rusqlite::Result<Shift> {
    Ok(Shift {
        id: row.get(0)?,
        partner_id: row.get(1)?,
        branch_id: row.get(2)?,
        employee_id: row.get(3)?,
        position_id: row.get(4)?,
        period_id: row.get(5)?,
        date: row.get(6)?,
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        total_minutes: row.get(9)?,
        status: row.get(10)?,
        attendance_status: row.get(11)?,
        confirmation_status: row.get(12)?,
        actual_start_at: row.get(13)?,
        actual_end_at: row.get(14)?,
        no_show_at: row.get(15)?,
        confirmed_at: row.get(16)?,
        declined_at: row.get(17)?,
        decided_at: row.get(18)?,
        early_leave_at: row.get(19)?,
        late_minutes: row.get(20)?,
        early_leave_minutes: row.get(21)?,
        early_leave_reset: row.get(22)?,
        decline_reason: row.get(23)?,
        no_show_reason_text: row.get(24)?,
        no_show_reason_status: row.get(25)?,
        no_show_approved_by: row.get(26)?,
        no_show_approved_at: row.get(27)?,
        no_show_rejected_by: row.get(28)?,
        no_show_rejected_at: row.get(29)?,
        responsible_decision: row.get(30)?,
        decided_by_responsible_id: row.get(31)?,
        is_replacement: row.get(32)?,
        replacement_status: row.get(33)?,
        reminder_before_sent_at: row.get(34)?,
        reminder_late_sent_at: row.get(35)?,
    })
}
