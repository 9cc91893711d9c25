//! Error types for schedule operations.
//!
//! Errors are classified by how the caller should handle them:
//! - Validation rejections (dismissed employee, conflict, invalid input)
//!   are caught before any mutation and reported with a structured reason.
//! - Store failures surface after a mutation attempt; the caller reloads
//!   from the source of truth and shows a retry message. Uniqueness
//!   violations get their own variant so the UI can say "shift already
//!   exists" instead of a generic error.

use thiserror::Error;

use crate::conflict::ShiftConflict;
use crate::db::DbError;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("{name} is dismissed as of {date} and cannot take this shift")]
    Dismissed { name: String, date: String },

    #[error("Overlaps a shift at {} ({}-{})", .0.branch_name, .0.start_time, .0.end_time)]
    Conflict(ShiftConflict),

    #[error("A shift already exists for this employee, branch and date")]
    ShiftAlreadyExists,

    #[error("No schedule period is active for the current view")]
    MissingPeriod,

    #[error("Shift not found: {0}")]
    ShiftNotFound(String),

    #[error("Employee not found: {0}")]
    EmployeeNotFound(String),

    #[error("Cannot {action} a shift in state {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("Invalid time value: {0}")]
    InvalidTime(String),

    #[error("Invalid date value: {0}")]
    InvalidDate(String),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl ScheduleError {
    /// True for rejections raised before any mutation. The caller does not
    /// need to resynchronize state after these.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScheduleError::Dismissed { .. }
                | ScheduleError::Conflict(_)
                | ScheduleError::MissingPeriod
                | ScheduleError::ShiftNotFound(_)
                | ScheduleError::EmployeeNotFound(_)
                | ScheduleError::InvalidTransition { .. }
                | ScheduleError::InvalidTime(_)
                | ScheduleError::InvalidDate(_)
        )
    }

    /// Message suitable for showing directly to an admin.
    pub fn user_message(&self) -> String {
        match self {
            ScheduleError::Db(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}
