//! Branch ordering and derived roster rows.
//!
//! The schedule grid shows one row per distinct (employee, position) pair
//! that has at least one loaded shift at the branch. Rows are derived
//! from the shifts on every load, never persisted; the only persisted
//! ordering is the branch display order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::db::ScheduleDb;
use crate::error::ScheduleError;
use crate::types::Shift;

/// One grid row at a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub employee_id: String,
    pub position_id: Option<String>,
}

/// Group loaded shifts into per-branch rows, one per distinct
/// (employee, position) pair, in first-seen order. Unassigned shifts
/// contribute no row.
pub fn group_rows(shifts: &[Shift]) -> HashMap<String, Vec<RosterRow>> {
    let mut rows: HashMap<String, Vec<RosterRow>> = HashMap::new();
    let mut seen: HashSet<(String, String, Option<String>)> = HashSet::new();

    for shift in shifts {
        let employee_id = match shift.employee_id.as_deref() {
            Some(id) => id.to_string(),
            None => continue,
        };
        let key = (
            shift.branch_id.clone(),
            employee_id.clone(),
            shift.position_id.clone(),
        );
        if !seen.insert(key) {
            continue;
        }
        rows.entry(shift.branch_id.clone()).or_default().push(RosterRow {
            employee_id,
            position_id: shift.position_id.clone(),
        });
    }
    rows
}

/// Persist an explicit branch ordering as `display_order` values.
/// Branches not in the list keep NULL and sort after the ordered ones.
pub fn set_branch_order(db: &ScheduleDb, ordered_branch_ids: &[&str]) -> Result<(), ScheduleError> {
    db.with_transaction(|db| {
        for (index, branch_id) in ordered_branch_ids.iter().enumerate() {
            db.set_branch_display_order(branch_id, index as i64)?;
        }
        Ok(())
    })?;
    Ok(())
}
