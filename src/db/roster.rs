use rusqlite::params;

use super::*;
use crate::types::{Branch, Employee, Position};

/// Sort value for branches without a persisted display order — they
/// appear after every explicitly ordered branch.
const UNORDERED_BRANCH_SORT: i64 = 1_000_000;

impl ScheduleDb {
    // =========================================================================
    // Branches
    // =========================================================================

    /// A partner's branches in display order; unordered branches last,
    /// ties broken by name.
    pub fn list_branches(&self, partner_id: &str) -> Result<Vec<Branch>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, partner_id, name, display_order, min_staff_per_day
             FROM branches
             WHERE partner_id = ?1
             ORDER BY COALESCE(display_order, ?2), name",
        )?;
        let rows = stmt.query_map(params![partner_id, UNORDERED_BRANCH_SORT], map_branch_row)?;

        let mut branches = Vec::new();
        for row in rows {
            branches.push(row?);
        }
        Ok(branches)
    }

    pub fn get_branch(&self, id: &str) -> Result<Option<Branch>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, partner_id, name, display_order, min_staff_per_day
             FROM branches WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], map_branch_row)?;
        match rows.next() {
            Some(Ok(branch)) => Ok(Some(branch)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    pub fn branch_name(&self, id: &str) -> Result<Option<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM branches WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(name)) => Ok(Some(name)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    pub fn insert_branch(&self, branch: &Branch) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO branches (id, partner_id, name, display_order, min_staff_per_day)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                branch.id,
                branch.partner_id,
                branch.name,
                branch.display_order,
                branch.min_staff_per_day
            ],
        )?;
        Ok(())
    }

    pub fn set_branch_display_order(&self, id: &str, display_order: i64) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE branches SET display_order = ?1 WHERE id = ?2",
            params![display_order, id],
        )?;
        Ok(())
    }

    pub fn set_branch_min_staff(&self, id: &str, min_staff_per_day: i64) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE branches SET min_staff_per_day = ?1 WHERE id = ?2",
            params![min_staff_per_day, id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Employees and positions
    // =========================================================================

    pub fn list_employees(&self, partner_id: &str) -> Result<Vec<Employee>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, partner_id, first_name, last_name, position_id, status,
                    dismissal_date, active, photo_ref, telegram_chat_id
             FROM employees
             WHERE partner_id = ?1
             ORDER BY last_name, first_name",
        )?;
        let rows = stmt.query_map(params![partner_id], map_employee_row)?;

        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    pub fn get_employee(&self, id: &str) -> Result<Option<Employee>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, partner_id, first_name, last_name, position_id, status,
                    dismissal_date, active, photo_ref, telegram_chat_id
             FROM employees WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], map_employee_row)?;
        match rows.next() {
            Some(Ok(employee)) => Ok(Some(employee)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    pub fn insert_employee(&self, employee: &Employee) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO employees
                 (id, partner_id, first_name, last_name, position_id, status,
                  dismissal_date, active, photo_ref, telegram_chat_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                employee.id,
                employee.partner_id,
                employee.first_name,
                employee.last_name,
                employee.position_id,
                employee.status.as_str(),
                employee.dismissal_date,
                employee.active,
                employee.photo_ref,
                employee.telegram_chat_id
            ],
        )?;
        Ok(())
    }

    pub fn list_positions(&self, partner_id: &str) -> Result<Vec<Position>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, partner_id, name, visible
             FROM positions
             WHERE partner_id = ?1
             ORDER BY name",
        )?;
        let rows = stmt.query_map(params![partner_id], |row| {
            Ok(Position {
                id: row.get(0)?,
                partner_id: row.get(1)?,
                name: row.get(2)?,
                visible: row.get(3)?,
            })
        })?;

        let mut positions = Vec::new();
        for row in rows {
            positions.push(row?);
        }
        Ok(positions)
    }

    pub fn insert_position(&self, position: &Position) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO positions (id, partner_id, name, visible) VALUES (?1, ?2, ?3, ?4)",
            params![
                position.id,
                position.partner_id,
                position.name,
                position.visible
            ],
        )?;
        Ok(())
    }
}

fn map_branch_row(row: &rusqlite::Row) -> rusqlite::Result<Branch> {
    Ok(Branch {
        id: row.get(0)?,
        partner_id: row.get(1)?,
        name: row.get(2)?,
        display_order: row.get(3)?,
        min_staff_per_day: row.get(4)?,
    })
}

fn map_employee_row(row: &rusqlite::Row) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        partner_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        position_id: row.get(4)?,
        status: row.get(5)?,
        dismissal_date: row.get(6)?,
        active: row.get(7)?,
        photo_ref: row.get(8)?,
        telegram_chat_id: row.get(9)?,
    })
}
