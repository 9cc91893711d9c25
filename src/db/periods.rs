use rusqlite::params;

use super::*;
use crate::types::{SchedulePeriod, ViewMode};

impl ScheduleDb {
    // =========================================================================
    // Schedule periods
    // =========================================================================

    /// Look up a period by its composite key.
    pub fn get_period(
        &self,
        partner_id: &str,
        period_type: ViewMode,
        date_start: &str,
        date_end: &str,
    ) -> Result<Option<SchedulePeriod>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, partner_id, period_type, date_start, date_end, name
             FROM schedule_periods
             WHERE partner_id = ?1 AND period_type = ?2 AND date_start = ?3 AND date_end = ?4",
        )?;
        let mut rows = stmt.query_map(
            params![partner_id, period_type, date_start, date_end],
            map_period_row,
        )?;
        match rows.next() {
            Some(Ok(period)) => Ok(Some(period)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    /// Get-or-create the period for a viewed date range. Must run before
    /// any shift insert that references a period id; the composite unique
    /// key keeps concurrent creators from duplicating the row.
    pub fn ensure_period_exists(
        &self,
        partner_id: &str,
        period_type: ViewMode,
        date_start: &str,
        date_end: &str,
        name: &str,
    ) -> Result<String, DbError> {
        if let Some(existing) = self.get_period(partner_id, period_type, date_start, date_end)? {
            return Ok(existing.id);
        }

        let id = new_id();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO schedule_periods
                 (id, partner_id, period_type, date_start, date_end, name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, partner_id, period_type, date_start, date_end, name],
        )?;
        if inserted > 0 {
            return Ok(id);
        }

        // Lost the race to another writer; the row exists now.
        self.get_period(partner_id, period_type, date_start, date_end)?
            .map(|p| p.id)
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }
}

fn map_period_row(row: &rusqlite::Row) -> rusqlite::Result<SchedulePeriod> {
    Ok(SchedulePeriod {
        id: row.get(0)?,
        partner_id: row.get(1)?,
        period_type: row.get(2)?,
        date_start: row.get(3)?,
        date_end: row.get(4)?,
        name: row.get(5)?,
    })
}
