use rusqlite::params;

use super::*;

impl ScheduleDb {
    // =========================================================================
    // Notification log
    // =========================================================================

    /// Record an outbound message so later decision edits can find and
    /// replace it.
    pub fn record_notification(
        &self,
        shift_id: &str,
        context: &str,
        chat_id: i64,
        message_id: i64,
        body: &str,
    ) -> Result<String, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO notification_log (id, shift_id, context, chat_id, message_id, body, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, shift_id, context, chat_id, message_id, body, now_iso()],
        )?;
        Ok(id)
    }

    /// Most recently sent message for a (shift, context) pair.
    pub fn latest_notification(
        &self,
        shift_id: &str,
        context: &str,
    ) -> Result<Option<NotificationRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, shift_id, context, chat_id, message_id, body, sent_at
             FROM notification_log
             WHERE shift_id = ?1 AND context = ?2
             ORDER BY sent_at DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![shift_id, context], map_notification_row)?;
        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    pub fn delete_notification(&self, id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM notification_log WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Remove every log row for a (shift, context) pair. Returns how many
    /// rows were purged.
    pub fn purge_notifications(&self, shift_id: &str, context: &str) -> Result<usize, DbError> {
        let affected = self.conn.execute(
            "DELETE FROM notification_log WHERE shift_id = ?1 AND context = ?2",
            params![shift_id, context],
        )?;
        Ok(affected)
    }
}

fn map_notification_row(row: &rusqlite::Row) -> rusqlite::Result<NotificationRecord> {
    Ok(NotificationRecord {
        id: row.get(0)?,
        shift_id: row.get(1)?,
        context: row.get(2)?,
        chat_id: row.get(3)?,
        message_id: row.get(4)?,
        body: row.get(5)?,
        sent_at: row.get(6)?,
    })
}
