//! Telegram notification side channel.
//!
//! The engine treats message delivery as fire-and-forget: failures are
//! logged and never block a state transition. Decision messages follow a
//! replace-not-append pattern — the previous message is deleted and its
//! log row removed before the new one is sent and recorded, so at most one
//! live decision message exists per (shift, context).

use serde_json::json;
use thiserror::Error;

use crate::db::ScheduleDb;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Telegram API rejected the call: {0}")]
    Api(String),
}

/// Fire-and-forget message sink. `send_message` returns the provider's
/// message id so the caller can delete the message later.
pub trait NotificationSink {
    fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, NotifyError>;
    fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), NotifyError>;
}

/// Sink for partners without a configured bot: drops everything.
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn send_message(&self, _chat_id: i64, _text: &str) -> Result<i64, NotifyError> {
        Ok(0)
    }

    fn delete_message(&self, _chat_id: i64, _message_id: i64) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Telegram Bot API client over blocking HTTP.
pub struct TelegramNotifier {
    token: String,
    client: reqwest::blocking::Client,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn call(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/{}", self.token, method);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        let body: serde_json::Value = response
            .json()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let description = body
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(NotifyError::Api(description.to_string()));
        }
        Ok(body)
    }
}

impl NotificationSink for TelegramNotifier {
    fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, NotifyError> {
        let body = self.call(
            "sendMessage",
            json!({ "chat_id": chat_id, "text": text }),
        )?;
        body.pointer("/result/message_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| NotifyError::Api("sendMessage response missing message_id".to_string()))
    }

    fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), NotifyError> {
        self.call(
            "deleteMessage",
            json!({ "chat_id": chat_id, "message_id": message_id }),
        )?;
        Ok(())
    }
}

/// Replace the live message for a (shift, context) pair: delete the prior
/// message and its log row if one is recorded, then send the new text and
/// record its message id for the next edit cycle.
///
/// Never fails — every delivery or bookkeeping problem is logged and
/// swallowed so the calling state transition is unaffected.
pub fn upsert_decision_message(
    db: &ScheduleDb,
    sink: &dyn NotificationSink,
    shift_id: &str,
    context: &str,
    chat_id: i64,
    text: &str,
) {
    match db.latest_notification(shift_id, context) {
        Ok(Some(prior)) => {
            if let Err(e) = sink.delete_message(prior.chat_id, prior.message_id) {
                log::warn!(
                    "Failed to delete prior {} message for shift {}: {}",
                    context,
                    shift_id,
                    e
                );
            }
            if let Err(e) = db.delete_notification(&prior.id) {
                log::warn!(
                    "Failed to drop notification log row {} for shift {}: {}",
                    prior.id,
                    shift_id,
                    e
                );
            }
        }
        Ok(None) => {}
        Err(e) => {
            log::warn!(
                "Failed to look up prior {} message for shift {}: {}",
                context,
                shift_id,
                e
            );
        }
    }

    match sink.send_message(chat_id, text) {
        Ok(message_id) => {
            if let Err(e) = db.record_notification(shift_id, context, chat_id, message_id, text) {
                log::warn!(
                    "Sent {} message for shift {} but failed to record it: {}",
                    context,
                    shift_id,
                    e
                );
            }
        }
        Err(e) => {
            log::warn!(
                "Failed to send {} message for shift {}: {}",
                context,
                shift_id,
                e
            );
        }
    }
}
