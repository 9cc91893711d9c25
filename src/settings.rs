//! Partner-scoped configuration.
//!
//! The engine never mutates these values; they arrive from the partner's
//! settings surface and may change while a session is live. `SettingsHandle`
//! holds the current snapshot behind a non-poisoning lock so timezone or
//! horizon changes take effect without a reload.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Shift reminder configuration, read by the attendance sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    pub enabled: bool,
    /// Minutes before shift start to send the reminder.
    pub offset_before_start_minutes: i64,
    /// Optional free text appended to the reminder message.
    pub comment: Option<String>,
    pub close_reminder_enabled: bool,
    /// Minutes after scheduled end before an open shift is auto-closed.
    pub auto_close_after_minutes: i64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            offset_before_start_minutes: 60,
            comment: None,
            close_reminder_enabled: false,
            auto_close_after_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerSettings {
    pub partner_id: String,
    pub timezone: Tz,
    /// Days ahead of today the horizon coverage check scans.
    pub planning_horizon_days: i64,
    /// Minutes past shift start after which an unopened shift is a no-show.
    pub no_show_threshold_minutes: i64,
    /// Closing earlier than this many minutes before scheduled end records
    /// an early-leave annotation.
    pub early_leave_threshold_minutes: i64,
    /// Declining within this window of shift start requires arbitration by
    /// a responsible party instead of taking effect directly.
    pub late_decline_window_minutes: i64,
    pub reminders: ReminderSettings,
    pub bot_token: Option<String>,
}

impl PartnerSettings {
    pub fn new(partner_id: impl Into<String>) -> Self {
        Self {
            partner_id: partner_id.into(),
            timezone: chrono_tz::UTC,
            planning_horizon_days: 14,
            no_show_threshold_minutes: 30,
            early_leave_threshold_minutes: 15,
            late_decline_window_minutes: 240,
            reminders: ReminderSettings::default(),
            bot_token: None,
        }
    }

    /// Midnight-aligned "today" in the partner's timezone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }
}

/// Shared, live-updatable settings snapshot.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<PartnerSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: PartnerSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> PartnerSettings {
        self.inner.read().clone()
    }

    /// Replace the whole configuration, e.g. from a settings-change event.
    pub fn replace(&self, settings: PartnerSettings) {
        *self.inner.write() = settings;
    }

    pub fn update(&self, f: impl FnOnce(&mut PartnerSettings)) {
        f(&mut self.inner.write());
    }
}
