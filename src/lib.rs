//! Shift-schedule engine for multi-branch delivery operations.
//!
//! The crate covers the scheduling core of a partner's admin surface:
//! placing and retiming shifts on a week/month grid, cross-branch overlap
//! detection, the confirmation and attendance state machines, planning
//! horizon coverage, and copying a previous period forward. It owns the
//! SQLite store and the Telegram notification side channel; rendering and
//! routing stay with the caller.
//!
//! Entry point: [`session::ScheduleSession`], which wires the store, the
//! change-event channel and a [`notify::NotificationSink`] together and
//! keeps a wholesale-reloaded [`session::SessionState`] for the grid.

pub mod attendance;
pub mod conflict;
pub mod copy;
pub mod db;
pub mod error;
pub mod horizon;
pub mod migrations;
pub mod notify;
pub mod period;
pub mod roster;
pub mod session;
pub mod settings;
pub mod store;
pub mod types;

pub use db::ScheduleDb;
pub use error::ScheduleError;
pub use session::{ScheduleSession, SessionState};
pub use settings::{PartnerSettings, SettingsHandle};
pub use store::{ShiftStore, StoreEvent};
pub use types::ViewMode;

/// Initialize env_logger once, defaulting to info level. Safe to call
/// from multiple tests.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(cfg!(test))
        .try_init();
}
