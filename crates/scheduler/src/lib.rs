//! Due-date reminders.
//!
//! [`DueDateScheduler`] scans for tasks due inside the look-ahead window on a
//! fixed period and creates one "due soon" notification per task and due day.
//! The [`ledger::ReminderLedger`] remembers which reminders were already issued.

pub mod due_date;
pub mod ledger;

use thiserror::Error;

pub use due_date::{DueDateScheduler, SchedulerConfig};

/// Misuse of the scheduler's start/stop lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler is not running")]
    NotRunning,
}
