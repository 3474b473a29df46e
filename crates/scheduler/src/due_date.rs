//! Periodic due-date scan.
//!
//! Every tick looks at `[now, now + lookahead)` for tasks that are not done,
//! and for each task with an assignee creates (then sends) a `TaskDueSoon`
//! notification on the in-app channel. Per-task failures are logged and the
//! scan moves on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use taskbell_common::error::AppError;
use taskbell_common::types::{
    ChannelType, CreateNotificationInput, Metadata, NotificationType, Task, TaskFilter,
};
use taskbell_engine::NotificationOrchestrator;
use taskbell_engine::ports::TaskSource;

use crate::SchedulerError;
use crate::ledger::{ReminderKey, ReminderLedger};

pub const DUE_SOON_TITLE: &str = "Task due soon";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between scans. The first scan runs immediately on start.
    pub interval: Duration,
    pub lookahead: chrono::Duration,
    /// Tasks fetched per page.
    pub page_size: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            lookahead: chrono::Duration::hours(12),
            page_size: 100,
        }
    }
}

enum SchedulerState {
    Stopped,
    Running { cancel: CancellationToken },
}

pub struct DueDateScheduler {
    tasks: Arc<dyn TaskSource>,
    orchestrator: Arc<NotificationOrchestrator>,
    ledger: Arc<dyn ReminderLedger>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
}

impl DueDateScheduler {
    pub fn new(
        tasks: Arc<dyn TaskSource>,
        orchestrator: Arc<NotificationOrchestrator>,
        ledger: Arc<dyn ReminderLedger>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            tasks,
            orchestrator,
            ledger,
            config,
            state: Mutex::new(SchedulerState::Stopped),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), SchedulerState::Running { .. })
    }

    /// Spawn the scan loop. Fails if the loop is already running.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, SchedulerError> {
        let cancel = {
            let mut state = self.state.lock();
            if matches!(*state, SchedulerState::Running { .. }) {
                return Err(SchedulerError::AlreadyRunning);
            }
            let cancel = CancellationToken::new();
            *state = SchedulerState::Running {
                cancel: cancel.clone(),
            };
            cancel
        };

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            lookahead_hours = self.config.lookahead.num_hours(),
            "Due-date scheduler started"
        );

        let scheduler = Arc::clone(self);
        Ok(tokio::spawn(async move {
            scheduler.run(cancel).await;
        }))
    }

    /// Signal the loop to stop. A scan in progress finishes first.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, SchedulerState::Stopped) {
            SchedulerState::Running { cancel } => {
                cancel.cancel();
                tracing::info!("Due-date scheduler stopping");
                Ok(())
            }
            SchedulerState::Stopped => Err(SchedulerError::NotRunning),
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(self.config.interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let created = self.tick(Utc::now(), &cancel).await;
                    tracing::info!(created, "Due-date scan finished");
                }
            }
        }

        tracing::info!("Due-date scheduler stopped");
    }

    /// Run a single scan at `now`. Returns how many reminders were created.
    ///
    /// `cancel` is checked before every page and every task; a cancelled scan
    /// stops there and leaves the remaining tasks for the next run.
    pub async fn tick(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> usize {
        let mut filter = TaskFilter {
            due_from: now,
            due_until: now + self.config.lookahead,
            exclude_done: true,
            limit: self.config.page_size.max(1),
            offset: 0,
        };
        let mut created = 0;

        'pages: loop {
            if cancel.is_cancelled() {
                tracing::info!(created, "Due-date scan cancelled");
                break;
            }
            let page = match self.tasks.list_tasks(&filter).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(offset = filter.offset, error = %e, "Failed to list due tasks");
                    break;
                }
            };
            let page_len = page.len() as i64;

            for task in &page {
                if cancel.is_cancelled() {
                    tracing::info!(created, task_id = %task.id, "Due-date scan cancelled");
                    break 'pages;
                }
                match self.remind(task, now, cancel).await {
                    Ok(true) => created += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(task_id = %task.id, error = %e, "Failed to create due-soon reminder");
                    }
                }
            }

            if page_len < filter.limit {
                break;
            }
            filter.offset += filter.limit;
        }

        created
    }

    /// Issue the reminder for one task. Returns `false` when nothing was created.
    async fn remind(
        &self,
        task: &Task,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<bool, AppError> {
        let Some(assignee) = task.assignee_id.as_deref().filter(|a| !a.is_empty()) else {
            tracing::debug!(task_id = %task.id, "Task has no assignee, skipping");
            return Ok(false);
        };
        let Some(due_date) = task.due_date else {
            return Ok(false);
        };

        let key = ReminderKey::new(task.id, due_date);
        if !self.ledger.claim(&key).await? {
            tracing::debug!(task_id = %task.id, "Due-soon reminder already issued");
            return Ok(false);
        }

        let input = due_soon_input(task, assignee, due_date, now);
        let notification = match self.orchestrator.create_notification(input).await {
            Ok(notification) => notification,
            Err(e) => {
                if let Err(release_err) = self.ledger.release(&key).await {
                    tracing::warn!(task_id = %task.id, error = %release_err, "Failed to release reminder claim");
                }
                return Err(e);
            }
        };

        tracing::info!(
            task_id = %task.id,
            user_id = assignee,
            notification_id = %notification.id,
            "Due-soon reminder created"
        );

        // The reminder exists even if delivery fails; it can be resent later.
        if let Err(e) = self
            .orchestrator
            .send_notification(notification.id, cancel)
            .await
        {
            tracing::warn!(notification_id = %notification.id, error = %e, "Due-soon reminder not delivered");
        }

        Ok(true)
    }
}

/// Whole hours until `due_date`, rounded up.
fn hours_until(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let minutes = (due_date - now).num_minutes().max(0);
    (minutes + 59) / 60
}

fn due_soon_input(
    task: &Task,
    assignee: &str,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> CreateNotificationInput {
    let hours = hours_until(due_date, now);
    let unit = if hours == 1 { "hour" } else { "hours" };

    let mut metadata = Metadata::new();
    metadata.insert("task_id".to_string(), task.id.to_string());
    metadata.insert("task_title".to_string(), task.title.clone());
    metadata.insert("due_date".to_string(), due_date.to_rfc3339());
    metadata.insert("hours_remaining".to_string(), hours.to_string());
    metadata.insert("priority".to_string(), task.priority.to_string());

    CreateNotificationInput {
        user_id: assignee.to_string(),
        notification_type: NotificationType::TaskDueSoon,
        title: DUE_SOON_TITLE.to_string(),
        message: format!("Task \"{}\" is due in {} {}", task.title, hours, unit),
        metadata,
        channels: vec![ChannelType::App.to_string()],
    }
}
