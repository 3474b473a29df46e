//! In-memory implementations of the collaborator ports.
//!
//! Used by tests across the workspace and for running the core without a
//! database. Nothing here survives a restart.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use taskbell_common::error::AppError;
use taskbell_common::notification::Notification;
use taskbell_common::types::{NotificationStatus, Task, TaskFilter, TaskStatus};

use crate::ports::{NotificationRepository, TaskSource, UserValidator};

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<HashMap<Uuid, Notification>>,
    writes: AtomicUsize,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes (`save` or a recorded send outcome) made so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.notifications.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.read().is_empty()
    }

    /// Snapshot of every stored notification.
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.read().values().cloned().collect()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn save(&self, notification: &Notification) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.notifications
            .write()
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, AppError> {
        Ok(self.notifications.read().get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), AppError> {
        let mut notifications = self.notifications.write();
        let notification = notifications
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;
        notification.status = status;
        notification.updated_at = Utc::now();
        Ok(())
    }

    async fn record_send_outcome(
        &self,
        id: Uuid,
        expected: NotificationStatus,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let mut notifications = self.notifications.write();
        let notification = notifications
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;
        if notification.status != expected {
            return Ok(false);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        notification.status = status;
        notification.updated_at = Utc::now();
        if notification.sent_at.is_none() {
            notification.sent_at = sent_at;
        }
        Ok(true)
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let mut owned: Vec<Notification> = self
            .notifications
            .read()
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_unread(&self, user_id: &str) -> Result<i64, AppError> {
        let count = self
            .notifications
            .read()
            .values()
            .filter(|n| n.user_id == user_id && n.status != NotificationStatus::Read)
            .count();
        Ok(count as i64)
    }
}

/// Fixed set of known user ids.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashSet<String>>,
}

impl InMemoryUserDirectory {
    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: RwLock::new(users.into_iter().map(Into::into).collect()),
        }
    }

    pub fn add_user(&self, user_id: impl Into<String>) {
        self.users.write().insert(user_id.into());
    }
}

#[async_trait]
impl UserValidator for InMemoryUserDirectory {
    async fn user_exists(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self.users.read().contains(user_id))
    }
}

/// Task list filtered the same way the Postgres source filters.
#[derive(Default)]
pub struct InMemoryTaskSource {
    tasks: RwLock<Vec<Task>>,
}

impl InMemoryTaskSource {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RwLock::new(tasks),
        }
    }

    pub fn push(&self, task: Task) {
        self.tasks.write().push(task);
    }
}

#[async_trait]
impl TaskSource for InMemoryTaskSource {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let mut matching: Vec<Task> = self
            .tasks
            .read()
            .iter()
            .filter(|t| {
                t.due_date
                    .is_some_and(|due| due >= filter.due_from && due < filter.due_until)
            })
            .filter(|t| !(filter.exclude_done && t.status == TaskStatus::Done))
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.due_date);

        Ok(matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}
