//! Collaborator ports consumed by the notification core.
//!
//! Storage, user lookup and task listing live outside this crate's concern; the
//! orchestrator and scheduler only see these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use taskbell_common::error::AppError;
use taskbell_common::notification::Notification;
use taskbell_common::types::{NotificationStatus, Task, TaskFilter};

/// Persistence of notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert or update a notification.
    async fn save(&self, notification: &Notification) -> Result<(), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, AppError>;

    /// Overwrite the status and refresh `updated_at`.
    ///
    /// Fails with `AppError::NotFound` when no notification has this id.
    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), AppError>;

    /// Store the result of a send, but only if the status is still `expected`.
    ///
    /// `sent_at` is kept if already set. Returns `false` without writing when
    /// the status moved on meanwhile (for example to `Read`). Fails with
    /// `AppError::NotFound` when no notification has this id.
    async fn record_send_outcome(
        &self,
        id: Uuid,
        expected: NotificationStatus,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError>;

    /// A user's notifications, newest first.
    async fn find_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError>;

    /// Number of the user's notifications not yet read.
    async fn count_unread(&self, user_id: &str) -> Result<i64, AppError>;
}

/// Existence check for users referenced by notifications.
#[async_trait]
pub trait UserValidator: Send + Sync {
    async fn user_exists(&self, user_id: &str) -> Result<bool, AppError>;
}

/// Filtered, paginated task listing used by the due-date scheduler.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError>;
}
