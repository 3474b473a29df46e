use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// String-keyed metadata attached to a notification.
pub type Metadata = HashMap<String, String>;

/// Metadata key carrying the recipient's LINE account identifier.
pub const LINE_USER_ID_KEY: &str = "line_user_id";

/// Metadata key the orchestrator adds to outbound sends with the notification id.
pub const NOTIFICATION_ID_KEY: &str = "notification_id";

/// Metadata key the orchestrator adds to outbound sends with the notification type.
pub const NOTIFICATION_TYPE_KEY: &str = "notification_type";

/// Kind of notification, used for routing and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskCompleted,
    TaskDueSoon,
    SystemNotice,
    AppNotification,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::TaskAssigned => write!(f, "task_assigned"),
            NotificationType::TaskCompleted => write!(f, "task_completed"),
            NotificationType::TaskDueSoon => write!(f, "task_due_soon"),
            NotificationType::SystemNotice => write!(f, "system_notice"),
            NotificationType::AppNotification => write!(f, "app_notification"),
        }
    }
}

/// Notification lifecycle status.
///
/// `Pending → Sent → Read`, `Pending → Failed`, `Failed → Sent` (manual resend).
/// Any status may move to `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Read,
    Failed,
}

impl NotificationStatus {
    /// Whether the notification has already been delivered at least once.
    pub fn is_delivered(self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Read)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Read => write!(f, "read"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Delivery mechanism tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    App,
    Line,
    Webhook,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::App => write!(f, "app"),
            ChannelType::Line => write!(f, "line"),
            ChannelType::Webhook => write!(f, "webhook"),
        }
    }
}

impl FromStr for ChannelType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "app" => Ok(ChannelType::App),
            "line" => Ok(ChannelType::Line),
            "webhook" => Ok(ChannelType::Webhook),
            other => Err(AppError::Validation(format!(
                "unsupported channel '{}'. Valid channels: app, line, webhook",
                other
            ))),
        }
    }
}

/// A delivery target attached to a notification, with the addressing its gateway needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Channel {
    /// In-app feed of the owning user.
    App { user_id: String },
    /// LINE push message. `None` when the user has no linked LINE account.
    Line { line_user_id: Option<String> },
    /// System-wide outbound webhook.
    Webhook,
}

impl Channel {
    /// Build the channel for `channel_type`, drawing addressing data from the
    /// owning user and the notification metadata.
    pub fn resolve(channel_type: ChannelType, user_id: &str, metadata: &Metadata) -> Self {
        match channel_type {
            ChannelType::App => Channel::App {
                user_id: user_id.to_string(),
            },
            ChannelType::Line => Channel::Line {
                line_user_id: metadata
                    .get(LINE_USER_ID_KEY)
                    .filter(|id| !id.is_empty())
                    .cloned(),
            },
            ChannelType::Webhook => Channel::Webhook,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self {
            Channel::App { .. } => ChannelType::App,
            Channel::Line { .. } => ChannelType::Line,
            Channel::Webhook => ChannelType::Webhook,
        }
    }
}

/// Request to create a notification, as received from the API layer or the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationInput {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Channel names drawn from `app`, `line`, `webhook`.
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Task workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

/// A task as seen by the due-date scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub assignee_id: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Filter for paginated task listings.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Inclusive lower bound on the due date.
    pub due_from: DateTime<Utc>,
    /// Exclusive upper bound on the due date.
    pub due_until: DateTime<Utc>,
    /// Skip tasks whose status is `Done`.
    pub exclude_done: bool,
    pub limit: i64,
    pub offset: i64,
}
