//! Reminder ledger: which due-soon reminders were already issued.
//!
//! A reminder is identified by the task and the UTC calendar day of its due
//! date, so a task that stays inside the rolling window across several ticks
//! is reminded once, while a task moved to another day is reminded again.
//!
//! Claims expire on their own after [`REMINDER_TTL_SECONDS`], which outlasts
//! the look-ahead window.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use taskbell_common::error::AppError;

/// How long a claim is kept (36 hours).
pub const REMINDER_TTL_SECONDS: u64 = 36 * 60 * 60;

/// Identity of one due-soon reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub task_id: Uuid,
    pub due_day: NaiveDate,
}

impl ReminderKey {
    pub fn new(task_id: Uuid, due_date: DateTime<Utc>) -> Self {
        Self {
            task_id,
            due_day: due_date.date_naive(),
        }
    }
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reminder:due_soon:{}:{}", self.task_id, self.due_day)
    }
}

#[async_trait]
pub trait ReminderLedger: Send + Sync {
    /// Atomically claim `key`.
    ///
    /// Returns `true` if the caller now owns the reminder and should issue it,
    /// `false` if it was already claimed.
    async fn claim(&self, key: &ReminderKey) -> Result<bool, AppError>;

    /// Drop a claim so a later tick can try again.
    async fn release(&self, key: &ReminderKey) -> Result<(), AppError>;
}

/// Redis-backed ledger using `SET NX EX`, shared across processes.
#[derive(Clone)]
pub struct RedisReminderLedger {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisReminderLedger {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            ttl_seconds: REMINDER_TTL_SECONDS,
        }
    }
}

#[async_trait]
impl ReminderLedger for RedisReminderLedger {
    async fn claim(&self, key: &ReminderKey) -> Result<bool, AppError> {
        let mut conn = self.redis.clone();

        // Some("OK") when the key was set, None when it already existed.
        let result: Option<String> = redis::cmd("SET")
            .arg(key.to_string())
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    async fn release(&self, key: &ReminderKey) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key.to_string()).await?;
        Ok(())
    }
}

/// Process-local ledger for single-instance deployments and tests.
pub struct InMemoryReminderLedger {
    claims: Mutex<HashMap<ReminderKey, DateTime<Utc>>>,
    ttl: Duration,
}

impl InMemoryReminderLedger {
    pub fn new() -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(REMINDER_TTL_SECONDS as i64),
        }
    }

    pub fn is_claimed(&self, key: &ReminderKey) -> bool {
        self.claims.lock().contains_key(key)
    }

    fn claim_at(&self, key: &ReminderKey, now: DateTime<Utc>) -> bool {
        let mut claims = self.claims.lock();
        claims.retain(|_, claimed_at| now - *claimed_at < self.ttl);
        if claims.contains_key(key) {
            return false;
        }
        claims.insert(*key, now);
        true
    }
}

impl Default for InMemoryReminderLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderLedger for InMemoryReminderLedger {
    async fn claim(&self, key: &ReminderKey) -> Result<bool, AppError> {
        Ok(self.claim_at(key, Utc::now()))
    }

    async fn release(&self, key: &ReminderKey) -> Result<(), AppError> {
        self.claims.lock().remove(key);
        Ok(())
    }
}
