use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string. Without it, reminder dedupe is kept in memory.
    pub redis_url: Option<String>,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// HTTP port for the API server (default: 3000)
    pub api_port: u16,

    /// LINE Messaging API channel access token
    pub line_channel_access_token: Option<String>,

    /// LINE Messaging API base URL
    pub line_api_base_url: String,

    /// Outbound webhook endpoint. Without it, the webhook channel is skipped.
    pub webhook_url: Option<String>,

    /// Shared secret sent in the `X-Webhook-Secret` header
    pub webhook_secret: String,

    /// Timeout for external gateway HTTP calls in seconds (default: 10)
    pub gateway_timeout_secs: u64,

    /// Run the due-date scheduler inside the API process (default: true)
    pub scheduler_enabled: bool,

    /// Seconds between scheduler scans (default: 3600)
    pub scheduler_interval_secs: u64,

    /// Look-ahead window for due-soon reminders in hours (default: 12)
    pub scheduler_lookahead_hours: i64,

    /// Per-invocation timeout for pub/sub handlers in milliseconds (default: 5000)
    pub broker_handler_timeout_ms: u64,

    /// Queue capacity per pub/sub subscriber (default: 64)
    pub broker_queue_capacity: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: non_empty_var("REDIS_URL"),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20", "u32")?,
            api_port: parse_var("API_PORT", "3000", "u16")?,
            line_channel_access_token: non_empty_var("LINE_CHANNEL_ACCESS_TOKEN"),
            line_api_base_url: std::env::var("LINE_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.line.me".to_string()),
            webhook_url: non_empty_var("WEBHOOK_URL"),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            gateway_timeout_secs: parse_var("GATEWAY_TIMEOUT_SECS", "10", "u64")?,
            scheduler_enabled: parse_var("SCHEDULER_ENABLED", "true", "bool")?,
            scheduler_interval_secs: parse_var("SCHEDULER_INTERVAL_SECS", "3600", "u64")?,
            scheduler_lookahead_hours: parse_var("SCHEDULER_LOOKAHEAD_HOURS", "12", "i64")?,
            broker_handler_timeout_ms: parse_var("BROKER_HANDLER_TIMEOUT_MS", "5000", "u64")?,
            broker_queue_capacity: parse_var("BROKER_QUEUE_CAPACITY", "64", "usize")?,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str, kind: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a valid {}", name, kind))
}
