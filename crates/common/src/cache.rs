use redis::Client;
use redis::aio::ConnectionManager;

/// Connect to Redis when a URL is configured.
///
/// Returns `None` without a URL; callers fall back to in-process state.
pub async fn connect_optional(redis_url: Option<&str>) -> anyhow::Result<Option<ConnectionManager>> {
    let Some(url) = redis_url else {
        tracing::info!("REDIS_URL not set, using in-memory reminder ledger");
        return Ok(None);
    };

    let manager = ConnectionManager::new(Client::open(url)?).await?;
    tracing::info!("Connected to Redis");
    Ok(Some(manager))
}
