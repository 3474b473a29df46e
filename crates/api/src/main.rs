//! Taskbell API server binary entrypoint.
//!
//! Also hosts the due-date scheduler, since in-app delivery goes through the
//! in-process broker that live streams subscribe to.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use taskbell_common::cache::connect_optional;
use taskbell_common::config::AppConfig;
use taskbell_common::db::connect_and_migrate;
use taskbell_engine::NotificationOrchestrator;
use taskbell_engine::postgres::{PgNotificationRepository, PgTaskSource, PgUserDirectory};
use taskbell_notifier::Gateways;
use taskbell_notifier::broker::{Broker, BrokerConfig};
use taskbell_notifier::realtime::RealtimePublisher;
use taskbell_scheduler::ledger::{InMemoryReminderLedger, RedisReminderLedger, ReminderLedger};
use taskbell_scheduler::{DueDateScheduler, SchedulerConfig};

use taskbell_api::routes::create_router;
use taskbell_api::state::AppState;

const DEFAULT_LOG_FILTER: &str = "taskbell_api=debug,taskbell_engine=debug,taskbell_scheduler=info,taskbell_notifier=info,tower_http=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if log_format_is_json(std::env::var("LOG_FORMAT").ok().as_deref()) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn log_format_is_json(format: Option<&str>) -> bool {
    format.is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loads `.env` first, so LOG_FORMAT and RUST_LOG set there reach the subscriber.
    let config = AppConfig::from_env()?;
    init_tracing();

    tracing::info!("Starting Taskbell API server...");

    let pool = connect_and_migrate(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database ready");

    let redis = connect_optional(config.redis_url.as_deref()).await?;

    let broker = Broker::new(BrokerConfig {
        queue_capacity: config.broker_queue_capacity,
        handler_timeout: Duration::from_millis(config.broker_handler_timeout_ms),
    });
    let publisher = RealtimePublisher::new(broker);
    let gateways = Gateways::from_config(&config, publisher.clone())?;

    let orchestrator = Arc::new(NotificationOrchestrator::new(
        Arc::new(PgNotificationRepository::new(pool.clone())),
        Arc::new(PgUserDirectory::new(pool.clone())),
        gateways,
    ));

    let scheduler = if config.scheduler_enabled {
        let ledger: Arc<dyn ReminderLedger> = match redis {
            Some(conn) => Arc::new(RedisReminderLedger::new(conn)),
            None => Arc::new(InMemoryReminderLedger::new()),
        };
        let scheduler = Arc::new(DueDateScheduler::new(
            Arc::new(PgTaskSource::new(pool.clone())),
            orchestrator.clone(),
            ledger,
            SchedulerConfig {
                interval: Duration::from_secs(config.scheduler_interval_secs),
                lookahead: chrono::Duration::hours(config.scheduler_lookahead_hours),
                ..SchedulerConfig::default()
            },
        ));
        let handle = scheduler.start()?;
        Some((scheduler, handle))
    } else {
        tracing::info!("Due-date scheduler disabled");
        None
    };

    let shutdown = CancellationToken::new();
    let state = AppState::new(orchestrator, publisher, shutdown.clone());

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Some((scheduler, handle)) = scheduler {
        scheduler.stop()?;
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C, cancelling `shutdown` so streams and sends wind down.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_switch() {
        assert!(log_format_is_json(Some("json")));
        assert!(log_format_is_json(Some(" JSON\n")));
        assert!(!log_format_is_json(Some("pretty")));
        assert!(!log_format_is_json(None));
    }
}
