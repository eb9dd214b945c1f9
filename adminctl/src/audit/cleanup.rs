//! Periodic pruning of the operation log.

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{config::OperationLogConfig, db::handlers::OperationLogs, errors::Error};

/// Delete everything but the newest `retain_count` rows once. Returns the number deleted.
pub async fn prune_once(pool: &PgPool, config: &OperationLogConfig) -> Result<u64, Error> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = OperationLogs::new(&mut conn).retain_newest(config.effective_retain_count()).await?;
    Ok(deleted)
}

/// Prune on `config.cleanup_interval` until `shutdown` fires. The first run happens one interval
/// after startup.
pub async fn run_cleanup_task(pool: PgPool, config: OperationLogConfig, shutdown: CancellationToken) {
    info!(
        interval = %humantime::format_duration(config.cleanup_interval),
        retain = config.effective_retain_count(),
        "Starting operation log cleanup task"
    );

    let mut interval = tokio::time::interval(config.cleanup_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.cancelled() => {
                info!("Operation log cleanup task shutting down");
                return;
            }
        }

        match prune_once(&pool, &config).await {
            Ok(0) => debug!("Operation log cleanup found nothing to delete"),
            Ok(deleted) => info!(deleted, "Pruned operation log"),
            Err(e) => error!("Operation log cleanup failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    #[tokio::test]
    async fn test_task_stops_on_shutdown() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(100))
            .connect_lazy("postgres://localhost:1/adminctl_unused")
            .unwrap();
        let config = OperationLogConfig {
            cleanup_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_cleanup_task(pool, config, shutdown.clone()));
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
