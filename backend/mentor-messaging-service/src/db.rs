use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::error::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connect, verify with `SELECT 1`, and optionally run migrations.
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| AppError::Config("DATABASE_URL missing".into()))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(url)
        .await?;

    match tokio::time::timeout(
        Duration::from_secs(config.acquire_timeout_secs),
        sqlx::query("SELECT 1").execute(&pool),
    )
    .await
    {
        Ok(Ok(_)) => info!(
            max_connections = config.max_connections,
            "database pool created and verified"
        ),
        Ok(Err(e)) => {
            error!(error = %e, "database connection verification failed");
            return Err(e.into());
        }
        Err(_) => {
            error!(
                timeout_secs = config.acquire_timeout_secs,
                "database connection verification timed out"
            );
            return Err(AppError::StoreUnavailable(
                "database verification timeout".into(),
            ));
        }
    }

    if config.run_migrations {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| AppError::Config(format!("migration failed: {e}")))?;
        info!("database migrations applied");
    }

    Ok(pool)
}
