use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::errors::PersistenceError;

/// Connects to the score database and brings its schema up to date.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to score database...");

    // one pipeline pass writes sequentially; the CLI read commands need even less
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .context("Could not connect to DATABASE_URL")?;

    run_migrations(&pool).await?;
    info!("Score database ready");
    Ok(pool)
}

/// Applies the versioned `cv_scores` schema.
pub async fn run_migrations(pool: &PgPool) -> Result<(), PersistenceError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
