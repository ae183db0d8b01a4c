//! Database pool construction. Kept to one function so the composition root
//! has a single place to reason about connection limits and timeouts.

use std::time::Duration;

use callhub_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(AppError::internal)
}
