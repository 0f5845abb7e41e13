//! Database migration runner.

use sqlx::SqlitePool;
use tracing::info;

use canopy_core::error::{AppError, ErrorKind};

/// Run all pending database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    info!("Running database migrations...");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Database migrations completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabasePool;
    use canopy_core::config::DatabaseConfig;

    #[tokio::test]
    async fn test_migrations_create_tree_tables() {
        let db = DatabasePool::connect(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        run_migrations(db.pool()).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name IN ('content', 'location', 'path', 'trash') ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert_eq!(tables, vec!["content", "location", "path", "trash"]);
    }
}
