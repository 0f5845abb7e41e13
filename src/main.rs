//! Canopy server: content tree store
//!
//! Main entry point that wires the crates together, starts the trash
//! reaper, and waits for a shutdown signal.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use canopy_core::config::AppConfig;
use canopy_core::error::AppError;
use canopy_database::DatabasePool;
use canopy_database::query::QueryExtensions;
use canopy_service::Repo;
use canopy_worker::{CronScheduler, TrashReaper};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("CANOPY_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.is_json() {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Canopy v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database file location ───────────────────────────
    create_data_directory(&config).await?;

    // ── Step 2: Database connection + migrations ─────────────────
    let db = DatabasePool::connect(&config.database).await?;
    canopy_database::migration::run_migrations(db.pool()).await?;

    // ── Step 3: Content repository ───────────────────────────────
    let repo = Repo::new(db.clone(), QueryExtensions::new(), &config.cache);
    if !repo.health_check().await? {
        return Err(AppError::database("Database health check failed"));
    }

    // ── Step 4: Trash reaper ─────────────────────────────────────
    let mut scheduler = CronScheduler::new().await?;
    let reaper = TrashReaper::new(Arc::new(repo.trash()));
    scheduler.register_default_tasks(&config.trash, reaper).await?;
    scheduler.start().await?;

    tracing::info!("Canopy ready");

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    scheduler.shutdown().await?;
    db.close().await;

    tracing::info!("Canopy shut down gracefully");
    Ok(())
}

/// Create the directory holding the SQLite file
async fn create_data_directory(config: &AppConfig) -> Result<(), AppError> {
    let Some(dir) = config.database.file_path().and_then(|p| p.parent().map(|d| d.to_path_buf()))
    else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() {
        return Ok(());
    }

    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        AppError::with_source(
            canopy_core::error::ErrorKind::Configuration,
            format!("Failed to create dir '{}'", dir.display()),
            e,
        )
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
