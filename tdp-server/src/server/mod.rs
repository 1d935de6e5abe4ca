pub mod app;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

use anyhow::Result;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tdp::database::{establish_connection, get_database_url, Migrator};
use tdp::{AppContext, BackupConfig};
use tracing::info;

/// Connect to the database and bring its schema up to date.
pub async fn open_database(database_path: &str) -> Result<DatabaseConnection> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    Migrator::up(&db, None).await?;
    info!("Database migrations completed");
    Ok(db)
}

pub async fn open_context(database_path: &str, config: BackupConfig) -> Result<AppContext> {
    let db = open_database(database_path).await?;
    Ok(AppContext::new(db, config))
}

pub async fn start_server(
    port: u16,
    database_path: &str,
    cors_origin: Option<&str>,
    config: BackupConfig,
) -> Result<()> {
    info!("Media root: {}", config.media_root.display());
    let context = open_context(database_path, config).await?;

    let app = app::create_app(context, cors_origin).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  GET  /health                               - Health check");
    info!("  GET  /api/v1/backup/export                 - Download a backup archive");
    info!("  POST /api/v1/backup/restore                - Upload an archive to restore");
    info!("  GET  /api/v1/backup/restore                - List your restore tasks");
    info!("  GET  /api/v1/backup/restore/:task_id       - Restore task status");
    info!("  POST /api/v1/backup/restore/:task_id/cancel - Cancel a restore");
    info!("  GET  /ws/restore/:task_id                  - Live restore progress (WebSocket)");
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Dropping all tables and running migrations from scratch");
            Migrator::fresh(&db).await?;
        }
    }

    info!("Migrations completed");
    Ok(())
}
