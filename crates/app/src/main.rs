/// Business Directory Backend Application
///
/// This is the main entry point for the business directory service.
/// The application exposes REST API endpoints for creating online and
/// physical businesses, fetching a business with its review aggregates,
/// and attaching customer reviews.
///
/// # Architecture
///
/// The application follows a modular architecture with:
/// - Repository layer for data access (in-memory or PostgreSQL)
/// - Service layer for business-rule validation
/// - HTTP layer for routing and response mapping
/// - Metrics for monitoring
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use app_config::AppConfig;
use repository::{MemoryBusinessRepository, PgBusinessRepository};
use server::Server;
use service::{BusinessService, BusinessServiceImpl};

/// Initialize the tracing subscriber for logging
fn init_logger() -> Result<()> {
    tracing_subscriber::fmt::init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = init_logger() {
        eprintln!("Failed to initialize logger: {}", err);
        return Err(anyhow::anyhow!("Failed to initialize logger"));
    }

    info!("Business directory backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    let service: Arc<dyn BusinessService> = match config.storage_backend.as_str() {
        "memory" => {
            info!("Using in-memory repository");
            Arc::new(BusinessServiceImpl::new(MemoryBusinessRepository::new()))
        }
        "postgres" => {
            let db_pool = db::init_db_pool(&config)
                .await
                .context("Failed to initialize database")?;
            info!("Database initialized successfully");
            Arc::new(BusinessServiceImpl::new(PgBusinessRepository::new(db_pool)))
        }
        other => {
            return Err(anyhow::anyhow!("Unknown storage backend: {other}"));
        }
    };

    let http_port = config.http_port.to_string();
    info!("Using HTTP port: {}", http_port);

    let http_server = Server::new(http_port, service);
    http_server.start().await?;

    info!("Application stopped");
    Ok(())
}
