use anyhow::{Context, Result};
use serde::Deserialize;

/// `AppConfig` holds all configuration parameters required by the service.
///
/// The configuration is loaded from environment variables (optionally via a
/// `.env` file) or falls back to defaults suitable for local runs. Fields
/// cover the storage backend selection, database connection, and the HTTP
/// server. This struct is deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    // --- Storage backend ---
    /// Which repository backs the directory: "memory" or "postgres".
    pub storage_backend: String,

    // --- Database settings (used when storage_backend = "postgres") ---
    /// Database hostname or service name.
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from a
    /// `.env` file). Fields not set via env fall back to defaults.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid, in which case
    /// startup must abort with a non-zero exit.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Storage
            .set_default("storage_backend", "memory")?
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "directory_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "directory_db")?
            // HTTP
            .set_default("http_port", 8081)?
            .add_source(config::Environment::default())
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }
}
