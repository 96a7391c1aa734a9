//! Configuration management for the resale stock server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with STOCK_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Which store backs the engine
    pub storage: StorageKind,

    /// Sale history paging
    pub sales: SalesConfig,

    /// Allowed CORS origins
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Postgres,
    /// Process-local store; data is lost on restart
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SalesConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorsConfig {
    /// Empty means any origin
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCK_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "postgres://localhost/resale_stock")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("storage", "postgres")?
            .set_default("sales.default_page_size", 10)?
            .set_default("sales.max_page_size", 100)?
            .set_default("cors.allow_origins", Vec::<String>::new())?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCK_ prefix)
            .add_source(
                Environment::with_prefix("STOCK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allow_origins")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/resale_stock".to_string(),
                max_connections: 10,
                min_connections: 2,
                acquire_timeout_secs: 30,
            },
            storage: StorageKind::Memory,
            sales: SalesConfig {
                default_page_size: 10,
                max_page_size: 100,
            },
            cors: CorsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}
