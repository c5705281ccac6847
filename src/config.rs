//! Application configuration

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::database::UpsertPolicy;
use crate::errors::AisTrackerError;

pub const DEFAULT_STREAM_URL: &str = "wss://stream.aisstream.io/v0/stream";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub maintenance: MaintenanceConfig,
}

/// Upstream feed connection settings
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub api_key: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub reconnect_delay: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub heartbeat_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub pong_timeout: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub connect_timeout: Duration,
    /// Upper bound for processing one inbound message
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub handler_timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout` for every pooled connection
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub statement_timeout: Duration,
    #[serde(default)]
    pub upsert_policy: UpsertPolicy,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Maximum age of a position for it to appear in query results
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub freshness_window: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceConfig {
    /// Rows not updated within this age are deleted
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub max_age: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub interval: Duration,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("stream.url", DEFAULT_STREAM_URL)?
            .set_default("stream.reconnect_delay", 10)?
            .set_default("stream.heartbeat_interval", 30)?
            .set_default("stream.pong_timeout", 10)?
            .set_default("stream.connect_timeout", 10)?
            .set_default("stream.handler_timeout", 10)?
            .set_default("database.max_connections", 5)?
            .set_default("database.acquire_timeout", 5)?
            .set_default("database.statement_timeout", 5)?
            .set_default("server.bind_address", "0.0.0.0:3000")?
            .set_default("server.freshness_window", 120)?
            .set_default("maintenance.max_age", 3600)?
            .set_default("maintenance.interval", 900)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("AISTRACKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), AisTrackerError> {
        self.stream.validate()?;
        self.database.validate()?;
        non_zero("server.freshness_window", self.server.freshness_window)?;
        non_zero("maintenance.max_age", self.maintenance.max_age)?;
        non_zero("maintenance.interval", self.maintenance.interval)?;
        Ok(())
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), AisTrackerError> {
        if self.api_key.trim().is_empty() {
            return Err(AisTrackerError::ConfigurationError {
                message: "Stream API key is required".to_string(),
            });
        }
        if self.url.trim().is_empty() {
            return Err(AisTrackerError::ConfigurationError {
                message: "Stream URL cannot be empty".to_string(),
            });
        }
        non_zero("stream.reconnect_delay", self.reconnect_delay)?;
        non_zero("stream.heartbeat_interval", self.heartbeat_interval)?;
        non_zero("stream.pong_timeout", self.pong_timeout)?;
        non_zero("stream.connect_timeout", self.connect_timeout)?;
        non_zero("stream.handler_timeout", self.handler_timeout)?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), AisTrackerError> {
        if self.url.trim().is_empty() {
            return Err(AisTrackerError::ConfigurationError {
                message: "Database URL cannot be empty".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(AisTrackerError::ConfigurationError {
                message: "Database max_connections must be greater than zero".to_string(),
            });
        }
        non_zero("database.acquire_timeout", self.acquire_timeout)?;
        non_zero("database.statement_timeout", self.statement_timeout)
    }
}

fn non_zero(name: &str, value: Duration) -> Result<(), AisTrackerError> {
    if value.is_zero() {
        return Err(AisTrackerError::ConfigurationError {
            message: format!("{} must be greater than zero", name),
        });
    }
    Ok(())
}
