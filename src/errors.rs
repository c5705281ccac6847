//! Errors for AIS tracker
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AisTrackerError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("WebSocket handshake rejected with HTTP status {status}")]
    HandshakeRejected { status: u16 },

    #[error("Connection attempt timed out")]
    ConnectTimeout,

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Invalid MMSI: {0}")]
    InvalidMmsi(String),

    #[error("Invalid position: lat {latitude}, lon {longitude}")]
    InvalidPosition { latitude: f64, longitude: f64 },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Message body missing for type {0}")]
    MissingMessageBody(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}
