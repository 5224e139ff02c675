//! Error types for the daraja pacing bridge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Timed out connecting to {endpoint} after {ms}ms")]
    ConnectTimeout { endpoint: String, ms: u64 },

    #[error("Malformed inbound message: {0}")]
    MalformedMessage(String),

    #[error("Insufficient buffered data: requested {requested}, available {available}")]
    InsufficientData { requested: usize, available: usize },

    #[error("Audio buffer capacity of {capacity} bytes exceeded")]
    BufferOverflow { capacity: usize },

    #[error("Invalid scheduler state: {0}")]
    InvalidState(String),

    #[error("Text to synthesize must not be empty")]
    EmptyText,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
