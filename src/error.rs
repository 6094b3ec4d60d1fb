// src/error.rs

use thiserror::Error;

/// Core error types for modtool
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON (metadata files, registry responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested item does not exist (registry or disk)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Download or registry transfer failed
    #[error("Download error: {0}")]
    Download(String),

    /// Unparseable input (versions, requirements, timestamps)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Archive could not be unpacked or installed
    #[error("Archive error: {0}")]
    Archive(String),

    /// No release satisfies the active constraints
    #[error("Unsatisfiable constraints: {0}")]
    Unsatisfiable(String),
}

/// Result type alias using modtool's Error type
pub type Result<T> = std::result::Result<T, Error>;
