//! Error types for the pipeline.

use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum EltError {
    /// The holiday feed answered with a non-success status.
    #[error("Holiday feed error: {url} returned HTTP {status}")]
    Feed { status: u16, url: String },

    /// The holiday feed payload did not have the expected shape.
    #[error("Holiday feed payload error: {0}")]
    FeedPayload(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV read error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database statement error.
    #[error("Database error: {0}")]
    Database(String),

    /// A catalog entry failed to execute.
    #[error("Query '{name}' failed: {message}")]
    Query { name: String, message: String },

    /// A required column is absent from a table.
    #[error("Missing column '{column}' in table '{table}'")]
    MissingColumn { table: String, column: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EltError {
    /// Create a per-entry query error.
    pub fn query(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Query {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing column error.
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl From<sqlx::Error> for EltError {
    fn from(e: sqlx::Error) -> Self {
        EltError::Database(e.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type EltResult<T> = Result<T, EltError>;
