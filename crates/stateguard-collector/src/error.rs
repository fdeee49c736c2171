//! Error types for the collector.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors raised by the collector server.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The server loop exited with an error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// An incident could not be appended to the log file.
    #[error("failed to write incident log {path}: {source}")]
    LogWrite {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
