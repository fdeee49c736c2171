//! Error types for the violation reporter.

use thiserror::Error;

/// Result type alias for reporter operations.
pub type Result<T> = std::result::Result<T, ReporterError>;

/// Errors raised while queueing or forwarding reports.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The report queue is at capacity; the report was dropped.
    #[error("report queue full ({capacity} pending), report dropped")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The forwarder has shut down.
    #[error("report queue closed")]
    QueueClosed,

    /// HTTP transport failure (connect, timeout, body decode).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The collector answered with a non-success status.
    #[error("collector responded with HTTP {0}")]
    Status(u16),
}
