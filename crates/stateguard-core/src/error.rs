//! Error types for StateGuard core.

use thiserror::Error;

/// Core error type for guard configuration.
///
/// Guard and registry operations themselves do not fail: an empty selector
/// protects nothing and stale access is a no-op. Errors only arise while
/// decoding configuration.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Attribute filter keyword was neither `"all"` nor a list of names.
    #[error("invalid attribute filter: {0:?} (expected \"all\" or a list of names)")]
    InvalidAttributeFilter(String),

    /// Configuration document could not be decoded.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}
