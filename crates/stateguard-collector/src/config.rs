//! Collector configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default incident log file.
pub const DEFAULT_LOG_FILE: &str = "tamper-incidents.log";

/// Reports with more attempts than this are escalated.
pub const DEFAULT_ESCALATION_THRESHOLD: i64 = 10;

/// Configuration for the collector server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectorConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Incident log file.
    pub log_file: PathBuf,
    /// Attempts above this value trigger a critical alert.
    pub escalation_threshold: i64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }
}

impl CollectorConfig {
    /// Reads `PORT` and `STATEGUARD_LOG_FILE` from the environment.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(port) = lookup("PORT").and_then(|v| v.trim().parse().ok()) {
            config.port = port;
        }
        if let Some(path) = lookup("STATEGUARD_LOG_FILE").filter(|v| !v.is_empty()) {
            config.log_file = PathBuf::from(path);
        }
        config
    }

    /// Sets the bind host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the bind port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the incident log file.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Sets the escalation threshold.
    pub fn with_escalation_threshold(mut self, threshold: i64) -> Self {
        self.escalation_threshold = threshold;
        self
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
