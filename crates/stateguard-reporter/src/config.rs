//! Reporter configuration.

use serde::{Deserialize, Serialize};

use crate::report::{ClientContext, VIOLATION_PATH};

/// Default collector base URL.
pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:3000";

/// Default bound on queued, not yet forwarded reports.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration for [`crate::Reporter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReporterConfig {
    /// Collector base URL, without the endpoint path.
    pub collector_url: String,
    /// User agent stamped onto reports and sent as the HTTP header.
    pub user_agent: String,
    /// Client address stamped onto reports.
    pub client_ip: String,
    /// Maximum number of queued reports.
    pub queue_capacity: usize,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            user_agent: concat!("stateguard/", env!("CARGO_PKG_VERSION")).to_string(),
            client_ip: String::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout_ms: 5_000,
        }
    }
}

impl ReporterConfig {
    /// Sets the collector base URL.
    pub fn with_collector_url(mut self, url: impl Into<String>) -> Self {
        self.collector_url = url.into();
        self
    }

    /// Sets the reported user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the reported client address.
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }

    /// Sets the queue capacity (at least 1).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Full URL of the violation endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.collector_url.trim_end_matches('/'), VIOLATION_PATH)
    }

    pub(crate) fn context(&self) -> ClientContext {
        ClientContext {
            user_agent: self.user_agent.clone(),
            client_ip: self.client_ip.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        let config = ReporterConfig::default().with_collector_url("https://audit.example/");
        assert_eq!(config.endpoint(), "https://audit.example/api/security/violation");
        assert_eq!(
            ReporterConfig::default().endpoint(),
            "http://127.0.0.1:3000/api/security/violation"
        );
    }

    #[test]
    fn test_capacity_clamped() {
        assert_eq!(ReporterConfig::default().with_queue_capacity(0).queue_capacity, 1);
    }

    #[test]
    fn test_partial_json() {
        let config: ReporterConfig =
            serde_json::from_str(r#"{"collectorUrl":"http://collector:8080","queueCapacity":8}"#)
                .unwrap();
        assert_eq!(config.collector_url, "http://collector:8080");
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.timeout_ms, 5_000);
    }
}
