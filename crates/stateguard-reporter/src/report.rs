//! Wire format shared by the reporter and the collector.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use stateguard_core::Element;

/// Path the collector serves violation reports on.
pub const VIOLATION_PATH: &str = "/api/security/violation";

/// A tamper report for one element.
///
/// Decoding is lenient: absent or `null` fields take their default, other
/// scalars are stringified, and `attempts` also accepts a numeric string.
///
/// # Example
///
/// ```rust
/// use stateguard_reporter::ViolationReport;
///
/// let report: ViolationReport = serde_json::from_str(
///     r#"{"elementId":"btn","elementTag":"button","attempts":3}"#,
/// )?;
/// assert_eq!(report.attempts, 3);
/// assert!(report.user_agent.is_empty());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViolationReport {
    /// `id` attribute of the element, empty if it has none.
    #[serde(deserialize_with = "lenient_string")]
    pub element_id: String,
    /// Tag name of the element.
    #[serde(deserialize_with = "lenient_string")]
    pub element_tag: String,
    /// Violation count at the time of the report.
    #[serde(deserialize_with = "lenient_count")]
    pub attempts: i64,
    /// RFC 3339 time the report was built.
    #[serde(deserialize_with = "lenient_string")]
    pub timestamp: String,
    /// Client user agent.
    #[serde(deserialize_with = "lenient_string")]
    pub user_agent: String,
    /// Client address as seen by the client.
    #[serde(deserialize_with = "lenient_string")]
    pub client_ip: String,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let count = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    };
    Ok(count.unwrap_or(0))
}

/// Client details stamped onto every report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    /// Reported user agent.
    pub user_agent: String,
    /// Reported client address.
    pub client_ip: String,
}

impl ViolationReport {
    /// Decodes a request body, falling back to an empty report if it is
    /// not a JSON object.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Builds a report for `element` stamped with the current time.
    pub fn from_element<E: Element>(element: &E, attempts: u32, context: &ClientContext) -> Self {
        Self::from_element_at(element, attempts, context, Utc::now())
    }

    /// Builds a report for `element` stamped with `at`.
    pub fn from_element_at<E: Element>(
        element: &E,
        attempts: u32,
        context: &ClientContext,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            element_id: element.attribute("id").unwrap_or_default(),
            element_tag: element.tag_name(),
            attempts: i64::from(attempts),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            user_agent: context.user_agent.clone(),
            client_ip: context.client_ip.clone(),
        }
    }
}

/// Acknowledgement returned by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorAck {
    /// Always `"received"`.
    pub status: String,
    /// Always `"logged"`.
    pub action: String,
}

impl CollectorAck {
    /// The acknowledgement the collector sends for every report.
    pub fn logged() -> Self {
        Self {
            status: "received".to_string(),
            action: "logged".to_string(),
        }
    }
}
