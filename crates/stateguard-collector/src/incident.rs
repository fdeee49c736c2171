//! Incident formatting, escalation and the append-only incident log.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use stateguard_reporter::ViolationReport;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::error::{CollectorError, Result};

const SEPARATOR: &str = "------------------------------------------";

/// One processed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    /// Address the incident is attributed to.
    pub ip: String,
    /// Formatted multi-line log entry.
    pub entry: String,
    /// Whether the attempt count crossed the escalation threshold.
    pub escalated: bool,
}

/// Picks the address to attribute a report to: the connection peer, then
/// the client-reported address, then `"unknown"`.
pub fn resolve_ip(peer: Option<SocketAddr>, report: &ViolationReport) -> String {
    match peer {
        Some(addr) => addr.ip().to_string(),
        None if !report.client_ip.is_empty() => report.client_ip.clone(),
        None => "unknown".to_string(),
    }
}

/// Formats the log entry for a report.
pub fn format_entry(report: &ViolationReport, ip: &str) -> String {
    format!(
        "[{}] SECURITY ALERT\nIP: {}\nUser-Agent: {}\nElement: <{} id=\"{}\">\nAttempts: {}\n{}",
        report.timestamp,
        ip,
        report.user_agent,
        report.element_tag,
        report.element_id,
        report.attempts,
        SEPARATOR
    )
}

/// Append-only incident log.
///
/// Appends are serialized so concurrent requests never interleave entries.
#[derive(Debug)]
pub struct IncidentLog {
    path: PathBuf,
    escalation_threshold: i64,
    write_lock: Mutex<()>,
}

impl IncidentLog {
    /// Creates a log writing to `path`.
    pub fn new(path: impl Into<PathBuf>, escalation_threshold: i64) -> Self {
        Self {
            path: path.into(),
            escalation_threshold,
            write_lock: Mutex::new(()),
        }
    }

    /// Log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formats and classifies a report without side effects.
    pub fn assess(&self, report: &ViolationReport, ip: String) -> Incident {
        Incident {
            entry: format_entry(report, &ip),
            escalated: report.attempts > self.escalation_threshold,
            ip,
        }
    }

    /// Appends `entry` and a trailing newline to the log file.
    ///
    /// # Errors
    ///
    /// [`CollectorError::LogWrite`] if the file cannot be opened or written.
    pub async fn append(&self, entry: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let write = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(format!("{entry}\n").as_bytes()).await?;
            file.flush().await
        };
        write.await.map_err(|source| CollectorError::LogWrite {
            path: self.path.clone(),
            source,
        })
    }

    /// Logs, persists and escalates a report.
    ///
    /// Persistence is best effort: a failed append is logged at error level
    /// and the incident is still returned.
    pub async fn record(&self, report: &ViolationReport, ip: String) -> Incident {
        let incident = self.assess(report, ip);
        warn!("{}", incident.entry);

        if let Err(e) = self.append(&incident.entry).await {
            error!(error = %e, "Failed to write to security log");
        }

        if incident.escalated {
            error!(
                "!!! CRITICAL: High-frequency tampering detected from {} !!!",
                incident.ip
            );
        }
        incident
    }
}
