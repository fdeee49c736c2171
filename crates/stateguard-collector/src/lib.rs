//! # StateGuard Collector
//!
//! Server-side endpoint that receives tamper reports, writes them to an
//! append-only incident log and escalates high-frequency tampering.
//!
//! ## Endpoint
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/api/security/violation` | [`ViolationReport`] JSON | `200 {"status":"received","action":"logged"}` |
//!
//! ## Escalation
//!
//! Reports with `attempts` above the threshold (default 10) additionally
//! emit a critical error line naming the source address.
//!
//! # Example
//!
//! ```rust,no_run
//! use stateguard_collector::{serve, CollectorConfig};
//!
//! # async fn run() -> Result<(), stateguard_collector::CollectorError> {
//! serve(CollectorConfig::from_env().with_port(8080)).await
//! # }
//! ```
//!
//! [`ViolationReport`]: stateguard_reporter::ViolationReport

mod config;
mod error;
mod incident;
mod router;
mod server;

pub use config::{
    CollectorConfig, DEFAULT_ESCALATION_THRESHOLD, DEFAULT_LOG_FILE, DEFAULT_PORT,
};
pub use error::{CollectorError, Result};
pub use incident::{format_entry, resolve_ip, Incident, IncidentLog};
pub use router::{build_router, CollectorState};
pub use server::{serve, serve_on, serve_with_shutdown};
