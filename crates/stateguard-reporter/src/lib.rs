//! # StateGuard Reporter
//!
//! Ships guard violations to a remote collector without blocking the
//! notification handler.
//!
//! ## Threat Model
//!
//! | Concern | Handling |
//! |---------|----------|
//! | Slow or down collector | Reports are queued; the handler never awaits I/O |
//! | Report flood | Bounded queue; overflow is dropped and counted |
//! | Evidence loss on the client | Reports leave the client as soon as the forwarder runs |
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stateguard_core::{GuardOptions, MemoryDocument, Registry};
//! use stateguard_reporter::{Reporter, ReporterConfig};
//!
//! # async fn run() -> Result<(), stateguard_reporter::ReporterError> {
//! let (queue, forwarder) = Reporter::new(
//!     ReporterConfig::default().with_collector_url("http://127.0.0.1:3000"),
//! )?;
//! let forwarding = tokio::spawn(forwarder.run());
//!
//! let doc = Arc::new(MemoryDocument::new());
//! let registry = Registry::new(Arc::clone(&doc));
//! registry.protect("#checkout", GuardOptions::new().with_callback(queue.callback()));
//!
//! drop(registry);
//! drop(queue);
//! let _stats = forwarding.await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod queue;
mod report;

pub use config::{ReporterConfig, DEFAULT_COLLECTOR_URL, DEFAULT_QUEUE_CAPACITY};
pub use error::{ReporterError, Result};
pub use queue::{ForwardStats, Forwarder, ReportQueue, Reporter};
pub use report::{ClientContext, CollectorAck, ViolationReport, VIOLATION_PATH};
