//! Non-blocking report queue and HTTP forwarder.
//!
//! The guard's violation callback runs inside the host's notification
//! handler and must never wait on the network. [`ReportQueue`] therefore only
//! performs a `try_send` onto a bounded channel; [`Forwarder`] owns the
//! receiving side and does the HTTP work on the async runtime.
//!
//! ```text
//!  notification handler            tokio task
//!  ────────────────────            ──────────
//!  ViolationCallback ──try_send──► mpsc ──► Forwarder::run ──POST──► collector
//!        │
//!        └── queue full: drop + warn
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stateguard_core::{Element, ViolationCallback};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::config::ReporterConfig;
use crate::error::{ReporterError, Result};
use crate::report::{ClientContext, CollectorAck, ViolationReport};

/// Entry point for building a queue/forwarder pair.
pub struct Reporter;

impl Reporter {
    /// Creates a bounded queue and the forwarder that drains it.
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: ReporterConfig) -> Result<(ReportQueue, Forwarder)> {
        let capacity = config.queue_capacity.max(1);
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        let (tx, rx) = mpsc::channel(capacity);

        let queue = ReportQueue {
            tx,
            capacity,
            context: config.context(),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let forwarder = Forwarder {
            rx,
            client,
            endpoint: config.endpoint(),
        };
        Ok((queue, forwarder))
    }
}

/// Sending half of the report channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReportQueue {
    tx: mpsc::Sender<ViolationReport>,
    capacity: usize,
    context: ClientContext,
    dropped: Arc<AtomicU64>,
}

impl ReportQueue {
    /// Enqueues a report without waiting.
    ///
    /// # Errors
    ///
    /// [`ReporterError::QueueFull`] when at capacity, [`ReporterError::QueueClosed`]
    /// once the forwarder is gone. Either way the report is dropped.
    pub fn submit(&self, report: ViolationReport) -> Result<()> {
        match self.tx.try_send(report) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(ReporterError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(ReporterError::QueueClosed)
            }
        }
    }

    /// Builds a violation callback that reports every invocation.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use stateguard_core::{GuardOptions, MemoryElement};
    /// use stateguard_reporter::{Reporter, ReporterConfig};
    ///
    /// # async fn run() -> Result<(), stateguard_reporter::ReporterError> {
    /// let (queue, forwarder) = Reporter::new(ReporterConfig::default())?;
    /// tokio::spawn(forwarder.run());
    ///
    /// let options = GuardOptions::<MemoryElement>::new().with_callback(queue.callback());
    /// # Ok(())
    /// # }
    /// ```
    pub fn callback<E: Element>(&self) -> ViolationCallback<E> {
        let queue = self.clone();
        Arc::new(move |element: &E, attempts: u32| {
            let report = ViolationReport::from_element(element, attempts, &queue.context);
            let element_id = report.element_id.clone();
            match queue.submit(report) {
                Ok(()) => debug!(element = %element_id, attempts, "violation report queued"),
                Err(e) => warn!(element = %element_id, attempts, error = %e, "violation report dropped"),
            }
        })
    }

    /// Number of reports dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Outcome counters of a finished [`Forwarder::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Reports acknowledged by the collector.
    pub forwarded: u64,
    /// Reports that failed in transport or got a non-success status.
    pub failed: u64,
}

/// Receiving half of the report channel; posts reports to the collector.
#[derive(Debug)]
pub struct Forwarder {
    rx: mpsc::Receiver<ViolationReport>,
    client: reqwest::Client,
    endpoint: String,
}

impl Forwarder {
    /// Endpoint URL reports are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Drains the queue until every [`ReportQueue`] clone is dropped.
    ///
    /// Failures are logged and counted; they never stop the loop.
    pub async fn run(mut self) -> ForwardStats {
        let mut stats = ForwardStats::default();
        while let Some(report) = self.rx.recv().await {
            match self.send(&report).await {
                Ok(_) => {
                    stats.forwarded += 1;
                    debug!(element = %report.element_id, attempts = report.attempts, "violation report delivered");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(element = %report.element_id, error = %e, "violation report not delivered");
                }
            }
        }
        debug!(forwarded = stats.forwarded, failed = stats.failed, "report queue closed");
        stats
    }

    /// Posts a single report.
    ///
    /// # Errors
    ///
    /// [`ReporterError::Transport`] on connect/timeout/decode failures and
    /// [`ReporterError::Status`] on a non-success response.
    pub async fn send(&self, report: &ViolationReport) -> Result<CollectorAck> {
        let response = self.client.post(&self.endpoint).json(report).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReporterError::Status(status.as_u16()));
        }
        Ok(response.json::<CollectorAck>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateguard_core::{GuardOptions, MemoryDocument, MemoryElement, Registry};

    fn config(capacity: usize) -> ReporterConfig {
        ReporterConfig::default()
            .with_user_agent("test-agent")
            .with_client_ip("192.0.2.4")
            .with_queue_capacity(capacity)
    }

    #[tokio::test]
    async fn test_callback_enqueues_report() {
        let (queue, mut forwarder) = Reporter::new(config(4)).unwrap();

        let doc = Arc::new(MemoryDocument::new());
        let button = doc.create_element("button");
        button.set_attribute("id", "btn");
        button.set_attribute("disabled", "");

        let registry = Registry::new(Arc::clone(&doc));
        registry.protect(
            "#btn",
            GuardOptions::new()
                .with_max_attempts(1)
                .with_callback(queue.callback::<MemoryElement>()),
        );

        button.remove_attribute("disabled");
        doc.deliver();

        let report = forwarder.rx.try_recv().unwrap();
        assert_eq!(report.element_id, "btn");
        assert_eq!(report.element_tag, "button");
        assert_eq!(report.attempts, 1);
        assert_eq!(report.user_agent, "test-agent");
        assert_eq!(report.client_ip, "192.0.2.4");
        assert!(forwarder.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (queue, _forwarder) = Reporter::new(config(1)).unwrap();

        assert!(queue.submit(ViolationReport::default()).is_ok());
        let err = queue.submit(ViolationReport::default()).unwrap_err();
        assert!(matches!(err, ReporterError::QueueFull { capacity: 1 }));

        // The callback path swallows the error.
        let doc = MemoryDocument::new();
        let el = doc.create_element("div");
        let callback = queue.callback::<MemoryElement>();
        callback(&el, 5);
        assert_eq!(queue.dropped(), 2);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, forwarder) = Reporter::new(config(2)).unwrap();
        drop(forwarder);
        assert!(matches!(
            queue.submit(ViolationReport::default()),
            Err(ReporterError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_run_ends_when_queue_dropped() {
        let (queue, forwarder) = Reporter::new(config(2)).unwrap();
        drop(queue);
        assert_eq!(forwarder.run().await, ForwardStats::default());
    }

    #[tokio::test]
    async fn test_send_unreachable_collector() {
        let config = config(1).with_collector_url("http://127.0.0.1:1");
        let (_queue, forwarder) = Reporter::new(config).unwrap();
        let err = forwarder.send(&ViolationReport::default()).await.unwrap_err();
        assert!(matches!(err, ReporterError::Transport(_)));
    }
}
