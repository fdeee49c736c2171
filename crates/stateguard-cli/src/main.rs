//! StateGuard CLI - Collector server and tamper simulation

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use stateguard_collector::CollectorConfig;
use stateguard_core::{
    DeliveryMode, Element, GuardOptions, MemoryDocument, MemoryElement, Registry, RegistryConfig,
};
use stateguard_reporter::{Reporter, ReporterConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "stateguard")]
#[command(about = "StateGuard - Attribute integrity monitoring with tamper reporting")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the violation collector
    Serve {
        /// Listen port
        #[arg(short, long, env = "PORT", default_value_t = stateguard_collector::DEFAULT_PORT)]
        port: u16,
        /// Bind host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Incident log file
        #[arg(long, env = "STATEGUARD_LOG_FILE", default_value = stateguard_collector::DEFAULT_LOG_FILE)]
        log_file: PathBuf,
        /// Attempts above this count are escalated
        #[arg(long, default_value_t = stateguard_collector::DEFAULT_ESCALATION_THRESHOLD)]
        escalation_threshold: i64,
    },
    /// Tamper with a protected button in an in-memory document
    Simulate {
        /// Number of tamper attempts
        #[arg(short, long, default_value_t = 5)]
        attempts: u32,
        /// Violation limit before the callback fires
        #[arg(short, long, default_value_t = stateguard_core::DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
        /// Collector base URL; reports are only logged locally when omitted
        #[arg(short, long)]
        collector: Option<String>,
        /// Deliver change records synchronously instead of in batches
        #[arg(long)]
        immediate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            log_file,
            escalation_threshold,
        }) => {
            let config = CollectorConfig::default()
                .with_host(host)
                .with_port(port)
                .with_log_file(log_file)
                .with_escalation_threshold(escalation_threshold);
            stateguard_collector::serve_with_shutdown(config, shutdown_signal())
                .await
                .context("collector failed")?;
        }
        Some(Commands::Simulate {
            attempts,
            max_attempts,
            collector,
            immediate,
        }) => simulate(attempts, max_attempts, collector, immediate).await?,
        None => {
            println!(
                "StateGuard v{} - Use --help for commands",
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    Ok(())
}

async fn simulate(
    attempts: u32,
    max_attempts: u32,
    collector: Option<String>,
    immediate: bool,
) -> anyhow::Result<()> {
    let mode = if immediate {
        DeliveryMode::Immediate
    } else {
        DeliveryMode::Batched
    };
    let doc = Arc::new(MemoryDocument::with_mode(mode));
    let button = doc.create_element("button");
    button.set_attribute("id", "approve");
    button.set_attribute("disabled", "");

    let mut options = GuardOptions::new()
        .with_attributes(["disabled"])
        .with_max_attempts(max_attempts);

    let forwarding = match collector {
        Some(url) => {
            let (queue, forwarder) =
                Reporter::new(ReporterConfig::default().with_collector_url(url))
                    .context("failed to build reporter")?;
            options = options.with_callback(queue.callback::<MemoryElement>());
            Some(tokio::spawn(forwarder.run()))
        }
        None => {
            options = options.on_violation(|el: &MemoryElement, count| {
                warn!(element = ?el, count, "violation threshold reached");
            });
            None
        }
    };

    let registry = Registry::with_config(
        Arc::clone(&doc),
        RegistryConfig::default().with_audit_mode(true),
    );
    let protected = registry.protect("#approve", options);
    info!(protected, ?mode, "guard armed");

    for attempt in 1..=attempts {
        button.remove_attribute("disabled");
        doc.deliver();
        info!(
            attempt,
            reverted = button.has_attribute("disabled"),
            "tamper attempt"
        );
    }

    // Console clearing is refused while the audit registry lives.
    doc.clear_console();

    for status in registry.status_report() {
        println!(
            "<{}> violations={}/{} phase={:?} snapshot={}",
            status.tag_name,
            status.violations,
            status.max_attempts,
            status.phase,
            status.snapshot_len
        );
    }

    // Dropping the registry releases every callback and closes the queue.
    drop(registry);
    if let Some(handle) = forwarding {
        let stats = handle.await.context("forwarder task failed")?;
        println!(
            "reports forwarded={} failed={}",
            stats.forwarded, stats.failed
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
