//! End-to-end: guard violation -> reporter queue -> forwarder -> collector.

use std::sync::Arc;

use stateguard_collector::{serve_on, CollectorConfig};
use stateguard_core::{Element, GuardOptions, MemoryDocument, MemoryElement, Registry};
use stateguard_reporter::{Reporter, ReporterConfig, ViolationReport};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn start_collector(dir: &TempDir) -> (String, std::path::PathBuf, oneshot::Sender<()>) {
    let log_file = dir.path().join("incidents.log");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let config = CollectorConfig::default().with_log_file(&log_file);
    tokio::spawn(serve_on(listener, config, async move {
        let _ = stopped.await;
    }));
    (format!("http://{addr}"), log_file, stop)
}

#[tokio::test]
async fn test_forwarder_send_acknowledged() {
    let dir = TempDir::new().unwrap();
    let (url, log_file, stop) = start_collector(&dir).await;

    let (_queue, forwarder) = Reporter::new(ReporterConfig::default().with_collector_url(url)).unwrap();
    let report = ViolationReport {
        element_id: "approve".to_string(),
        element_tag: "button".to_string(),
        attempts: 11,
        timestamp: "2026-10-18T09:30:00.000Z".to_string(),
        user_agent: "integration".to_string(),
        client_ip: "198.51.100.2".to_string(),
    };

    let ack = forwarder.send(&report).await.unwrap();
    assert_eq!(ack.status, "received");
    assert_eq!(ack.action, "logged");

    // The connection peer wins over the reported address.
    let contents = tokio::fs::read_to_string(&log_file).await.unwrap();
    assert!(contents.contains("IP: 127.0.0.1\n"));
    assert!(contents.contains("Element: <button id=\"approve\">\n"));

    let _ = stop.send(());
}

#[tokio::test]
async fn test_guard_violations_reach_collector() {
    let dir = TempDir::new().unwrap();
    let (url, log_file, stop) = start_collector(&dir).await;

    let (queue, forwarder) = Reporter::new(ReporterConfig::default().with_collector_url(url)).unwrap();
    let forwarding = tokio::spawn(forwarder.run());

    let doc = Arc::new(MemoryDocument::new());
    let button = doc.create_element("button");
    button.set_attribute("id", "pay");
    button.set_attribute("disabled", "");

    let registry = Registry::new(Arc::clone(&doc));
    registry.protect(
        "#pay",
        GuardOptions::new()
            .with_attributes(["disabled"])
            .with_max_attempts(2)
            .with_callback(queue.callback::<MemoryElement>()),
    );

    for _ in 0..3 {
        button.remove_attribute("disabled");
        doc.deliver();
    }

    // Close the queue so the forwarder finishes after draining.
    drop(registry);
    drop(queue);
    let stats = forwarding.await.unwrap();
    assert_eq!(stats.forwarded, 2);
    assert_eq!(stats.failed, 0);

    let contents = tokio::fs::read_to_string(&log_file).await.unwrap();
    assert!(contents.contains("Attempts: 2\n"));
    assert!(contents.contains("Attempts: 3\n"));
    assert!(!contents.contains("Attempts: 1\n"));

    let _ = stop.send(());
}
