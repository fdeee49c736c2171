//! Router construction for the collector.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::routing::post;
use axum::{Json, Router};
use stateguard_reporter::{CollectorAck, ViolationReport, VIOLATION_PATH};
use tower_http::trace::TraceLayer;

use crate::config::CollectorConfig;
use crate::incident::{resolve_ip, IncidentLog};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct CollectorState {
    log: Arc<IncidentLog>,
}

impl CollectorState {
    /// Builds state from a config.
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_log(IncidentLog::new(
            config.log_file.clone(),
            config.escalation_threshold,
        ))
    }

    /// Builds state around an existing log.
    pub fn with_log(log: IncidentLog) -> Self {
        Self { log: Arc::new(log) }
    }

    /// The incident log.
    pub fn log(&self) -> &IncidentLog {
        &self.log
    }
}

/// Build the collector router with request tracing.
pub fn build_router(state: CollectorState) -> Router {
    Router::new()
        .route(VIOLATION_PATH, post(record_violation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Accepts any body: content type is not checked and malformed or
/// mistyped fields fall back to their defaults, so every report is
/// acknowledged.
async fn record_violation(
    State(state): State<CollectorState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Json<CollectorAck> {
    let report = ViolationReport::from_body(&body);
    let ip = resolve_ip(peer.map(|ConnectInfo(addr)| addr), &report);
    state.log.record(&report, ip).await;
    Json(CollectorAck::logged())
}
