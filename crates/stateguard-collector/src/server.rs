//! Server startup.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::router::{build_router, CollectorState};

/// Binds `config.bind_addr()` and serves until the process exits.
///
/// # Errors
///
/// [`CollectorError::Bind`] if the address cannot be bound,
/// [`CollectorError::Serve`] if the server loop fails.
pub async fn serve(config: CollectorConfig) -> Result<()> {
    serve_with_shutdown(config, std::future::pending()).await
}

/// Like [`serve`], stopping gracefully once `shutdown` resolves.
pub async fn serve_with_shutdown<F>(config: CollectorConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| CollectorError::Bind { addr, source })?;
    serve_on(listener, config, shutdown).await
}

/// Serves on an already bound listener.
pub async fn serve_on<F>(listener: TcpListener, config: CollectorConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(
            %addr,
            log_file = %config.log_file.display(),
            "StateGuard Security Server running on port {}",
            addr.port()
        );
    }

    let app = build_router(CollectorState::new(&config));
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(CollectorError::Serve)
}
