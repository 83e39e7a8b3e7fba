//! Server startup and lifecycle

use crate::{routes, AppState, GatewayConfig};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Run the gateway server
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, std::future::pending()).await
}

/// Run server with graceful shutdown
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    serve(listener, config, shutdown_signal).await
}

/// Serve on an already bound listener until `shutdown_signal` resolves
pub async fn serve(
    listener: TcpListener,
    config: GatewayConfig,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let purge_every = Duration::from_secs(config.revocation_purge_secs.max(1));
    let state = Arc::new(AppState::new(config)?);
    let purge = spawn_revocation_purge(Arc::clone(&state), purge_every);
    let app = routes::create_router(state);

    info!("BYOK Gateway listening on http://{}", listener.local_addr()?);

    // Peer addresses key the rate limiter for requests without a bearer token
    let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal)
        .await;
    purge.abort();
    result?;

    info!("Gateway shutdown complete");
    Ok(())
}

/// Periodically forget revocations of tokens that have expired anyway
fn spawn_revocation_purge(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = state.authority.revocations().purge_expired();
            if purged > 0 {
                debug!(purged, "purged expired revocations");
            }
        }
    })
}
