pub mod error;
pub mod routes;
pub mod state;
pub mod tls;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use momsync_core::config::ListenerConfig;
use momsync_core::repository::Repository;
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Every request, whatever its path, is an observation push.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(routes::import::import_observation)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-listener connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_connections: usize,
    /// Upper bound on handshake plus request handling for one connection.
    pub timeout: Duration,
}

impl From<&ListenerConfig> for ConnectionLimits {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            timeout: config.connection_timeout(),
        }
    }
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve(
    config: &ListenerConfig,
    repo: Arc<dyn Repository>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let tls = tls::server_config(config)?;
    let listener = TcpListener::bind(&config.bind).await?;
    let router = build_router(AppState::new(repo, config.max_body_bytes));
    serve_tls(listener, router, tls, config.into(), shutdown).await
}

/// Accept TLS connections on a pre-bound listener.
///
/// At most `limits.max_connections` connections are handled at once; the
/// next `accept` waits for a free slot.
pub async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: Arc<ServerConfig>,
    limits: ConnectionLimits,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let acceptor = TlsAcceptor::from(tls);
    let slots = Arc::new(Semaphore::new(limits.max_connections));
    tokio::pin!(shutdown);

    tracing::info!(%addr, max_connections = limits.max_connections, "inbound listener started");

    loop {
        let permit = tokio::select! {
            _ = &mut shutdown => break,
            permit = slots.clone().acquire_owned() => permit?,
        };
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(limits.timeout, handle_connection(acceptor, router, stream, peer))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(%peer, error = %format!("{e:#}"), "connection closed with error"),
                Err(_) => tracing::warn!(%peer, "connection timed out"),
            }
        });
    }

    tracing::info!(%addr, "inbound listener stopped");
    Ok(())
}

async fn handle_connection(
    acceptor: TlsAcceptor,
    router: Router,
    stream: TcpStream,
    peer: SocketAddr,
) -> anyhow::Result<()> {
    let tls = acceptor.accept(stream).await?;
    let client_cert = tls
        .get_ref()
        .1
        .peer_certificates()
        .is_some_and(|certs| !certs.is_empty());
    tracing::debug!(%peer, client_cert, "TLS handshake complete");

    hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(tls), TowerToHyperService::new(router))
        .await?;
    Ok(())
}
