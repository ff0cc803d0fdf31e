mod config;
mod credentials;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use fieldlink_protocol::HandshakeServer;

use credentials::CredentialFile;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("fieldlink-server starting");

    let args = config::parse_args(std::env::args().skip(1))?;

    let credentials = match &args.users {
        Some(path) => CredentialFile::load(path)?,
        None => CredentialFile::default(),
    };
    if credentials.is_empty() {
        tracing::warn!("no users configured, every login will be rejected");
    } else {
        tracing::info!(users = credentials.len(), "credentials loaded");
    }

    let server = Arc::new(HandshakeServer::in_memory(
        Box::new(credentials),
        args.handshake,
    ));

    let (purge_shutdown_tx, purge_shutdown_rx) = mpsc::channel(1);
    tokio::spawn(purge_loop(Arc::clone(&server), purge_shutdown_rx));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind to {}", args.bind))?;
    tracing::info!(
        bind = %args.bind,
        prekey_ttl_secs = args.handshake.prekey_ttl.as_secs(),
        session_ttl_secs = args.handshake.session_ttl.as_secs(),
        envelope_ttl_secs = args.handshake.envelope.ttl.as_secs(),
        "fieldlink-server ready"
    );

    axum::serve(listener, routes::router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("fieldlink-server shutting down");
    let _ = purge_shutdown_tx.send(()).await;
    Ok(())
}

/// Periodically drop expired pre-keys and sessions.
async fn purge_loop(server: Arc<HandshakeServer>, mut shutdown_rx: mpsc::Receiver<()>) {
    let mut interval = tokio::time::interval(config::PURGE_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = server.purge_expired() {
                    tracing::warn!(code = e.code(), error = %e, "purge of expired handshake state failed");
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::debug!("purge loop shutting down");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
