use std::sync::Arc;

use clap::Parser;
use roomcast::api::{self, AppState};
use roomcast::config::Config;
use roomcast::store::MemoryLog;
use roomcast::tailer::IngestExit;
use roomcast::Resolver;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error(transparent)]
    Roomcast(#[from] roomcast::Error),
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "roomcast=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    tracing::info!(bind = %config.bind, stream = %config.stream, "roomcast starting");

    let shutdown = CancellationToken::new();
    let log = MemoryLog::new();
    let resolver = Resolver::new(Arc::new(log.clone()), config.settings());

    let ingest = resolver.start_ingest(shutdown.clone())?;

    let state = AppState::new(resolver, shutdown.clone()).with_keepalive(config.keepalive());
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    tracing::info!(addr = %config.bind, "listening");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        signal.cancel();
    });

    let graceful = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .await
        .map_err(ServerError::Serve)?;

    shutdown.cancel();
    log.close();
    match ingest.await {
        Ok(IngestExit::Failed(e)) => tracing::error!(error = %e, "ingestion had stopped"),
        Ok(exit) => tracing::debug!(?exit, "ingestion finished"),
        Err(e) => tracing::error!(error = %e, "ingestion task panicked"),
    }

    tracing::info!("roomcast stopped");
    Ok(())
}
