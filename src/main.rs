use anyhow::{Context, Result};
use clap::Parser;
use sensor_server_rs::{cli, config, openapi, routes, state, static_assets, store};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind sensor-server-rs listener on {addr}: port already in use. Stop the other service using this port or re-run with --port to choose another port.",
            );
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to bind sensor-server-rs listener on {addr}"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if args.print_openapi {
        println!("{}", serde_json::to_string_pretty(&openapi::document())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = config::ServerConfig::from_env(args.static_root)?;
    if let Some(data_root) = args.data_root {
        config.data_root = data_root;
    }

    let store = Arc::new(store::RecordStore::open(&config.store_path())?);
    tracing::info!(path = %config.store_path().display(), "record store ready");

    let state = state::AppState {
        config: config.clone(),
        store,
    };

    let cancel = CancellationToken::new();

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .fallback_service(static_assets::service(config.static_root.clone())?);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(%addr, "listening");

    let shutdown = cancel.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::select! {
            _ = ctrl_c => {},
            _ = shutdown.cancelled() => {},
        }
    })
    .await?;
    cancel.cancel();
    Ok(())
}
