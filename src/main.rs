use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use url::Url;

use inkpost::backend::local::{LocalConnector, LocalSettings};
use inkpost::backend::objects::ObjectStore;
use inkpost::config::{Cli, Config};
use inkpost::db;
use inkpost::state::AppState;
use inkpost::sweep::{self, AssetSweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure the object store exists
    std::fs::create_dir_all(config.objects_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    // Stored objects are served by this process under /storage/
    let public_base = Url::parse(&format!(
        "{}/storage/",
        config.server.public_url.trim_end_matches('/')
    ))?;
    let objects = ObjectStore::new(config.objects_path(), public_base);
    let connector = Arc::new(LocalConnector::new(
        pool,
        objects,
        LocalSettings::from(&config.auth),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = if config.sweep.enabled {
        let sweeper = Arc::new(AssetSweeper::new(connector.as_ref(), &config.sweep));
        Some(sweep::spawn(sweeper, &config.sweep, shutdown_rx))
    } else {
        tracing::info!("Asset sweep disabled");
        None
    };

    let state = AppState {
        config: config.clone(),
        connector,
    };
    let app = inkpost::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        handle.await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
