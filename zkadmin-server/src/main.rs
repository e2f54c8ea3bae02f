//! zkadmin control plane server
//!
//! Registers coordination-service clusters under aliases, keeps one live
//! session per alias and exposes tree administration over HTTP.
//!
//! Usage:
//!   zkadmin-server --port 8080 --db registrations.db

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zkadmin_client::Connector;
use zkadmin_core::{
    AdminConfig, AdminService, BroadcastSink, MemoryRegistrationStore, RegistrationStore,
    SqliteRegistrationStore,
};
use zkadmin_server::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "zkadmin-server")]
#[command(about = "Multi-cluster coordination-service admin server")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// SQLite file for cluster registrations (in-memory when omitted)
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[cfg(feature = "zookeeper")]
fn connector(config: &AdminConfig) -> Arc<dyn Connector> {
    Arc::new(zkadmin_client::ZkConnector::new(
        config.session_timeout(),
        config.connection_timeout(),
    ))
}

#[cfg(not(feature = "zookeeper"))]
fn connector(_config: &AdminConfig) -> Arc<dyn Connector> {
    Arc::new(zkadmin_client::MemoryConnector::new())
}

fn open_store(db: Option<&PathBuf>) -> Result<Arc<dyn RegistrationStore>> {
    let Some(path) = db else {
        return Ok(Arc::new(MemoryRegistrationStore::new()));
    };
    let path_str = path
        .to_str()
        .with_context(|| format!("database path is not valid UTF-8: {}", path.display()))?;
    let store = SqliteRegistrationStore::new(path_str)
        .with_context(|| format!("failed to open registration store {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
    state.begin_shutdown();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("zkadmin server starting...");
    let config = match &args.config {
        Some(path) => AdminConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AdminConfig::default(),
    };

    let store = open_store(args.db.as_ref())?;
    let connector = connector(&config);
    let events = BroadcastSink::new(config.notification_capacity);
    let service = AdminService::new(config, connector, store, Arc::new(events.clone()));
    info!("using {} backend", service.backend_name());

    let restored = service.restore_all().await?;
    let state = Arc::new(AppState::new(service, events));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("failed to bind HTTP port {}", args.port))?;
    info!("HTTP API listening on port {} ({} clusters restored)", args.port, restored);

    axum::serve(listener, build_router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await
        .context("HTTP server failed")?;

    state.service.shutdown().await;
    info!("zkadmin server stopped");
    Ok(())
}
