//! funcdev: a local development server for cloud functions.
//!
//! Startup order matters: the tunnel lease is acquired first (a rejected
//! registration is fatal before anything serves), then the engine comes
//! up, then the mandatory initial cold pass builds and publishes the
//! first route table — which is what binds the local port. After that the
//! file watcher feeds the rebuild loop until Ctrl-C, which unwinds in
//! reverse: stop watching, drain the listener, release the lease.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use funcdev_build::{FunctionWatcher, Rebuilder};
use funcdev_common::ConfigFile;
use funcdev_core::{Invoker, ModuleLoader, WasmEngine};
use funcdev_server::ServerSession;
use funcdev_tunnel::{TunnelClient, TunnelCredentials, TunnelManager};

#[derive(Parser)]
#[command(name = "funcdev", version, about = "Local dev server for cloud functions")]
struct Cli {
    /// Directory containing the function sources and digest.json
    functions_dir: PathBuf,

    /// API key for the tunnel control plane
    #[arg(long, env = "FUNCDEV_API_KEY")]
    api_key: String,

    /// Project id the public tunnel routes to
    #[arg(long, env = "FUNCDEV_PROJECT_ID")]
    project_id: String,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,funcdev=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigFile::default(),
    };
    let port = cli.port.unwrap_or_else(|| config.resolve_port());

    // Tunnel first: a rejected registration must fail startup before
    // anything is built or served
    let tunnel_client = TunnelClient::new(
        &config.tunnel,
        TunnelCredentials {
            api_key: cli.api_key,
            project_id: cli.project_id,
        },
    )
    .context("building tunnel client")?;
    let tunnel = TunnelManager::start(tunnel_client, port, config.tunnel.renew_interval())
        .await
        .context("registering tunnel")?;

    let engine = WasmEngine::new(&config.engine).context("starting wasm engine")?;
    let _ticker = engine.start_epoch_ticker();

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let session = Arc::new(ServerSession::new(
        addr,
        Invoker::new(engine.clone()),
        Duration::from_secs(config.server.request_timeout_secs),
    ));

    let mut rebuilder = Rebuilder::new(
        &cli.functions_dir,
        config.build.clone(),
        ModuleLoader::new(engine),
        Arc::clone(&session),
    );

    // The initial cold pass publishes the first table, which binds the
    // listener; a broken project at startup is fatal, later breakage is
    // not
    rebuilder.cold().await.context("initial build")?;

    let (tx, rx) = mpsc::channel(64);
    let watcher = FunctionWatcher::start(&cli.functions_dir, tx)
        .context("watching functions directory")?;
    let rebuild_loop = tokio::spawn(rebuilder.run(rx));

    info!(
        dir = %cli.functions_dir.display(),
        port,
        "dev server ready, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutting down");

    // Dropping the watcher closes the event channel, which ends the
    // rebuild loop once any in-flight pass completes
    drop(watcher);
    let _ = rebuild_loop.await;

    session.shutdown().await;
    tunnel.shutdown().await;

    Ok(())
}
