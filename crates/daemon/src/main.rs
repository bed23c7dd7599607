use anyhow::{Context, Result};
use clap::Parser;
use neosnoize_api_client::NeosClient;
use neosnoize_daemon::scheduler::{self, TickGate};
use neosnoize_daemon::sync::SessionSync;
use neosnoize_daemon::{config, web};
use neosnoize_runtime_config::CONFIG_FILE_NAME;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Used when `RUST_LOG` is unset. `tower_http` only emits while the web
/// server runs.
const DEFAULT_LOG_FILTER: &str =
    "warn,neosnoize=info,neosnoize_daemon=info,neosnoize_api_client=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(name = "neosnoize")]
#[command(version, about = "Mirror the Neos session list and its thumbnails to local disk")]
struct Args {
    /// Config file; relative paths inside it resolve against its directory
    #[arg(long, short, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    if let Err(e) = run(args).await {
        error!("neosnoize fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("neosnoize starting");

    let (cfg, paths) = config::load_config(&args.config)?;

    let client = NeosClient::new(&cfg.sessions_endpoint, &cfg.assets_url, cfg.request_timeout())
        .context("Failed to build HTTP client")?;
    let sync = Arc::new(SessionSync::from_config(Arc::new(client), &cfg, &paths));

    if args.once {
        scheduler::run_once(sync.as_ref()).await?;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!(
        "Polling {} every {}ms",
        cfg.sessions_endpoint, cfg.update_interval
    );
    let scheduler_handle = tokio::spawn(scheduler::run_scheduler(
        Arc::clone(&sync),
        cfg.update_interval(),
        TickGate::default(),
        shutdown_rx.clone(),
    ));

    let web_handle = cfg.express.then(|| {
        let web_root = paths.web_root.clone();
        let port = cfg.express_port;
        let web_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = web::serve(web_root, port, web_shutdown).await {
                error!("{:#}", e);
            }
        })
    });

    wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");
    let _ = shutdown_tx.send(true);

    let _ = scheduler_handle.await;
    if let Some(handle) = web_handle {
        let _ = handle.await;
    }

    info!("neosnoize stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to register Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
