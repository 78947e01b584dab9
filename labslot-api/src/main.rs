use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use labslot_api::audit::create_audit_logger;
use labslot_api::rest::{AppState, create_router};
use labslot_api::seed::seed_from_file;
use labslot_api::{DataStore, LocalStore, StoreConfig};

#[derive(Parser)]
#[command(name = "labslot-api")]
#[command(about = "labslot API Server - conflict-free lab resource reservations")]
struct Args {
    /// Listen address for REST API
    #[arg(short, long, default_value = "[::]:8080")]
    listen: String,

    /// Data directory for persistent storage
    #[arg(short, long, default_value = "/var/lib/labslot")]
    data_dir: PathBuf,

    /// Run in development mode (ephemeral storage, no audit log)
    #[arg(long)]
    dev: bool,

    /// JSON file of resources to register at startup
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Longest a write waits for the schedule lock (milliseconds)
    #[arg(long, default_value_t = 2000)]
    lock_timeout_ms: u64,

    /// Queued events per live-update subscriber
    #[arg(long, default_value_t = 64)]
    subscriber_buffer: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("labslot_api=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.subscriber_buffer == 0 {
        return Err("--subscriber-buffer must be at least 1".into());
    }

    let config = StoreConfig {
        lock_timeout: Duration::from_millis(args.lock_timeout_ms),
        subscriber_buffer: args.subscriber_buffer,
    };

    let audit = create_audit_logger(!args.dev);

    let store = if args.dev {
        warn!("Development mode: reservations are not persisted");
        LocalStore::in_memory(config, audit)
    } else {
        tokio::fs::create_dir_all(&args.data_dir).await?;
        LocalStore::open(&args.data_dir, config, audit)?
    };
    let store: Arc<dyn DataStore> = Arc::new(store);

    info!(
        "Starting labslot-api - REST: {}, data: {}",
        args.listen,
        if args.dev {
            "in-memory".to_string()
        } else {
            args.data_dir.display().to_string()
        }
    );

    if let Some(path) = &args.resources {
        seed_from_file(store.as_ref(), path).await?;
    }

    let app_state = Arc::new(AppState {
        store: store.clone(),
    });
    let router = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!("REST API listening on {}", args.listen);

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        })
        .await?;

    info!("Shutdown complete");
    Ok(())
}
