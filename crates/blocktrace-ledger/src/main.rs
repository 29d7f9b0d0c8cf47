//! BlockTrace Ledger - reference provenance ledger service.
//!
//! Keeps product histories in memory and optionally persists them to a JSON
//! snapshot across restarts.

use anyhow::{Context, Result};
use blocktrace_ledger::{serve, LedgerImpl, LedgerStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// BlockTrace Ledger - in-memory provenance ledger service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8081")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Service identifier clients must present during handshake
    #[arg(
        short,
        long,
        env = "BLOCKTRACE_SERVICE_ID",
        default_value = "uxrrr-q7777-77774-qaaaq-cai"
    )]
    service_id: String,

    /// JSON snapshot restored at startup and written on shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let filter = if args.debug {
        "debug,blocktrace_ledger=trace"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.service_id.trim().is_empty() {
        anyhow::bail!("Service identifier cannot be empty");
    }

    info!("BlockTrace Ledger v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(LedgerStore::new());
    if let Some(path) = &args.snapshot {
        if path.exists() {
            store
                .load_snapshot(path)
                .await
                .with_context(|| format!("Failed to restore snapshot {}", path.display()))?;
        } else {
            warn!("Snapshot {} does not exist yet; starting empty", path.display());
        }
    }

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let ledger = LedgerImpl::new(store.clone(), args.service_id.trim().to_string());
    info!("Serving ledger {} on {}", args.service_id.trim(), addr);

    serve(listener, ledger, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    })
    .await
    .context("gRPC server failed")?;

    if let Some(path) = &args.snapshot {
        store
            .save_snapshot(path)
            .await
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    }

    Ok(())
}
