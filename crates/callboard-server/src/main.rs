//! Callboard Server
//!
//! HTTP service that admits caller registrations and runs draws.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use callboard_core::config::load_config;
use callboard_core::tracing_init::init_tracing;
use callboard_server::admission::{AdmissionPipeline, StandardPolicy};
use callboard_server::audit::SecurityAuditLog;
use callboard_server::directory::CallerDirectory;
use callboard_server::http::{AppState, build_router};
use callboard_server::ratelimit::{RateLimitCounter, SqliteCounterStore};
use callboard_server::storage::CallerDatabase;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[command(name = "callboard-server")]
#[command(version, about = "Callboard server - caller registration and draws")]
struct Args {
    /// Path to a JSON settings file (overrides the global one).
    #[arg(long, env = "CALLBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr.to_string();
    }
    if let Some(path) = args.db_path {
        config.server.database_path = Some(path);
    }
    config.server.log_json |= args.log_json;

    init_tracing(
        "callboard_server=info,callboard::security=info,tower_http=info",
        config.server.log_json,
    );

    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.server.addr))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        "Starting callboard-server"
    );

    let db_path = match config.server.database_path.clone() {
        Some(path) => path,
        None => default_db_path()?,
    };
    info!(path = %db_path.display(), "Opening caller database");
    let db = CallerDatabase::open(&db_path).await?;

    let limiter = RateLimitCounter::new(Arc::new(SqliteCounterStore::new(db.clone())));
    let directory = CallerDirectory::new(db, config.admission.max_retries);
    let pipeline = AdmissionPipeline::new(
        limiter.clone(),
        directory,
        SecurityAuditLog::default(),
        Arc::new(StandardPolicy),
        config.limits.clone(),
        Duration::from_secs(config.server.request_timeout_secs),
    );

    // Background purge of expired rate-limit windows (hourly)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            match limiter.purge_expired().await {
                Ok(removed) if removed > 0 => {
                    info!(removed, "Expired rate limit windows purged");
                }
                Err(e) => {
                    warn!(error = %e, "Rate limit purge failed");
                }
                _ => {}
            }
        }
    });

    let app = build_router(AppState::new(pipeline, config.server.trust_forwarded_for));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal");
    })
    .await?;

    info!("Server stopped");
    Ok(())
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".callboard").join("callers.db"))
}
