// # mapsyncd - Map Sync Daemon
//
// The mapsyncd daemon is responsible for:
// 1. Reading configuration from environment variables (and an optional .env)
// 2. Initializing tracing and the runtime
// 3. Registering sources and stores
// 4. Serving the map page and location API until SIGTERM/SIGINT
//
// All sync logic lives in mapsync-core; this binary only wires it up.
//
// ## Example
//
// ```bash
// export NOTION_API_KEY=secret_...
// export NOTION_DATABASE_ID=0123abcd,4567ef01
// export STATUS_TO_INCLUDE="Signed,Follow up"
// export MAPSYNC_DATABASE_PATH=/var/lib/mapsync/db.sqlite3
//
// mapsyncd
// ```
//
// See `config.rs` for the full variable list.

use anyhow::{Context, Result};
use mapsync_core::SourceRegistry;
use mapsync_core::engine::SyncEvent;
use mapsyncd::config::DaemonConfig;
use mapsyncd::{build_router, build_state};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MapSyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<MapSyncExitCode> for ExitCode {
    fn from(code: MapSyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Load configuration from environment
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return MapSyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return MapSyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MapSyncExitCode::ConfigError.into();
    }

    info!("Starting mapsyncd v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: {} source(s), {} store",
        config.database_ids.len(),
        config.store_type
    );
    debug!("{:?}", config);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MapSyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            MapSyncExitCode::RuntimeError
        } else {
            MapSyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    let registry = SourceRegistry::with_builtin_stores();

    #[cfg(feature = "notion")]
    {
        info!("Registering Notion source");
        mapsync_source_notion::register(&registry);
    }

    let mapsync_config = config.to_mapsync_config();
    let (state, events) = build_state(&mapsync_config, &registry).await?;
    let store = state.gate.engine().store().clone();

    let event_logger = tokio::spawn(log_events(events));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Shutdown error: {}", e),
            }
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutting down daemon");
    if let Err(e) = store.flush().await {
        warn!("Failed to flush store: {}", e);
    }
    event_logger.abort();

    Ok(())
}

/// Log engine events until the engine goes away
async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::SourceFailed { source_id, error } => {
                warn!(%source_id, "Source failed: {}", error)
            }
            SyncEvent::SourceUnavailable { source_id, reason } => {
                warn!(%source_id, "Source unavailable: {}", reason)
            }
            other => debug!("Engine event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
