// # linewatchd - Router Outage Monitor Daemon
//
// The linewatchd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Assembling the store, router client, builder and tracker
// 4. Starting the tracker and stopping it on SIGTERM/SIGINT
//
// All tracking logic lives in linewatch-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Router
// - `LINEWATCH_ROUTER_ADDRESS`: Host name or IP (default: fritz.box)
// - `LINEWATCH_ROUTER_USERNAME`: TR-064 user (optional)
// - `LINEWATCH_ROUTER_PASSWORD`: TR-064 password (optional)
// - `LINEWATCH_ROUTER_TLS`: Use HTTPS on port 49443 (default: false)
// - `LINEWATCH_ROUTER_TIMEOUT_SECS`: Per-request timeout (default: 10)
//
// ### Store
// - `LINEWATCH_STORE_TYPE`: Type of store (file, memory; default: file)
// - `LINEWATCH_STORE_PATH`: Path to store file (for file store)
//
// ### Tracker
// - `LINEWATCH_POLL_INTERVAL_SECS`: Status poll interval (default: 60)
// - `LINEWATCH_LOG_SYNC_INTERVAL_SECS`: Device log sync interval (default: 60)
//
// ### Keywords (comma separated, empty keeps the default set)
// - `LINEWATCH_KEYWORDS_PLANNED`
// - `LINEWATCH_KEYWORDS_IPV4_DISCONNECT`, `LINEWATCH_KEYWORDS_IPV4_CONNECT`
// - `LINEWATCH_KEYWORDS_IPV6_DISCONNECT`, `LINEWATCH_KEYWORDS_IPV6_CONNECT`
//
// ## Example
//
// ```bash
// export LINEWATCH_ROUTER_ADDRESS=192.168.178.1
// export LINEWATCH_ROUTER_USERNAME=monitor
// export LINEWATCH_ROUTER_PASSWORD=secret
// export LINEWATCH_STORE_PATH=/var/lib/linewatch/store.json
//
// linewatchd
// ```

use anyhow::Result;
use linewatch_core::config::{LinewatchConfig, StoreConfig};
use linewatch_core::{
    ConnectionTracker, FileStore, LogClassifier, MemoryStore, OutageIntervalBuilder,
    TrackerEvent,
};
use linewatch_tr064::Tr064Client;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_STORE_PATH: &str = "/var/lib/linewatch/store.json";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum LinewatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<LinewatchExitCode> for ExitCode {
    fn from(code: LinewatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    core: LinewatchConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut core = LinewatchConfig::new();

        if let Some(address) = var("LINEWATCH_ROUTER_ADDRESS") {
            core.router.address = address;
        }
        core.router.username = var("LINEWATCH_ROUTER_USERNAME");
        core.router.password = var("LINEWATCH_ROUTER_PASSWORD");
        if let Some(tls) = var("LINEWATCH_ROUTER_TLS") {
            core.router.use_tls = parse_bool("LINEWATCH_ROUTER_TLS", &tls)?;
        }
        if let Some(timeout) = var("LINEWATCH_ROUTER_TIMEOUT_SECS") {
            core.router.timeout_secs = parse_number("LINEWATCH_ROUTER_TIMEOUT_SECS", &timeout)?;
        }

        core.store = match var("LINEWATCH_STORE_TYPE").as_deref().unwrap_or("file") {
            "file" => StoreConfig::File {
                path: var("LINEWATCH_STORE_PATH")
                    .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "LINEWATCH_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        if let Some(interval) = var("LINEWATCH_POLL_INTERVAL_SECS") {
            core.tracker.poll_interval_secs =
                parse_number("LINEWATCH_POLL_INTERVAL_SECS", &interval)?;
        }
        if let Some(interval) = var("LINEWATCH_LOG_SYNC_INTERVAL_SECS") {
            core.tracker.log_sync_interval_secs =
                parse_number("LINEWATCH_LOG_SYNC_INTERVAL_SECS", &interval)?;
        }

        let keywords = &mut core.keywords;
        for (key, set) in [
            ("LINEWATCH_KEYWORDS_PLANNED", &mut keywords.planned),
            ("LINEWATCH_KEYWORDS_IPV4_DISCONNECT", &mut keywords.ipv4_disconnect),
            ("LINEWATCH_KEYWORDS_IPV4_CONNECT", &mut keywords.ipv4_connect),
            ("LINEWATCH_KEYWORDS_IPV6_DISCONNECT", &mut keywords.ipv6_disconnect),
            ("LINEWATCH_KEYWORDS_IPV6_CONNECT", &mut keywords.ipv6_connect),
        ] {
            if let Some(list) = var(key) {
                let parsed = split_list(&list);
                if !parsed.is_empty() {
                    *set = parsed;
                }
            }
        }

        Ok(Self {
            core,
            log_level: var("LINEWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.core.validate()?;

        if self.core.router.username.is_some() && self.core.router.password.is_none() {
            anyhow::bail!(
                "LINEWATCH_ROUTER_PASSWORD is required when LINEWATCH_ROUTER_USERNAME is set"
            );
        }

        if self.log_level().is_none() {
            anyhow::bail!(
                "LINEWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }

    fn log_level(&self) -> Option<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, value),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return LinewatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return LinewatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LinewatchExitCode::ConfigError.into();
    }

    info!("Starting linewatchd daemon");
    info!(
        "Router: {} ({}), store: {}",
        config.core.router.address,
        if config.core.router.use_tls { "https" } else { "http" },
        config.core.store.type_name()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LinewatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config.core).await {
            error!("Daemon error: {}", e);
            LinewatchExitCode::RuntimeError
        } else {
            LinewatchExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Assemble the tracker over the configured store
async fn build_tracker(
    config: &LinewatchConfig,
) -> Result<(ConnectionTracker, mpsc::Receiver<TrackerEvent>)> {
    let router = Arc::new(Tr064Client::new(&config.router)?);
    let builder = OutageIntervalBuilder::new(LogClassifier::new(&config.keywords));

    let assembled = match &config.store {
        StoreConfig::File { path } => {
            let store = Arc::new(FileStore::new(path).await?);
            ConnectionTracker::new(
                router,
                store.clone(),
                store.clone(),
                store,
                builder,
                &config.tracker,
            )?
        }
        StoreConfig::Memory => {
            warn!("Using in-memory store; history is lost on restart");
            let store = Arc::new(MemoryStore::new());
            ConnectionTracker::new(
                router,
                store.clone(),
                store.clone(),
                store,
                builder,
                &config.tracker,
            )?
        }
    };

    Ok(assembled)
}

/// Run the daemon
async fn run_daemon(config: LinewatchConfig) -> Result<()> {
    let (tracker, events) = build_tracker(&config).await?;
    let event_logger = tokio::spawn(log_events(events));

    tracker.start().await;
    info!("Daemon initialized successfully");

    let shutdown_result = wait_for_shutdown().await;

    match &shutdown_result {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => error!("Shutdown error: {}", e),
    }

    info!("Shutting down daemon");
    tracker.stop().await;

    // Dropping the tracker closes the event channel
    drop(tracker);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    shutdown_result.map(|_| ())
}

/// Log tracker events until the channel closes
async fn log_events(mut events: mpsc::Receiver<TrackerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TrackerEvent::CycleFailed { cycle, error } => {
                warn!("Cycle {} failed: {}", cycle, error)
            }
            TrackerEvent::LogSynced { inserted, outages } if inserted > 0 => {
                info!("Log synced: {} new entries, {} outages", inserted, outages)
            }
            other => debug!("Tracker event: {:?}", other),
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
