//! Startup orchestration.
//!
//! Config, then logging and metrics, then the notification store, then the
//! listener. Any failure before the listener binds is fatal.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::loader::default_config;
use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, AppConfig, ConfigError, NotificationConfig};
use crate::http::HttpServer;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::lifecycle::Shutdown;
use crate::notifications::{InMemoryNotificationRepository, NotificationRepository, StoreError};
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] io::Error),

    #[error("notification store: {0}")]
    Store(#[from] StoreError),

    #[error("config watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error("server task failed: {0}")]
    Task(String),
}

/// Load config from `config_path`, or defaults plus environment when absent.
pub fn resolve_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match config_path {
        Some(path) => load_config(path),
        None => default_config(),
    }
}

/// Open the notification repository, restoring the snapshot if configured.
pub fn open_repository(
    config: &NotificationConfig,
) -> Result<InMemoryNotificationRepository, StoreError> {
    match config.persistence_path.as_deref() {
        Some(path) => InMemoryNotificationRepository::load_from_file(Path::new(path)),
        None => Ok(InMemoryNotificationRepository::new(None)),
    }
}

/// Run the service until SIGINT/SIGTERM.
pub async fn run(config_path: Option<PathBuf>) -> Result<(), StartupError> {
    let config = resolve_config(config_path.as_deref())?;
    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "contest-admission starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let repository = Arc::new(open_repository(&config.notifications)?);
    let shared: Arc<dyn NotificationRepository> = repository.clone();

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match config_path.as_deref() {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let mut drain_started = shutdown.subscribe();
    let signals = spawn_signal_handler(shutdown.clone());

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
    let server = HttpServer::with_repository(config, shared);
    let mut handle = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    let outcome = tokio::select! {
        joined = &mut handle => joined,
        _ = drain_started.recv() => match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "Drain deadline passed, aborting server");
                handle.abort();
                Ok(Ok(()))
            }
        },
    };
    signals.abort();

    repository.save_to_file()?;

    match outcome {
        Ok(result) => result?,
        Err(e) => return Err(StartupError::Task(e.to_string())),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
