use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::monitor::QueryCollector;

/// Shutdown signal types
#[derive(Debug, Clone, Copy)]
pub enum ShutdownSignal {
    /// Graceful shutdown (drain connections, flush buffered observations)
    Graceful,
}

/// Setup signal handlers for the server
///
/// Returns a broadcast sender for shutdown signals and a join handle for the signal task
///
/// Handles:
/// - SIGTERM/SIGINT: Graceful shutdown
/// - SIGHUP: Reload collector settings from the config file
#[cfg(unix)]
pub fn setup_signal_handlers(
    config_path: PathBuf,
    collector: QueryCollector,
) -> Result<(broadcast::Sender<ShutdownSignal>, tokio::task::JoinHandle<()>)> {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("SIGTERM received, initiating graceful shutdown");
                    let _ = tx_clone.send(ShutdownSignal::Graceful);
                    break;
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, initiating graceful shutdown");
                    let _ = tx_clone.send(ShutdownSignal::Graceful);
                    break;
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received, reloading collector settings");
                    if let Err(e) = reload_collector_settings(&config_path, &collector) {
                        error!("Failed to reload configuration: {:#}", e);
                    }
                }
            }
        }
    });

    Ok((shutdown_tx, handle))
}

/// Windows placeholder - only Ctrl+C is supported, no reload
#[cfg(not(unix))]
pub fn setup_signal_handlers(
    _config_path: PathBuf,
    _collector: QueryCollector,
) -> Result<(broadcast::Sender<ShutdownSignal>, tokio::task::JoinHandle<()>)> {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, initiating shutdown");
                let _ = tx_clone.send(ShutdownSignal::Graceful);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    Ok((shutdown_tx, handle))
}

/// Re-read the config file and replace the collector's runtime settings
///
/// Only the `[collector]` enable/console/threshold values are applied;
/// server, database and flush tuning changes need a restart. If loading or
/// validation fails the current settings stay in place.
pub fn reload_collector_settings(config_path: &std::path::Path, collector: &QueryCollector) -> Result<()> {
    let new_config = crate::config::load_config(config_path)?;
    let settings = new_config.collector.settings();

    collector.replace_settings(settings);

    info!(
        enabled = settings.enabled,
        log_to_console = settings.log_to_console,
        slow_query_threshold_ms = settings.slow_query_threshold_ms,
        "Collector settings reloaded"
    );
    Ok(())
}
