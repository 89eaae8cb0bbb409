//! GeoSplit - Geo-Aware Local Forwarding Proxy
//!
//! This is the main entry point for the GeoSplit application.

use anyhow::Result;
use clap::Parser;
use geosplit::config::{load_config, ConfigHandle};
use geosplit::geoip::GeoRangeStore;
use geosplit::listener::{ListenerManager, RestartHandle};
use geosplit::router::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// GeoSplit - splits proxy traffic between direct and chained routes
#[derive(Parser, Debug)]
#[command(name = "geosplit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    // Load configuration
    let config = load_config(&args.config)?;

    info!("GeoSplit v{}", geosplit::VERSION);
    info!("Configuration loaded from: {:?}", args.config);
    info!("Listen address: {}", config.listen_addr());
    info!("Upstream proxy: {} ({})", config.upstream.addr(), config.remote_mode);

    // A failed range load at startup is fatal; later reload failures only
    // keep the previous table.
    let store = Arc::new(GeoRangeStore::new());
    store.load(&config.geo_source).await?;

    let config_path = args.config.clone();
    let config_handle = ConfigHandle::new(config);
    let router = Arc::new(Router::new(store.clone()));

    let (manager, mut status_rx) = ListenerManager::new(config_handle.clone(), router);
    let manager = Arc::new(manager);
    let (restart, restarts) = RestartHandle::new();

    // Log every status transition the listener publishes.
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            info!("Proxy status: {}", *status_rx.borrow());
        }
    });

    // SIGHUP reloads the config file and the range source, then triggers a
    // coalesced listener restart.
    #[cfg(unix)]
    {
        let config_handle = config_handle.clone();
        let store = store.clone();
        let restart = restart.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sighup = match signal(SignalKind::hangup()) {
                Ok(sighup) => sighup,
                Err(e) => {
                    error!("Failed to setup SIGHUP handler: {}", e);
                    return;
                }
            };

            while sighup.recv().await.is_some() {
                info!("Received SIGHUP, reloading configuration");
                match load_config(&config_path) {
                    Ok(new_config) => {
                        let geo_source = new_config.geo_source.clone();
                        config_handle.replace(new_config);
                        if let Err(e) = store.load(&geo_source).await {
                            warn!("Range reload failed, keeping previous table: {:#}", e);
                        }
                        restart.trigger();
                    }
                    Err(e) => {
                        warn!("Config reload failed, keeping previous configuration: {:#}", e);
                    }
                }
            }
        });
    }

    // Binds the first listener, then serves restart requests until a
    // termination signal arrives.
    tokio::select! {
        _ = manager.run(restarts) => {}
        _ = shutdown_signal() => {}
    }

    manager.shutdown().await;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (cross-platform)
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to setup SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down...");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On Windows, only handle Ctrl+C
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down...");
    }
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
