//! Application entry point for the `station-monitor` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Creating the station registry shared by ingest and reporting
//! - Spawning the MQTT subscriber and the fixed-cadence reporter
//! - Binding the Axum HTTP server for read-only snapshots
//! - Stopping everything on Ctrl-C / SIGTERM
//!
//! # Environment Variables
//! See [`station_monitor::config::load_from_env`] for the service settings, plus:
//! - `LOG_LEVEL` (optional) – log verbosity when `RUST_LOG` is unset (default: `info`)
//! - `FORCE_COLOR` (optional) – force ANSI colors on/off
//! - `DASHBOARD` (optional) – `1`/`0` to force the stdout dashboard on/off
//!   (default: on when stdout is a terminal)
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Result;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;

use station_monitor::{
    alert_log::AlertLog,
    config, mqtt,
    reporter::{Reporter, ReporterConfig},
    routes, Registry, Report,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let registry = Arc::new(Registry::new(cfg.bounds, cfg.outage_threshold()));
    let (stop_tx, stop_rx) = watch::channel(false);
    let (report_tx, report_rx) = watch::channel(Arc::new(Report::default()));

    let subscriber = tokio::spawn(mqtt::run_subscriber(
        Arc::clone(&registry),
        cfg.mqtt.clone(),
        stop_rx.clone(),
    ));

    let reporter = Reporter::new(
        Arc::clone(&registry),
        AlertLog::new(&cfg.outage_log_path),
        ReporterConfig {
            interval: cfg.refresh,
            hide_invalid: cfg.hide_invalid,
            dashboard: dashboard_enabled(),
            header: format!(
                "MQTT Weather Client  |  Broker: {}  |  Topic: {}",
                cfg.mqtt.broker_url, cfg.mqtt.topic
            ),
        },
        report_tx,
    );
    let reporting = tokio::spawn(reporter.run(stop_rx.clone()));

    let app = routes::router(report_rx);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Stopping...");
            let _ = stop_tx.send(true);
        })
        .await?;

    let _ = tokio::join!(subscriber, reporting);
    Ok(())
}

// ---

/// Resolve once Ctrl-C (or SIGTERM on unix) is received.
async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// The dashboard redraws the whole screen, so it defaults to on only for a TTY.
fn dashboard_enabled() -> bool {
    match env::var("DASHBOARD").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Output on stderr, leaving stdout to the dashboard
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Log level from `RUST_LOG`, else `LOG_LEVEL`, else `info`
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},rumqttc=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
