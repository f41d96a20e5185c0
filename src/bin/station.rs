//! Simulated weather station publisher.
//!
//! Publishes a `{stationId, temperature, humidity, timestamp}` reading to the
//! broker every `INTERVAL` seconds. Now and then the reading carries the
//! sensor error sentinel, and now and then the station goes quiet for a
//! minute so the monitor raises an outage alert.
//!
//! # Environment Variables
//! See [`station_monitor::config::load_station_from_env`], plus `LOG_LEVEL`.
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use dotenvy::dotenv;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, info, warn};
use tracing_subscriber::filter::EnvFilter;

use station_monitor::{
    config::{self, StationConfig},
    mqtt::parse_broker_url,
    simulator::{Draws, StationSimulator, Step},
};

// ---

/// Poll cadence while the station is silent.
const SILENT_POLL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_station_from_env()?;
    cfg.log_config();

    let client = connect(&cfg)?;
    let mut simulator = StationSimulator::new(cfg.station_id.clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let draws = Draws::sample(&mut rand::rng());
        let pause = match simulator.step(Utc::now(), draws) {
            Step::Publish(payload) => {
                let body = payload.to_string();
                match client
                    .publish(cfg.mqtt.topic.as_str(), QoS::AtMostOnce, false, body.clone())
                    .await
                {
                    Ok(()) => info!("[{}] Sent: {}", cfg.station_id, body),
                    Err(e) => warn!("[{}] Publish failed: {}", cfg.station_id, e),
                }
                cfg.interval
            }
            Step::OutageStarted { until } => {
                warn!(
                    "[{}] Simulating outage until {}",
                    cfg.station_id,
                    until.format("%H:%M:%S")
                );
                SILENT_POLL
            }
            Step::Silent => SILENT_POLL,
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = &mut ctrl_c => {
                info!("[{}] Stopping", cfg.station_id);
                break;
            }
        }
    }

    if let Err(e) = client.disconnect().await {
        debug!("Error disconnecting MQTT client: {}", e);
    }
    Ok(())
}

/// Create the client and drive its event loop in the background.
fn connect(cfg: &StationConfig) -> Result<AsyncClient> {
    // ---
    let (host, port) =
        parse_broker_url(&cfg.mqtt.broker_url).map_err(|e| anyhow!("Invalid BROKER_URL: {}", e))?;

    let mut options = MqttOptions::new(&cfg.mqtt.client_id, host, port);
    options.set_keep_alive(cfg.mqtt.keep_alive);

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let reconnect_delay = cfg.mqtt.reconnect_delay;
    info!("Connecting to MQTT broker {}", cfg.mqtt.broker_url);

    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                warn!("MQTT connection error: {}. Reconnecting...", e);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    });
    Ok(client)
}

fn init_tracing() {
    // ---
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(format!("{level},rumqttc=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(env_filter)
        .compact()
        .init();
}
