//! MQTT subscriber feeding the station registry.
//!
//! Connects to the configured broker, subscribes to the readings topic and
//! hands every publish payload to [`Registry::ingest`] stamped with the
//! arrival time. The subscription is re-issued on every ConnAck, so it
//! survives reconnects. Connection errors are logged and retried after
//! `reconnect_delay`; they never stop the subscriber.

use std::sync::Arc;

use chrono::Utc;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::registry::{Ingest, Registry};

// ---

const DEFAULT_PORT: u16 = 1883;

/// Capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerUrlError {
    #[error("unsupported scheme in '{0}': expected mqtt:// or tcp://")]
    Scheme(String),

    #[error("invalid port '{0}'")]
    Port(String),

    #[error("broker host is empty")]
    EmptyHost,
}

/// Split `mqtt://host[:port]` (or `tcp://`) into host and port.
pub fn parse_broker_url(url: &str) -> Result<(String, u16), BrokerUrlError> {
    // ---
    let rest = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .ok_or_else(|| BrokerUrlError::Scheme(url.to_string()))?;
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((h, p)) => (h, p.parse::<u16>().map_err(|_| BrokerUrlError::Port(p.to_string()))?),
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(BrokerUrlError::EmptyHost);
    }
    Ok((host.to_string(), port))
}

/// Run the subscriber until `stop_rx` flips to `true` (or its sender is gone).
pub async fn run_subscriber(
    registry: Arc<Registry>,
    config: MqttConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    // ---
    let (host, port) = match parse_broker_url(&config.broker_url) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("Invalid MQTT broker URL: {}", e);
            return;
        }
    };

    let mut options = MqttOptions::new(&config.client_id, host, port);
    options.set_keep_alive(config.keep_alive);

    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
    info!("Connecting to MQTT broker {}", config.broker_url);

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("MQTT connected: {:?}", ack.code);
                    if let Err(e) = client.try_subscribe(config.topic.as_str(), QoS::AtLeastOnce) {
                        error!("MQTT subscribe to '{}' failed: {}", config.topic, e);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    info!("Subscribed to '{}'", config.topic);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match registry.ingest(&publish.payload, Utc::now()) {
                        Ingest::Accepted { station_id, valid } => {
                            debug!("Message from {} (valid={})", station_id, valid);
                        }
                        Ingest::Dropped(reason) => {
                            debug!("Dropped message on '{}': {}", publish.topic, reason);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {}. Reconnecting...", e);
                    tokio::time::sleep(config.reconnect_delay).await;
                }
            },
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    info!("MQTT subscriber received stop signal");
                    break;
                }
            }
        }
    }

    if let Err(e) = client.try_disconnect() {
        debug!("Error disconnecting MQTT client: {}", e);
    }
    info!("MQTT subscriber stopped");
}
