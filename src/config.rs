//! Configuration loader for the `station-monitor` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Values are read once at startup and never change.
//!
use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::TimeDelta;

use crate::models::ValidityBounds;
use crate::mqtt::parse_broker_url;

/// Parse an optional environment variable into `T`, falling back to a default.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable with a default.
macro_rules! string_env {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    // ---
    /// `mqtt://host[:port]` or `tcp://host[:port]`.
    pub broker_url: String,
    pub topic: String,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Pause before polling again after a connection error.
    pub reconnect_delay: Duration,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // ---
    pub mqtt: MqttConfig,

    /// Silence longer than this raises an outage alert.
    pub outage_seconds: u64,

    /// Reporting cadence.
    pub refresh: Duration,

    /// Blank out raw values of stations whose last message was invalid.
    pub hide_invalid: bool,

    pub bounds: ValidityBounds,

    /// File that outage alerts are appended to.
    pub outage_log_path: String,

    /// Port for the read-only HTTP API.
    pub http_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_url: "mqtt://localhost:1883".to_string(),
                topic: "weather".to_string(),
                client_id: "weather_dashboard_client_rs".to_string(),
                keep_alive: Duration::from_secs(60),
                reconnect_delay: Duration::from_secs(2),
            },
            outage_seconds: 30,
            refresh: Duration::from_millis(1000),
            hide_invalid: false,
            bounds: ValidityBounds::default(),
            outage_log_path: "outages.log".to_string(),
            http_port: 8080,
        }
    }
}

/// Boolean flag in the `1`/`0` style (`true`/`yes` also accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flag(bool);

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Flag(true)),
            "0" | "false" | "no" | "" => Ok(Flag(false)),
            other => Err(format!("expected 0 or 1, got '{other}'")),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BROKER_URL` – MQTT broker (default: `mqtt://localhost:1883`)
/// - `TOPIC` – topic to subscribe to (default: `weather`)
/// - `CLIENT_ID` – MQTT client id (default: `weather_dashboard_client_rs`)
/// - `OUTAGE_SECONDS` – silence threshold (default: 30)
/// - `REFRESH_MS` – reporting interval (default: 1000)
/// - `HIDE_INVALID` – `1` hides values of invalid stations (default: 0)
/// - `TEMP_MIN` / `TEMP_MAX` – valid temperature range (default: -50 / 80)
/// - `HUM_MIN` / `HUM_MAX` – valid humidity range (default: 0 / 100)
/// - `OUTAGE_LOG_PATH` – alert log file (default: `outages.log`)
/// - `HTTP_PORT` – HTTP API port (default: 8080)
///
/// Returns an error if any variable is set to an invalid value.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let mqtt = MqttConfig {
        broker_url: string_env!("BROKER_URL", defaults.mqtt.broker_url),
        topic: string_env!("TOPIC", defaults.mqtt.topic),
        client_id: string_env!("CLIENT_ID", defaults.mqtt.client_id),
        ..defaults.mqtt
    };

    let bounds = ValidityBounds {
        temp_min: parse_env!("TEMP_MIN", f64, defaults.bounds.temp_min),
        temp_max: parse_env!("TEMP_MAX", f64, defaults.bounds.temp_max),
        hum_min: parse_env!("HUM_MIN", f64, defaults.bounds.hum_min),
        hum_max: parse_env!("HUM_MAX", f64, defaults.bounds.hum_max),
    };

    let refresh_ms = parse_env!("REFRESH_MS", u64, 1000);

    let config = Config {
        mqtt,
        outage_seconds: parse_env!("OUTAGE_SECONDS", u64, defaults.outage_seconds),
        refresh: Duration::from_millis(refresh_ms),
        hide_invalid: parse_env!("HIDE_INVALID", Flag, Flag(defaults.hide_invalid)).0,
        bounds,
        outage_log_path: string_env!("OUTAGE_LOG_PATH", defaults.outage_log_path),
        http_port: parse_env!("HTTP_PORT", u16, defaults.http_port),
    };
    config.validate()?;
    Ok(config)
}

/// Settings for the simulated station publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    // ---
    pub mqtt: MqttConfig,
    pub station_id: String,
    /// Pause between published readings.
    pub interval: Duration,
}

/// Load the station simulator configuration.
///
/// Optional:
/// - `STATION_ID` – id published in every message (default: `WS-XX`)
/// - `INTERVAL` – seconds between readings (default: 5)
/// - `BROKER_URL` / `TOPIC` – as for the monitor
///
/// Returns an error if any variable is set to an invalid value.
pub fn load_station_from_env() -> Result<StationConfig> {
    // ---
    let defaults = Config::default();
    let station_id = string_env!("STATION_ID", "WS-XX");
    let interval_secs = parse_env!("INTERVAL", u64, 5);

    let config = StationConfig {
        mqtt: MqttConfig {
            broker_url: string_env!("BROKER_URL", defaults.mqtt.broker_url),
            topic: string_env!("TOPIC", defaults.mqtt.topic),
            client_id: format!("station_{station_id}"),
            ..defaults.mqtt
        },
        station_id,
        interval: Duration::from_secs(interval_secs),
    };
    config.validate()?;
    Ok(config)
}

impl StationConfig {
    // ---
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.station_id.is_empty() {
            bail!("STATION_ID must not be empty");
        }
        if self.interval.is_zero() {
            bail!("INTERVAL must be greater than zero");
        }
        parse_broker_url(&self.mqtt.broker_url).map_err(|e| anyhow!("Invalid BROKER_URL: {}", e))?;
        if self.mqtt.topic.is_empty() {
            bail!("TOPIC must not be empty");
        }
        Ok(())
    }

    pub fn log_config(&self) {
        // ---
        tracing::info!("Station configuration:");
        tracing::info!("  STATION_ID : {}", self.station_id);
        tracing::info!("  INTERVAL   : {}s", self.interval.as_secs());
        tracing::info!("  BROKER_URL : {}", self.mqtt.broker_url);
        tracing::info!("  TOPIC      : {}", self.mqtt.topic);
    }
}

impl Config {
    // ---
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.refresh.is_zero() {
            bail!("REFRESH_MS must be greater than zero");
        }
        parse_broker_url(&self.mqtt.broker_url).map_err(|e| anyhow!("Invalid BROKER_URL: {}", e))?;
        if self.mqtt.topic.is_empty() {
            bail!("TOPIC must not be empty");
        }
        let b = &self.bounds;
        if !(b.temp_min <= b.temp_max) {
            bail!("TEMP_MIN ({}) must not exceed TEMP_MAX ({})", b.temp_min, b.temp_max);
        }
        if !(b.hum_min <= b.hum_max) {
            bail!("HUM_MIN ({}) must not exceed HUM_MAX ({})", b.hum_min, b.hum_max);
        }
        Ok(())
    }

    pub fn outage_threshold(&self) -> TimeDelta {
        i64::try_from(self.outage_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  BROKER_URL      : {}", self.mqtt.broker_url);
        tracing::info!("  TOPIC           : {}", self.mqtt.topic);
        tracing::info!("  CLIENT_ID       : {}", self.mqtt.client_id);
        tracing::info!("  OUTAGE_SECONDS  : {}", self.outage_seconds);
        tracing::info!("  REFRESH_MS      : {}", self.refresh.as_millis());
        tracing::info!("  HIDE_INVALID    : {}", self.hide_invalid);
        tracing::info!(
            "  TEMP range      : [{}, {}]",
            self.bounds.temp_min,
            self.bounds.temp_max
        );
        tracing::info!(
            "  HUM range       : [{}, {}]",
            self.bounds.hum_min,
            self.bounds.hum_max
        );
        tracing::info!("  OUTAGE_LOG_PATH : {}", self.outage_log_path);
        tracing::info!("  HTTP_PORT       : {}", self.http_port);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_flag_parsing() {
        assert_eq!("1".parse::<Flag>(), Ok(Flag(true)));
        assert_eq!("TRUE".parse::<Flag>(), Ok(Flag(true)));
        assert_eq!("0".parse::<Flag>(), Ok(Flag(false)));
        assert!("maybe".parse::<Flag>().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        // ---
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.outage_threshold(), TimeDelta::seconds(30));
        assert_eq!(config.refresh, Duration::from_millis(1000));
        assert_eq!(config.bounds, ValidityBounds::default());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        // ---
        let mut config = Config::default();
        config.bounds.temp_min = 90.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bounds.hum_max = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_broker_url_rejected() {
        let mut config = Config::default();
        config.mqtt.broker_url = "localhost:1883".to_string();
        assert!(config.validate().is_err());
    }

    fn station_config() -> StationConfig {
        StationConfig {
            mqtt: Config::default().mqtt,
            station_id: "WS-01".to_string(),
            interval: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_station_config_validation() {
        // ---
        assert!(station_config().validate().is_ok());

        let mut config = station_config();
        config.station_id.clear();
        assert!(config.validate().is_err());

        let mut config = station_config();
        config.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = station_config();
        config.mqtt.broker_url = "mosquitto:1883".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_refresh_rejected() {
        let mut config = Config::default();
        config.refresh = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
