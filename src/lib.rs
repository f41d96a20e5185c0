//! Real-time aggregation and outage detection for weather stations.
//!
//! Stations publish JSON readings (temperature, humidity, timestamp) to an
//! MQTT topic. For every station the [`Registry`] keeps a five-minute rolling
//! average, the current day's extremes, per-hour statistics and the time it
//! was last heard from. A reporting loop polls the registry on a fixed
//! cadence, which is also when completed hours are emitted and silent
//! stations raise throttled outage alerts.
//!
//! Module map (leaves first):
//! - `models`: decoding and the validity predicate
//! - `window`, `daily`, `hourly`: the per-station aggregators
//! - `outage`: silence detection and alert throttling
//! - `station`, `registry`: state ownership and the reporting cycle
//! - `report`, `reporter`, `alert_log`, `routes`, `mqtt`: everything around it
//! - `simulator`: a fake station for exercising the monitor (`station` binary)

pub mod alert_log;
pub mod config;
pub mod daily;
pub mod hourly;
pub mod models;
pub mod mqtt;
pub mod outage;
pub mod registry;
pub mod report;
pub mod reporter;
pub mod routes;
pub mod simulator;
pub mod station;
pub mod window;

pub use config::Config;
pub use models::{Reading, Rejected, Sample, ValidityBounds};
pub use registry::{Ingest, Registry};
pub use report::Report;
