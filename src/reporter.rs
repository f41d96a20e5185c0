//! Fixed-cadence reporting loop.
//!
//! Each tick runs [`Registry::report`], persists and logs any outage alerts,
//! logs flushed hourly summaries, publishes the report for HTTP readers and
//! optionally prints the text dashboard.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::alert_log::AlertLog;
use crate::registry::Registry;
use crate::report::{self, Report};

// ---

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    // ---
    pub interval: Duration,
    pub hide_invalid: bool,
    /// Print the dashboard to stdout on every tick.
    pub dashboard: bool,
    /// First line of the dashboard.
    pub header: String,
}

pub struct Reporter {
    registry: Arc<Registry>,
    alert_log: AlertLog,
    config: ReporterConfig,
    report_tx: watch::Sender<Arc<Report>>,
}

impl Reporter {
    // ---
    pub fn new(
        registry: Arc<Registry>,
        alert_log: AlertLog,
        config: ReporterConfig,
        report_tx: watch::Sender<Arc<Report>>,
    ) -> Self {
        Self {
            registry,
            alert_log,
            config,
            report_tx,
        }
    }

    /// Run one reporting cycle at `now` and return what it produced.
    pub fn tick(&self, now: DateTime<Utc>) -> Arc<Report> {
        // ---
        let report = Arc::new(self.registry.report(now));

        for entry in &report.hourly {
            info!("{}", report::hourly_line(entry));
        }
        for alert in &report.alerts {
            warn!("{}", alert);
            self.alert_log.append(alert);
        }

        if self.config.dashboard {
            let text = report::render(&report, &self.config.header, self.config.hide_invalid);
            let mut stdout = std::io::stdout().lock();
            // Display is best-effort
            let _ = write!(stdout, "{CLEAR_SCREEN}{text}");
            let _ = stdout.flush();
        }

        // Only fails when every receiver is gone, which is fine
        let _ = self.report_tx.send(Arc::clone(&report));
        report
    }

    /// Tick every `interval` until `stop_rx` flips to `true`.
    pub async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        // ---
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Reporting every {} ms", self.config.interval.as_millis());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Utc::now());
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Reporter stopped");
    }
}
