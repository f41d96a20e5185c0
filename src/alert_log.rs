//! Durable outage log.
//!
//! Every alert is appended as one text line. Failures are logged and
//! swallowed; a broken log file must never stop reporting.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::outage::OutageAlert;

// ---

#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    // ---
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort append. Returns whether the line was written.
    pub fn append(&self, alert: &OutageAlert) -> bool {
        // ---
        match self.try_append(alert) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to append outage alert to {}: {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }

    fn try_append(&self, alert: &OutageAlert) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{alert}")
    }
}
