//! Per-run counters.
//!
//! The driver owns one [`RunMetrics`] per run and updates it after every unit of
//! work. At the end it is logged via `tracing` and, when `--metrics-path` is given,
//! saved as pretty JSON:
//!
//! ```json
//! {
//!   "backend": "local",
//!   "app_id": "20190615_3fa9c01b7e",
//!   "chunks": 3,
//!   "rows_read": 25000,
//!   "rows_filtered_out": 1200,
//!   "rows_unmatched": 14,
//!   "rows_written": 23786,
//!   "files_written": 41,
//!   "execution_time_ms": 812
//! }
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters for one unit (the whole dataset or one chunk).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnitStats {
    pub rows_read: usize,
    pub rows_filtered_out: usize,
    pub rows_unmatched: usize,
    pub rows_written: usize,
    pub files_written: usize,
}

/// Counters for a whole run.
#[derive(Clone, Debug, Serialize)]
pub struct RunMetrics {
    pub backend: String,
    pub app_id: String,
    pub chunks: usize,
    pub rows_read: usize,
    pub rows_filtered_out: usize,
    pub rows_unmatched: usize,
    pub rows_written: usize,
    pub files_written: usize,
    pub execution_time_ms: u64,
    #[serde(skip)]
    started: Option<Instant>,
}

impl RunMetrics {
    #[must_use]
    pub fn new(backend: &str, app_id: &str) -> Self {
        Self {
            backend: backend.to_string(),
            app_id: app_id.to_string(),
            chunks: 0,
            rows_read: 0,
            rows_filtered_out: 0,
            rows_unmatched: 0,
            rows_written: 0,
            files_written: 0,
            execution_time_ms: 0,
            started: None,
        }
    }

    pub fn record_start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn record_end(&mut self) {
        if let Some(start) = self.started {
            self.execution_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.execution_time_ms)
    }

    /// Fold one finished unit into the totals.
    pub fn add_unit(&mut self, unit: UnitStats) {
        self.chunks += 1;
        self.rows_read += unit.rows_read;
        self.rows_filtered_out += unit.rows_filtered_out;
        self.rows_unmatched += unit.rows_unmatched;
        self.rows_written += unit.rows_written;
        self.files_written += unit.files_written;
    }

    pub fn log_summary(&self) {
        info!(
            backend = %self.backend,
            app_id = %self.app_id,
            chunks = self.chunks,
            rows_read = self.rows_read,
            rows_filtered_out = self.rows_filtered_out,
            rows_unmatched = self.rows_unmatched,
            rows_written = self.rows_written,
            files_written = self.files_written,
            "run finished in {:.3}s",
            self.elapsed().as_secs_f64()
        );
    }

    /// Save as pretty JSON.
    ///
    /// # Errors
    /// If the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(self).context("serialize metrics")?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
