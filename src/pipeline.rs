//! The ingestion driver.
//!
//! [`run`] sequences one ingestion over any [`Backend`]:
//!
//! 1. compile the run's filters with the backend's renderer,
//! 2. load the zone table once and hand it to the backend,
//! 3. pull trip units from a [`TripSource`] in the configured [`LoadMode`],
//! 4. per unit: ingest, filter (unless unfiltered), zone-join, augment, write.
//!
//! Units are processed strictly one after the other. Files written for earlier
//! units stay on disk if a later unit fails.

use crate::app_id::AppId;
use crate::backend::{Backend, Fragment};
use crate::filter::{CompiledPredicate, FilterRules};
use crate::io::parquet::PartitionedWriter;
use crate::metrics::{RunMetrics, UnitStats};
use crate::record::TripRecord;
use crate::source::{LoadMode, TripSource};
use crate::zones::ZoneTable;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything a run needs besides the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Trip CSV file or glob.
    pub trips_path: String,
    pub zones_path: PathBuf,
    /// Root of the partitioned output dataset.
    pub output_path: PathBuf,
    pub filters: FilterRules,
    pub load_mode: LoadMode,
    /// Where to save run metrics as JSON, if anywhere.
    pub metrics_path: Option<PathBuf>,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(
        trips_path: impl Into<String>,
        zones_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            trips_path: trips_path.into(),
            zones_path: zones_path.into(),
            output_path: output_path.into(),
            filters: FilterRules::default(),
            load_mode: LoadMode::Whole,
            metrics_path: None,
        }
    }

    #[must_use]
    pub fn with_filters(mut self, filters: FilterRules) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn with_load_mode(mut self, load_mode: LoadMode) -> Self {
        self.load_mode = load_mode;
        self
    }

    #[must_use]
    pub fn with_metrics_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }
}

/// Run one ingestion.
///
/// # Errors
/// The first failure of any stage; earlier units' output is kept.
pub fn run<B: Backend>(backend: &mut B, config: &PipelineConfig, app_id: &AppId) -> Result<RunMetrics> {
    let predicate = backend.compile(&config.filters);
    let mut metrics = RunMetrics::new(backend.name(), app_id.as_str());
    metrics.record_start();
    info!(backend = backend.name(), %app_id, "starting ingestion");

    let zones = ZoneTable::from_csv(&config.zones_path)?;
    info!(
        "Taxi-zones loaded (csv-src={}, zones={}).",
        config.zones_path.display(),
        zones.len()
    );
    backend.load_zones(zones)?;

    let writer = PartitionedWriter::new(&config.output_path, app_id);
    let source = TripSource::open(&config.trips_path, config.load_mode)?;
    for (i, unit) in source.enumerate() {
        let n = i + 1;
        let trips = unit.with_context(|| format!("read trips (unit {n})"))?;
        match config.load_mode {
            LoadMode::Whole => info!(
                "Taxi-rides loaded (src={}, rows={}).",
                config.trips_path,
                trips.len()
            ),
            LoadMode::Sample(size) => info!(
                "Taxi-rides sample (src={}, sample-size={size}).",
                config.trips_path
            ),
            LoadMode::Chunked(size) => info!(
                "Taxi-rides iterator (src={}, chunk-size={size}, chunk={n}).",
                config.trips_path
            ),
        }

        let stats = process_unit(backend, trips, &predicate, &writer, app_id, n)
            .with_context(|| format!("process unit {n}"))?;
        metrics.add_unit(stats);
        info!(
            "Done(chunk={n}). Data persisted at : {}",
            config.output_path.display()
        );
    }

    metrics.record_end();
    metrics.log_summary();
    if let Some(path) = &config.metrics_path {
        metrics.save_to_file(path)?;
    }
    Ok(metrics)
}

fn process_unit<B: Backend>(
    backend: &mut B,
    trips: Vec<TripRecord>,
    predicate: &CompiledPredicate<Fragment<B>>,
    writer: &PartitionedWriter,
    app_id: &AppId,
    unit: usize,
) -> Result<UnitStats> {
    let rows_read = trips.len();
    let mut relation = backend.ingest(trips)?;

    let kept = match predicate.as_filter() {
        Some(p) => {
            info!("(chunk={unit}). Applying filtering expression : {p}");
            relation = backend.filter(relation, p)?;
            backend.count(&relation)?
        }
        None => rows_read,
    };

    info!("(chunk={unit}). Joining with taxi zones");
    let joined = backend.join_zones(relation)?;
    let matched = backend.count_joined(&joined)?;

    info!("(chunk={unit}). Generating additional columns");
    let rows = backend.augment(joined, app_id)?;
    if rows.is_empty() {
        warn!(unit, "no rows left to write");
    }
    let written = backend.write(&rows, writer)?;

    Ok(UnitStats {
        rows_read,
        rows_filtered_out: rows_read.saturating_sub(kept),
        rows_unmatched: kept.saturating_sub(matched),
        rows_written: written.rows,
        files_written: written.files,
    })
}
