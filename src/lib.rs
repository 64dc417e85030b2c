//! # taxi-ingest
//!
//! Batch ingestion of NYC TLC taxi trips into a partitioned Parquet dataset.
//!
//! Every run does the same thing regardless of the engine underneath:
//!
//! 1. parse the optional pickup / drop-off date filters,
//! 2. load the taxi zone lookup table once,
//! 3. read trips from CSV (whole, sampled, or chunked),
//! 4. keep the trips matching the compiled filter,
//! 5. inner-join each trip with its pickup zone and its drop-off zone,
//! 6. stamp every row with the run's `app_id` and its pickup day `date_PU`,
//! 7. write the rows under `date_PU=<YYYYMMDD>/borough_PU=<borough>/`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use taxi_ingest::app_id::AppId;
//! use taxi_ingest::backend::LocalBackend;
//! use taxi_ingest::filter::FilterRules;
//! use taxi_ingest::pipeline::{PipelineConfig, run};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = PipelineConfig::new("data/yellow_tripdata_2019-*.csv", "data/taxi_zones.csv", "out")
//!     .with_filters(FilterRules::parse(Some("2019-06"), None)?);
//!
//! let metrics = run(&mut LocalBackend::new(), &config, &AppId::generate())?;
//! println!("{} rows written", metrics.rows_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! The driver is generic over [`Backend`]. The rule compiler ([`filter`]) and the
//! zone join column naming ([`join`], [`record`]) are shared by all of them:
//!
//! - [`LocalBackend`] - plain vectors on the calling thread
//! - [`ClusterBackend`] - contiguous partitions on a rayon pool
//! - `SqlBackend` - SQLite tables and views via `sqlx` (feature `sql-engine`)
//!
//! ## Feature Flags
//!
//! - `sql-engine` - the SQL backend (default)
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`, `compression-xz` -
//!   transparent decompression of inputs by extension or magic bytes (all default)
//!
//! ## Module Overview
//!
//! - [`filter`] - filter syntax, rule compilation, native and SQL renderers
//! - [`zones`] / [`join`] - zone lookup and the two-sided inner join
//! - [`augment`] / [`app_id`] - run-level columns
//! - [`source`] - trip load modes
//! - [`io`] - CSV, glob, compression and partitioned Parquet
//! - [`pipeline`] - the driver
//! - [`cli`] - command-line parsing and mode dispatch
//! - [`testing`] - builders, fixtures and assertions for tests

pub mod app_id;
pub mod augment;
pub mod backend;
pub mod cli;
pub mod filter;
pub mod io;
pub mod join;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod testing;
pub mod zones;

// General re-exports
pub use app_id::AppId;
pub use backend::{Backend, ClusterBackend, ClusterOptions, LocalBackend};
pub use filter::{CompiledPredicate, FilterError, FilterKind, FilterRule, FilterRules};
pub use metrics::RunMetrics;
pub use pipeline::{PipelineConfig, run};
pub use record::{JoinedRecord, LocationRole, TripRecord, ZoneRecord};
pub use source::LoadMode;
pub use zones::ZoneTable;

// Gated re-exports
#[cfg(feature = "sql-engine")]
pub use backend::{SqlBackend, SqlOptions};
