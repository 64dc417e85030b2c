//! Testing utilities for ingestion runs.
//!
//! - **Builders**: [`TripBuilder`] and [`zone`] create rows with sensible defaults
//! - **Fixtures**: a small zone table and trip set spanning several boroughs and days,
//!   plus writers that lay them out as TLC-style CSV files
//! - **Assertions**: compare written datasets while ignoring row order and `app_id`
//!
//! # Quick Start
//!
//! ```no_run
//! use taxi_ingest::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! write_trips_csv(dir.path().join("trips.csv"), &sample_trips())?;
//! write_zones_csv(dir.path().join("zones.csv"), &sample_zones())?;
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
