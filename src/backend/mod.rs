//! Execution backends.
//!
//! A [`Backend`] is the small capability surface the driver needs from an engine:
//! hold the zone table, take a unit of trips, filter it with a compiled predicate,
//! run the two-sided zone join, flatten to [`JoinedRecord`]s and write them. Rule
//! compilation and join column naming are shared; only the representation of trips
//! in flight and the predicate syntax differ.
//!
//! | Mode      | Adapter            | Trips in flight            | Predicate        |
//! |-----------|--------------------|----------------------------|------------------|
//! | `local`   | [`LocalBackend`]   | `Vec<TripRecord>`          | [`TripExpr`]     |
//! | `cluster` | [`ClusterBackend`] | partitioned `Vec`s (rayon) | [`TripExpr`]     |
//! | `sql`     | [`SqlBackend`]     | SQLite table/view          | SQL text         |
//!
//! [`TripExpr`]: crate::filter::TripExpr

pub mod cluster;
pub mod local;
#[cfg(feature = "sql-engine")]
pub mod sql;

pub use cluster::{ClusterBackend, ClusterOptions};
pub use local::LocalBackend;
#[cfg(feature = "sql-engine")]
pub use sql::{SqlBackend, SqlOptions};

use crate::app_id::AppId;
use crate::filter::{CompiledPredicate, FilterRules, FragmentRenderer, compile};
use crate::io::parquet::{PartitionedWriter, WriteSummary};
use crate::record::{JoinedRecord, TripRecord};
use crate::zones::ZoneTable;
use anyhow::Result;

/// Predicate fragment type of a backend.
pub type Fragment<B> = <<B as Backend>::Renderer as FragmentRenderer>::Fragment;

/// Engine adapter driven by [`crate::pipeline::run`].
pub trait Backend {
    type Renderer: FragmentRenderer;
    /// A unit of trips as held by the engine.
    type Trips;
    /// A unit after both join passes.
    type Joined;

    /// Mode name, as typed on the command line.
    fn name(&self) -> &'static str;

    fn renderer(&self) -> Self::Renderer;

    /// Compile the run's rules with this backend's renderer.
    fn compile(&self, rules: &FilterRules) -> CompiledPredicate<Fragment<Self>> {
        compile(rules, &self.renderer())
    }

    /// Take ownership of the zone table for the rest of the run.
    ///
    /// # Errors
    /// If the engine cannot register the table.
    fn load_zones(&mut self, zones: ZoneTable) -> Result<()>;

    /// # Errors
    /// If the engine cannot accept the rows.
    fn ingest(&mut self, trips: Vec<TripRecord>) -> Result<Self::Trips>;

    /// # Errors
    /// If the engine cannot count the unit.
    fn count(&mut self, trips: &Self::Trips) -> Result<usize>;

    /// Keep the trips matching `predicate`.
    ///
    /// # Errors
    /// On engine failure.
    fn filter(&mut self, trips: Self::Trips, predicate: &Fragment<Self>) -> Result<Self::Trips>;

    /// Inner-join on pickup then drop-off location.
    ///
    /// # Errors
    /// If zones were never loaded, or on engine failure.
    fn join_zones(&mut self, trips: Self::Trips) -> Result<Self::Joined>;

    /// # Errors
    /// If the engine cannot count the unit.
    fn count_joined(&mut self, joined: &Self::Joined) -> Result<usize>;

    /// Append `app_id` and `date_PU` and materialize output rows.
    ///
    /// # Errors
    /// On engine failure.
    fn augment(&mut self, joined: Self::Joined, app_id: &AppId) -> Result<Vec<JoinedRecord>>;

    /// Persist one unit's rows.
    ///
    /// # Errors
    /// On conversion or I/O failure.
    fn write(&mut self, rows: &[JoinedRecord], writer: &PartitionedWriter) -> Result<WriteSummary> {
        writer.write(rows)
    }
}
