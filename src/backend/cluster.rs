//! Data-parallel backend on a dedicated rayon pool.
//!
//! A unit is split into contiguous partitions which are filtered, joined and
//! flattened independently. The zone table is shared by every partition through an
//! `Arc`. Partitions are concatenated back in order, so output rows come out in the
//! same order as with [`LocalBackend`](crate::backend::LocalBackend).

use crate::app_id::AppId;
use crate::augment::augment;
use crate::backend::Backend;
use crate::filter::{NativeRenderer, TripExpr};
use crate::io::parquet::{PartitionedWriter, WriteSummary};
use crate::join::{JoinedTrip, join_zones};
use crate::record::{JoinedRecord, TripRecord};
use crate::zones::ZoneTable;
use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Pool sizing for [`ClusterBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClusterOptions {
    /// Worker threads; defaults to the number of CPUs.
    pub threads: Option<usize>,
    /// Partitions per unit; defaults to twice the thread count.
    pub partitions: Option<usize>,
}

pub struct ClusterBackend {
    pool: rayon::ThreadPool,
    partitions: usize,
    zones: Option<Arc<ZoneTable>>,
}

/// Split `v` into at most `n` contiguous, order-preserving partitions.
fn split_vec<T>(v: Vec<T>, n: usize) -> Vec<Vec<T>> {
    let len = v.len();
    if n <= 1 || len <= 1 {
        return vec![v];
    }
    let chunk = len.div_ceil(n);
    let mut out = Vec::with_capacity(n);
    let mut rest = v.into_iter();
    loop {
        let part: Vec<T> = rest.by_ref().take(chunk).collect();
        if part.is_empty() {
            break;
        }
        out.push(part);
    }
    out
}

impl ClusterBackend {
    /// # Errors
    /// If the thread pool cannot be built.
    pub fn new(options: ClusterOptions) -> Result<Self> {
        let threads = options.threads.unwrap_or_else(num_cpus::get).max(1);
        let partitions = options.partitions.unwrap_or(2 * threads).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("taxi-ingest-{i}"))
            .build()
            .context("build rayon thread pool")?;
        debug!(threads, partitions, "cluster pool ready");
        Ok(Self {
            pool,
            partitions,
            zones: None,
        })
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    #[must_use]
    pub fn partitions(&self) -> usize {
        self.partitions
    }
}

impl Backend for ClusterBackend {
    type Renderer = NativeRenderer;
    type Trips = Vec<Vec<TripRecord>>;
    type Joined = Vec<Vec<JoinedTrip>>;

    fn name(&self) -> &'static str {
        "cluster"
    }

    fn renderer(&self) -> NativeRenderer {
        NativeRenderer
    }

    fn load_zones(&mut self, zones: ZoneTable) -> Result<()> {
        self.zones = Some(Arc::new(zones));
        Ok(())
    }

    fn ingest(&mut self, trips: Vec<TripRecord>) -> Result<Vec<Vec<TripRecord>>> {
        Ok(split_vec(trips, self.partitions))
    }

    fn count(&mut self, trips: &Vec<Vec<TripRecord>>) -> Result<usize> {
        Ok(trips.iter().map(Vec::len).sum())
    }

    fn filter(
        &mut self,
        trips: Vec<Vec<TripRecord>>,
        predicate: &TripExpr,
    ) -> Result<Vec<Vec<TripRecord>>> {
        Ok(self.pool.install(|| {
            trips
                .into_par_iter()
                .map(|mut part| {
                    part.retain(|t| predicate.eval(t));
                    part
                })
                .collect()
        }))
    }

    fn join_zones(&mut self, trips: Vec<Vec<TripRecord>>) -> Result<Vec<Vec<JoinedTrip>>> {
        let zones = Arc::clone(self.zones.as_ref().ok_or_else(|| anyhow!("zones not loaded"))?);
        Ok(self.pool.install(|| {
            trips
                .into_par_iter()
                .map(|part| join_zones(part, &zones).rows)
                .collect()
        }))
    }

    fn count_joined(&mut self, joined: &Vec<Vec<JoinedTrip>>) -> Result<usize> {
        Ok(joined.iter().map(Vec::len).sum())
    }

    fn augment(&mut self, joined: Vec<Vec<JoinedTrip>>, app_id: &AppId) -> Result<Vec<JoinedRecord>> {
        let parts: Vec<Vec<JoinedRecord>> = self.pool.install(|| {
            joined
                .into_par_iter()
                .map(|part| augment(part, app_id))
                .collect()
        });
        Ok(parts.concat())
    }

    fn write(&mut self, rows: &[JoinedRecord], writer: &PartitionedWriter) -> Result<WriteSummary> {
        self.pool.install(|| writer.write_par(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TripBuilder, zone};

    #[test]
    fn split_is_contiguous_and_complete() {
        let parts = split_vec((0..10).collect::<Vec<_>>(), 4);
        assert_eq!(parts, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9]]);
        assert_eq!(split_vec(vec![1], 8), vec![vec![1]]);
        assert_eq!(split_vec(Vec::<u8>::new(), 3), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn partitions_keep_input_order() {
        let mut b = ClusterBackend::new(ClusterOptions {
            threads: Some(2),
            partitions: Some(3),
        })
        .unwrap();
        b.load_zones(ZoneTable::from_records([zone(1, "A", "Manhattan"), zone(2, "B", "Bronx")]).unwrap())
            .unwrap();
        let trips: Vec<_> = (0..7)
            .map(|i| TripBuilder::new(1 + i % 2, 2).fare(&format!("{i}.00")).build())
            .collect();
        let units = b.ingest(trips).unwrap();
        assert_eq!(units.len(), 3);
        let joined = b.join_zones(units).unwrap();
        let id = AppId::from_parts(chrono::NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(), [0; 5]);
        let rows = b.augment(joined, &id).unwrap();
        let fares: Vec<String> = rows.iter().map(|r| r.fare_amount.to_string()).collect();
        assert_eq!(fares, (0..7).map(|i| format!("{i}.00")).collect::<Vec<_>>());
        assert_eq!(b.threads(), 2);
    }

    #[test]
    fn partitions_default_to_twice_the_threads() {
        let b = ClusterBackend::new(ClusterOptions {
            threads: Some(3),
            partitions: None,
        })
        .unwrap();
        assert_eq!(b.partitions(), 6);

        let b = ClusterBackend::new(ClusterOptions {
            threads: Some(3),
            partitions: Some(5),
        })
        .unwrap();
        assert_eq!(b.partitions(), 5);
    }
}
