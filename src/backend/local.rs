//! Single-threaded in-process backend.

use crate::app_id::AppId;
use crate::augment::augment;
use crate::backend::Backend;
use crate::filter::{NativeRenderer, TripExpr};
use crate::join::{JoinedTrip, join_zones};
use crate::record::{JoinedRecord, TripRecord};
use crate::zones::ZoneTable;
use anyhow::{Result, anyhow};

/// Plain `Vec` processing on the calling thread.
#[derive(Debug, Default)]
pub struct LocalBackend {
    zones: Option<ZoneTable>,
}

impl LocalBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for LocalBackend {
    type Renderer = NativeRenderer;
    type Trips = Vec<TripRecord>;
    type Joined = Vec<JoinedTrip>;

    fn name(&self) -> &'static str {
        "local"
    }

    fn renderer(&self) -> NativeRenderer {
        NativeRenderer
    }

    fn load_zones(&mut self, zones: ZoneTable) -> Result<()> {
        self.zones = Some(zones);
        Ok(())
    }

    fn ingest(&mut self, trips: Vec<TripRecord>) -> Result<Vec<TripRecord>> {
        Ok(trips)
    }

    fn count(&mut self, trips: &Vec<TripRecord>) -> Result<usize> {
        Ok(trips.len())
    }

    fn filter(&mut self, mut trips: Vec<TripRecord>, predicate: &TripExpr) -> Result<Vec<TripRecord>> {
        trips.retain(|t| predicate.eval(t));
        Ok(trips)
    }

    fn join_zones(&mut self, trips: Vec<TripRecord>) -> Result<Vec<JoinedTrip>> {
        let zones = self.zones.as_ref().ok_or_else(|| anyhow!("zones not loaded"))?;
        Ok(join_zones(trips, zones).rows)
    }

    fn count_joined(&mut self, joined: &Vec<JoinedTrip>) -> Result<usize> {
        Ok(joined.len())
    }

    fn augment(&mut self, joined: Vec<JoinedTrip>, app_id: &AppId) -> Result<Vec<JoinedRecord>> {
        Ok(augment(joined, app_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRules;
    use crate::testing::{TripBuilder, zone};

    #[test]
    fn join_requires_zones() {
        let mut b = LocalBackend::new();
        let trips = b.ingest(vec![TripBuilder::new(1, 2).build()]).unwrap();
        assert!(b.join_zones(trips).is_err());
    }

    #[test]
    fn filters_then_joins() {
        let mut b = LocalBackend::new();
        b.load_zones(ZoneTable::from_records([zone(1, "A", "Manhattan"), zone(2, "B", "Bronx")]).unwrap())
            .unwrap();
        let trips = b
            .ingest(vec![
                TripBuilder::new(1, 2).pickup_at("2019-03-01 00:00:00").build(),
                TripBuilder::new(1, 2).pickup_at("2018-03-01 00:00:00").build(),
                TripBuilder::new(3, 2).pickup_at("2019-03-01 00:00:00").build(),
            ])
            .unwrap();
        let predicate = b.compile(&FilterRules::parse(Some("2019"), None).unwrap());
        let kept = b.filter(trips, predicate.as_filter().unwrap()).unwrap();
        assert_eq!(b.count(&kept).unwrap(), 2);
        let joined = b.join_zones(kept).unwrap();
        assert_eq!(b.count_joined(&joined).unwrap(), 1);
    }
}
