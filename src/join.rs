//! The two-sided zone join.
//!
//! Trips are inner-joined to the zone table twice: first on the pickup location, then
//! on the drop-off location. A trip whose id is missing on either side is dropped.
//! Because `LocationID` is unique in [`ZoneTable`], every surviving trip appears
//! exactly once.
//!
//! This is the in-process form used by the `local` and `cluster` backends. The SQL
//! backend issues the same two passes as SQL; both name the attached columns through
//! [`LocationRole::suffixed`](crate::record::LocationRole::suffixed).

use crate::record::{LocationRole, TripRecord, ZoneAttributes};
use crate::zones::ZoneTable;

/// A trip after the pickup pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PickupJoined {
    pub trip: TripRecord,
    pub pickup: ZoneAttributes,
}

/// A trip after both passes.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedTrip {
    pub trip: TripRecord,
    pub pickup: ZoneAttributes,
    pub dropoff: ZoneAttributes,
}

impl JoinedTrip {
    /// Attributes attached for `role`.
    #[must_use]
    pub fn zone(&self, role: LocationRole) -> &ZoneAttributes {
        match role {
            LocationRole::Pickup => &self.pickup,
            LocationRole::Dropoff => &self.dropoff,
        }
    }
}

/// Output of a full join plus how many input trips were dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinOutput {
    pub rows: Vec<JoinedTrip>,
    pub unmatched: usize,
}

/// Pass one: attach pickup zone attributes.
pub fn join_pickup(trips: Vec<TripRecord>, zones: &ZoneTable) -> Vec<PickupJoined> {
    trips
        .into_iter()
        .filter_map(|trip| {
            let pickup = zones.get(trip.location_of(LocationRole::Pickup))?.clone();
            Some(PickupJoined { trip, pickup })
        })
        .collect()
}

/// Pass two: attach drop-off zone attributes.
pub fn join_dropoff(rows: Vec<PickupJoined>, zones: &ZoneTable) -> Vec<JoinedTrip> {
    rows.into_iter()
        .filter_map(|PickupJoined { trip, pickup }| {
            let dropoff = zones.get(trip.location_of(LocationRole::Dropoff))?.clone();
            Some(JoinedTrip {
                trip,
                pickup,
                dropoff,
            })
        })
        .collect()
}

/// Both passes, pickup first.
pub fn join_zones(trips: Vec<TripRecord>, zones: &ZoneTable) -> JoinOutput {
    let input = trips.len();
    let rows = join_dropoff(join_pickup(trips, zones), zones);
    JoinOutput {
        unmatched: input - rows.len(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TripBuilder, zone};

    fn zones() -> ZoneTable {
        ZoneTable::from_records([zone(1, "A", "Manhattan"), zone(2, "B", "Bronx")]).unwrap()
    }

    #[test]
    fn attaches_each_role_from_its_own_id() {
        let out = join_zones(vec![TripBuilder::new(1, 2).build()], &zones());
        assert_eq!(out.unmatched, 0);
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!((row.pickup.zone.as_str(), row.pickup.borough.as_str()), ("A", "Manhattan"));
        assert_eq!((row.dropoff.zone.as_str(), row.dropoff.borough.as_str()), ("B", "Bronx"));
        assert_eq!(row.zone(LocationRole::Dropoff).zone, "B");
    }

    #[test]
    fn unknown_ids_drop_the_trip() {
        let trips = vec![
            TripBuilder::new(1, 2).build(),
            TripBuilder::new(99, 2).build(),
            TripBuilder::new(1, 99).build(),
            TripBuilder::new(2, 1).build(),
        ];
        let out = join_zones(trips, &zones());
        assert_eq!(out.unmatched, 2);
        let pairs: Vec<_> = out
            .rows
            .iter()
            .map(|r| (r.trip.pickup_location_id, r.trip.dropoff_location_id))
            .collect();
        assert_eq!(pairs, vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn same_zone_on_both_sides() {
        let out = join_zones(vec![TripBuilder::new(2, 2).build()], &zones());
        assert_eq!(out.rows[0].pickup, out.rows[0].dropoff);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let out = join_zones(Vec::new(), &zones());
        assert_eq!(out, JoinOutput::default());
    }
}
