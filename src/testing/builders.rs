//! Row builders with defaults suited to tests.

use crate::record::{TripRecord, ZoneRecord, tlc_timestamp};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::str::FromStr;

fn timestamp(value: &str) -> NaiveDateTime {
    tlc_timestamp::parse(value).unwrap_or_else(|| panic!("bad test timestamp '{value}'"))
}

fn amount(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|_| panic!("bad test amount '{value}'"))
}

/// Fluent builder for [`TripRecord`].
///
/// Defaults to a 20 minute ride on 2019-06-15 at 10:00 with a 10.00 fare.
///
/// ```
/// use taxi_ingest::testing::TripBuilder;
///
/// let trip = TripBuilder::new(1, 2).pickup_at("2019-01-01 08:00:00").fare("7.50").build();
/// assert_eq!(trip.pickup_location_id, 1);
/// ```
#[derive(Clone, Debug)]
pub struct TripBuilder {
    trip: TripRecord,
}

impl TripBuilder {
    #[must_use]
    pub fn new(pickup_location_id: u32, dropoff_location_id: u32) -> Self {
        Self {
            trip: TripRecord {
                vendor_id: Some(1),
                pickup_datetime: timestamp("2019-06-15 10:00:00"),
                dropoff_datetime: timestamp("2019-06-15 10:20:00"),
                passenger_count: Some(1),
                trip_distance: Some(2.5),
                ratecode_id: Some(1),
                store_and_fwd_flag: Some(false),
                pickup_location_id,
                dropoff_location_id,
                payment_type: Some(1),
                fare_amount: amount("10.00"),
                extra: amount("0.50"),
                mta_tax: amount("0.50"),
                tip_amount: amount("2.00"),
                tolls_amount: amount("0.00"),
                improvement_surcharge: amount("0.30"),
                total_amount: amount("13.30"),
            },
        }
    }

    /// # Panics
    /// If `ts` is not a TLC or ISO timestamp.
    #[must_use]
    pub fn pickup_at(mut self, ts: &str) -> Self {
        self.trip.pickup_datetime = timestamp(ts);
        self
    }

    /// # Panics
    /// If `ts` is not a TLC or ISO timestamp.
    #[must_use]
    pub fn dropoff_at(mut self, ts: &str) -> Self {
        self.trip.dropoff_datetime = timestamp(ts);
        self
    }

    /// Set the fare and recompute the total from the other amounts.
    ///
    /// # Panics
    /// If `value` is not a decimal.
    #[must_use]
    pub fn fare(mut self, value: &str) -> Self {
        let t = &mut self.trip;
        t.fare_amount = amount(value);
        t.total_amount = t.fare_amount
            + t.extra
            + t.mta_tax
            + t.tip_amount
            + t.tolls_amount
            + t.improvement_surcharge;
        self
    }

    #[must_use]
    pub fn vendor(mut self, vendor_id: Option<i32>) -> Self {
        self.trip.vendor_id = vendor_id;
        self
    }

    #[must_use]
    pub fn passengers(mut self, count: Option<i32>) -> Self {
        self.trip.passenger_count = count;
        self
    }

    #[must_use]
    pub fn distance(mut self, miles: Option<f64>) -> Self {
        self.trip.trip_distance = miles;
        self
    }

    #[must_use]
    pub fn store_and_forward(mut self, flag: Option<bool>) -> Self {
        self.trip.store_and_fwd_flag = flag;
        self
    }

    #[must_use]
    pub fn build(self) -> TripRecord {
        self.trip
    }
}

/// Zone row with only the lookup-table columns filled in.
#[must_use]
pub fn zone(location_id: u32, zone: &str, borough: &str) -> ZoneRecord {
    ZoneRecord {
        object_id: Some(location_id),
        shape_leng: None,
        the_geom: None,
        shape_area: None,
        zone: zone.to_string(),
        location_id,
        borough: borough.to_string(),
    }
}

/// Zone row with geometry metadata.
#[must_use]
pub fn zone_with_shape(
    location_id: u32,
    zone: &str,
    borough: &str,
    shape_leng: f64,
    shape_area: f64,
) -> ZoneRecord {
    ZoneRecord {
        shape_leng: Some(shape_leng),
        the_geom: Some(format!("MULTIPOLYGON (((-74.0 40.{location_id})))")),
        shape_area: Some(shape_area),
        ..self::zone(location_id, zone, borough)
    }
}
