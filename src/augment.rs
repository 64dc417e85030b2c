//! Terminal row construction: flatten a joined trip and append `app_id` and `date_PU`.

use crate::app_id::AppId;
use crate::join::JoinedTrip;
use crate::record::JoinedRecord;

/// `date_PU` partition value: the pickup date as `YYYYMMDD`.
#[must_use]
pub fn date_pu(trip: &crate::record::TripRecord) -> String {
    trip.pickup_datetime.format("%Y%m%d").to_string()
}

/// Flatten one joined trip into the output row.
#[must_use]
pub fn augment_one(joined: JoinedTrip, app_id: &AppId) -> JoinedRecord {
    let date_pu = date_pu(&joined.trip);
    let JoinedTrip {
        trip,
        pickup,
        dropoff,
    } = joined;
    JoinedRecord {
        vendor_id: trip.vendor_id,
        datetime_PU: trip.pickup_datetime,
        datetime_DO: trip.dropoff_datetime,
        passenger_count: trip.passenger_count,
        trip_distance: trip.trip_distance,
        ratecode_id: trip.ratecode_id,
        store_and_fwd_flag: trip.store_and_fwd_flag,
        payment_type: trip.payment_type,
        fare_amount: trip.fare_amount,
        extra: trip.extra,
        mta_tax: trip.mta_tax,
        tip_amount: trip.tip_amount,
        tolls_amount: trip.tolls_amount,
        improvement_surcharge: trip.improvement_surcharge,
        total_amount: trip.total_amount,
        Shape_Leng_PU: pickup.shape_leng,
        the_geom_PU: pickup.the_geom,
        Shape_Area_PU: pickup.shape_area,
        zone_PU: pickup.zone,
        borough_PU: pickup.borough,
        Shape_Leng_DO: dropoff.shape_leng,
        the_geom_DO: dropoff.the_geom,
        Shape_Area_DO: dropoff.shape_area,
        zone_DO: dropoff.zone,
        borough_DO: dropoff.borough,
        app_id: app_id.to_string(),
        date_PU: date_pu,
    }
}

/// Augment a whole unit.
#[must_use]
pub fn augment(rows: Vec<JoinedTrip>, app_id: &AppId) -> Vec<JoinedRecord> {
    rows.into_iter().map(|r| augment_one(r, app_id)).collect()
}
