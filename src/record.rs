//! Row types flowing through the ingestion pipeline.
//!
//! - [`TripRecord`] mirrors one row of a TLC yellow-taxi trip CSV.
//! - [`ZoneRecord`] mirrors one row of the taxi-zone file; [`ZoneAttributes`] is the
//!   same row without its key, i.e. the columns that get attached to a trip.
//! - [`JoinedRecord`] is the terminal row written to the partitioned dataset.
//!
//! Column names are part of the output contract. Zone columns attached to a trip are
//! always named through [`LocationRole::suffixed`], so every backend agrees on the
//! `_PU` / `_DO` scheme.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pickup timestamp column, after renaming from `tpep_pickup_datetime`.
pub const PICKUP_TIME_COLUMN: &str = "datetime_PU";
/// Drop-off timestamp column, after renaming from `tpep_dropoff_datetime`.
pub const DROPOFF_TIME_COLUMN: &str = "datetime_DO";
/// Run identifier column appended during augmentation.
pub const APP_ID_COLUMN: &str = "app_id";
/// Partition date column (`YYYYMMDD` of the pickup time).
pub const DATE_PU_COLUMN: &str = "date_PU";
/// Borough of the pickup zone; second partition level.
pub const BOROUGH_PU_COLUMN: &str = "borough_PU";

/// Output partition columns, outermost first.
pub const PARTITION_COLUMNS: [&str; 2] = [DATE_PU_COLUMN, BOROUGH_PU_COLUMN];

/// Zone columns that survive the join (the key `LocationID` is dropped).
pub const ZONE_ATTRIBUTE_COLUMNS: [&str; 5] =
    ["Shape_Leng", "the_geom", "Shape_Area", "zone", "borough"];

/// Trip columns that survive the join, in output order.
///
/// `PULocationID` and `DOLocationID` are consumed by the join and dropped.
pub const TRIP_COLUMNS: [&str; 15] = [
    "VendorID",
    PICKUP_TIME_COLUMN,
    DROPOFF_TIME_COLUMN,
    "passenger_count",
    "trip_distance",
    "RatecodeID",
    "store_and_fwd_flag",
    "payment_type",
    "fare_amount",
    "extra",
    "mta_tax",
    "tip_amount",
    "tolls_amount",
    "improvement_surcharge",
    "total_amount",
];

/// Which end of a trip a zone or timestamp refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationRole {
    Pickup,
    Dropoff,
}

impl LocationRole {
    /// Both roles in join order.
    pub const ALL: [LocationRole; 2] = [LocationRole::Pickup, LocationRole::Dropoff];

    /// Column suffix used when zone attributes are attached for this role.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            LocationRole::Pickup => "_PU",
            LocationRole::Dropoff => "_DO",
        }
    }

    /// Name of a zone attribute column once attached for this role.
    #[must_use]
    pub fn suffixed(self, column: &str) -> String {
        format!("{column}{}", self.suffix())
    }

    /// Timestamp column filtered for this role.
    #[must_use]
    pub fn time_column(self) -> &'static str {
        match self {
            LocationRole::Pickup => PICKUP_TIME_COLUMN,
            LocationRole::Dropoff => DROPOFF_TIME_COLUMN,
        }
    }

    /// Foreign-key column in the trip source for this role.
    #[must_use]
    pub fn location_column(self) -> &'static str {
        match self {
            LocationRole::Pickup => "PULocationID",
            LocationRole::Dropoff => "DOLocationID",
        }
    }
}

/// One taxi ride as read from the trip CSV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "VendorID")]
    pub vendor_id: Option<i32>,
    #[serde(rename = "tpep_pickup_datetime", alias = "datetime_PU", with = "tlc_timestamp")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(rename = "tpep_dropoff_datetime", alias = "datetime_DO", with = "tlc_timestamp")]
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: Option<i32>,
    pub trip_distance: Option<f64>,
    #[serde(rename = "RatecodeID")]
    pub ratecode_id: Option<i32>,
    #[serde(with = "yes_no_flag")]
    pub store_and_fwd_flag: Option<bool>,
    #[serde(rename = "PULocationID")]
    pub pickup_location_id: u32,
    #[serde(rename = "DOLocationID")]
    pub dropoff_location_id: u32,
    pub payment_type: Option<i32>,
    #[serde(with = "money")]
    pub fare_amount: Decimal,
    #[serde(with = "money")]
    pub extra: Decimal,
    #[serde(with = "money")]
    pub mta_tax: Decimal,
    #[serde(with = "money")]
    pub tip_amount: Decimal,
    #[serde(with = "money")]
    pub tolls_amount: Decimal,
    #[serde(with = "money")]
    pub improvement_surcharge: Decimal,
    #[serde(with = "money")]
    pub total_amount: Decimal,
}

impl TripRecord {
    /// Timestamp matching `role`.
    #[must_use]
    pub fn time_of(&self, role: LocationRole) -> NaiveDateTime {
        match role {
            LocationRole::Pickup => self.pickup_datetime,
            LocationRole::Dropoff => self.dropoff_datetime,
        }
    }

    /// Zone foreign key matching `role`.
    #[must_use]
    pub fn location_of(&self, role: LocationRole) -> u32 {
        match role {
            LocationRole::Pickup => self.pickup_location_id,
            LocationRole::Dropoff => self.dropoff_location_id,
        }
    }
}

/// One row of the taxi-zone file.
///
/// Both the shapefile export (`OBJECTID,Shape_Leng,the_geom,Shape_Area,zone,LocationID,borough`)
/// and the plain lookup table (`LocationID,Borough,Zone,service_zone`) deserialize into this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    #[serde(rename = "OBJECTID")]
    pub object_id: Option<u32>,
    #[serde(rename = "Shape_Leng")]
    pub shape_leng: Option<f64>,
    pub the_geom: Option<String>,
    #[serde(rename = "Shape_Area")]
    pub shape_area: Option<f64>,
    #[serde(alias = "Zone")]
    pub zone: String,
    #[serde(rename = "LocationID")]
    pub location_id: u32,
    #[serde(alias = "Borough")]
    pub borough: String,
}

impl ZoneRecord {
    /// Split into key and attached attributes; `OBJECTID` is dropped.
    #[must_use]
    pub fn into_parts(self) -> (u32, ZoneAttributes) {
        (
            self.location_id,
            ZoneAttributes {
                shape_leng: self.shape_leng,
                the_geom: self.the_geom,
                shape_area: self.shape_area,
                zone: self.zone,
                borough: self.borough,
            },
        )
    }
}

/// Zone columns attached to a trip, without the key.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ZoneAttributes {
    pub shape_leng: Option<f64>,
    pub the_geom: Option<String>,
    pub shape_area: Option<f64>,
    pub zone: String,
    pub borough: String,
}

/// Terminal output row: trip columns, both zone attribute sets and the run columns.
///
/// Timestamps serialize as epoch milliseconds to match the Parquet
/// `Timestamp(Millisecond)` columns.
#[allow(non_snake_case)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    #[serde(rename = "VendorID")]
    pub vendor_id: Option<i32>,
    #[serde(with = "chrono::naive::serde::ts_milliseconds")]
    pub datetime_PU: NaiveDateTime,
    #[serde(with = "chrono::naive::serde::ts_milliseconds")]
    pub datetime_DO: NaiveDateTime,
    pub passenger_count: Option<i32>,
    pub trip_distance: Option<f64>,
    #[serde(rename = "RatecodeID")]
    pub ratecode_id: Option<i32>,
    pub store_and_fwd_flag: Option<bool>,
    pub payment_type: Option<i32>,
    pub fare_amount: Decimal,
    pub extra: Decimal,
    pub mta_tax: Decimal,
    pub tip_amount: Decimal,
    pub tolls_amount: Decimal,
    pub improvement_surcharge: Decimal,
    pub total_amount: Decimal,
    pub Shape_Leng_PU: Option<f64>,
    pub the_geom_PU: Option<String>,
    pub Shape_Area_PU: Option<f64>,
    pub zone_PU: String,
    pub borough_PU: String,
    pub Shape_Leng_DO: Option<f64>,
    pub the_geom_DO: Option<String>,
    pub Shape_Area_DO: Option<f64>,
    pub zone_DO: String,
    pub borough_DO: String,
    pub app_id: String,
    pub date_PU: String,
}

impl JoinedRecord {
    /// Output column names in order, derived from the trip columns and the role suffixes.
    #[must_use]
    pub fn columns() -> Vec<String> {
        let mut cols: Vec<String> = TRIP_COLUMNS.iter().map(ToString::to_string).collect();
        for role in LocationRole::ALL {
            cols.extend(ZONE_ATTRIBUTE_COLUMNS.iter().map(|c| role.suffixed(c)));
        }
        cols.push(APP_ID_COLUMN.to_string());
        cols.push(DATE_PU_COLUMN.to_string());
        cols
    }

    /// Zone attributes attached for `role`.
    #[must_use]
    pub fn zone(&self, role: LocationRole) -> ZoneAttributes {
        match role {
            LocationRole::Pickup => ZoneAttributes {
                shape_leng: self.Shape_Leng_PU,
                the_geom: self.the_geom_PU.clone(),
                shape_area: self.Shape_Area_PU,
                zone: self.zone_PU.clone(),
                borough: self.borough_PU.clone(),
            },
            LocationRole::Dropoff => ZoneAttributes {
                shape_leng: self.Shape_Leng_DO,
                the_geom: self.the_geom_DO.clone(),
                shape_area: self.Shape_Area_DO,
                zone: self.zone_DO.clone(),
                borough: self.borough_DO.clone(),
            },
        }
    }
}

/// TLC timestamps: `01/31/2019 11:05:09 PM` in older exports, `2019-01-31 23:05:09` in newer ones.
pub mod tlc_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Format of the original TLC yellow-taxi exports.
    pub const TLC_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";
    /// ISO-like format of newer exports and of SQL text columns.
    pub const ISO_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Parse either accepted format.
    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        NaiveDateTime::parse_from_str(value, TLC_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(value, ISO_FORMAT))
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TLC_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

/// Monetary columns: any decimal or float literal, rounded to two places.
pub mod money {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::str::FromStr;

    /// Round to cents and pin the scale so every value renders with two decimals.
    #[must_use]
    pub fn to_cents(value: Decimal) -> Decimal {
        let mut v = value.round_dp(2);
        v.rescale(2);
        v
    }

    pub fn parse(value: &str) -> Option<Decimal> {
        let value = value.trim();
        Decimal::from_str(value)
            .or_else(|_| Decimal::from_scientific(value))
            .ok()
            .map(to_cents)
    }

    pub fn serialize<S: Serializer>(v: &Decimal, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&to_cents(*v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid amount '{raw}'")))
    }
}

/// Store-and-forward flag: `Y` / `N`, empty means unknown.
pub mod yes_no_flag {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(v: &Option<bool>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(true) => s.serialize_str("Y"),
            Some(false) => s.serialize_str("N"),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some("Y" | "y") => Ok(Some(true)),
            Some("N" | "n") => Ok(Some(false)),
            Some(other) => Err(D::Error::custom(format!(
                "invalid store_and_fwd_flag '{other}', expected Y or N"
            ))),
        }
    }
}
