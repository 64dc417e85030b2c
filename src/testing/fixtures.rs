//! Pre-built zones and trips, and CSV writers for them.

use crate::io::compression::auto_detect_writer;
use crate::record::{TripRecord, ZoneRecord};
use crate::testing::builders::{TripBuilder, zone, zone_with_shape};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{File, create_dir_all};
use std::path::Path;

/// Eight zones over four boroughs; one borough name contains a space.
#[must_use]
pub fn sample_zones() -> Vec<ZoneRecord> {
    vec![
        zone_with_shape(1, "Newark Airport", "EWR", 0.116_357, 0.000_782),
        zone_with_shape(4, "Alphabet City", "Manhattan", 0.043_567, 0.000_186),
        zone_with_shape(7, "Astoria", "Queens", 0.107_417, 0.000_389),
        zone_with_shape(13, "Battery Park City", "Manhattan", 0.050_281, 0.000_149),
        zone(42, "Central Harlem North", "Manhattan"),
        zone_with_shape(132, "JFK Airport", "Queens", 0.357_000, 0.006_600),
        zone(200, "Riverdale/North Riverdale/Fieldston", "Bronx"),
        zone(206, "Saint George/New Brighton", "Staten Island"),
    ]
}

/// Thirty trips over three days around New Year 2019/2020.
///
/// Every seventh trip references location 999, which no zone has, on one side.
#[must_use]
pub fn sample_trips() -> Vec<TripRecord> {
    let ids = [1, 4, 7, 13, 42, 132, 200, 206];
    let days = ["2019-12-30", "2019-12-31", "2020-01-01"];
    (0..30u32)
        .map(|i| {
            let idx = i as usize;
            let mut pu = ids[idx % ids.len()];
            let mut dro = ids[(idx * 3 + 1) % ids.len()];
            if i % 7 == 3 {
                pu = 999;
            } else if i % 7 == 5 {
                dro = 999;
            }
            let day = days[idx % days.len()];
            let hour = 6 + (i % 17);
            TripBuilder::new(pu, dro)
                .pickup_at(&format!("{day} {hour:02}:{:02}:00", (i * 7) % 60))
                .dropoff_at(&format!("{day} {:02}:{:02}:30", hour + 1, (i * 7 + 13) % 60))
                .fare(&format!("{}.{:02}", 5 + i, (i * 37) % 100))
                .vendor(if i % 4 == 0 { None } else { Some(1 + (i % 2) as i32) })
                .passengers(if i % 5 == 0 { None } else { Some(1 + (i % 3) as i32) })
                .store_and_forward(match i % 3 {
                    0 => Some(true),
                    1 => Some(false),
                    _ => None,
                })
                .build()
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let w = auto_detect_writer(f, path)?;
    let mut wtr = csv::Writer::from_writer(w);
    for (i, row) in rows.iter().enumerate() {
        wtr.serialize(row)
            .with_context(|| format!("serialize CSV row #{}", i + 1))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write trips with TLC headers and timestamps; `.gz`/`.zst`/... compress the file.
///
/// # Errors
/// On I/O failure.
pub fn write_trips_csv(path: impl AsRef<Path>, trips: &[TripRecord]) -> Result<()> {
    write_csv(path.as_ref(), trips)
}

/// Write zones in the shapefile-export layout.
///
/// # Errors
/// On I/O failure.
pub fn write_zones_csv(path: impl AsRef<Path>, zones: &[ZoneRecord]) -> Result<()> {
    write_csv(path.as_ref(), zones)
}
