//! The taxi-zone reference table.
//!
//! Zones are loaded once per run and shared read-only by every unit of work. The
//! table is keyed by `LocationID`; a duplicate id would break the 1:1 multiplicity
//! of the zone join, so it is rejected at load time.

use crate::io::csv::read_csv_vec;
use crate::record::{ZoneAttributes, ZoneRecord};
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

/// `LocationID -> ZoneAttributes` lookup.
#[derive(Clone, Debug, Default)]
pub struct ZoneTable {
    by_id: HashMap<u32, ZoneAttributes>,
}

impl ZoneTable {
    /// Build from zone rows.
    ///
    /// # Errors
    /// If two rows share a `LocationID`.
    pub fn from_records(records: impl IntoIterator<Item = ZoneRecord>) -> Result<Self> {
        let mut by_id = HashMap::new();
        for record in records {
            let (id, attrs) = record.into_parts();
            match by_id.entry(id) {
                Entry::Occupied(_) => bail!("duplicate LocationID {id} in zones"),
                Entry::Vacant(slot) => {
                    slot.insert(attrs);
                }
            }
        }
        Ok(Self { by_id })
    }

    /// Load the zones CSV.
    ///
    /// # Errors
    /// On I/O or parse failure, or duplicate ids.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let records: Vec<ZoneRecord> = read_csv_vec(path)?;
        Self::from_records(records).with_context(|| format!("load zones from {}", path.display()))
    }

    #[must_use]
    pub fn get(&self, location_id: u32) -> Option<&ZoneAttributes> {
        self.by_id.get(&location_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Entries in ascending id order.
    #[must_use]
    pub fn sorted(&self) -> Vec<(u32, &ZoneAttributes)> {
        let mut entries: Vec<_> = self.by_id.iter().map(|(id, z)| (*id, z)).collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }
}
