//! Run identifiers.
//!
//! An `app_id` is `YYYYMMDD_` (local date at run start) followed by ten lowercase hex
//! characters drawn from five random bytes, e.g. `20190615_3fa9c01b7e`. It is generated
//! once per run and passed explicitly to every stage that needs it.

use chrono::{Local, NaiveDate};
use rand::RngCore;
use regex::Regex;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::LazyLock;

static APP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8}_[0-9a-f]{10}$").expect("valid regex"));

/// Identifier stamped on every row written by one run.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    /// Fresh id for today.
    #[must_use]
    pub fn generate() -> Self {
        let mut token = [0u8; 5];
        rand::thread_rng().fill_bytes(&mut token);
        Self::from_parts(Local::now().date_naive(), token)
    }

    /// Deterministic id, for tests and replays.
    #[must_use]
    pub fn from_parts(date: NaiveDate, token: [u8; 5]) -> Self {
        Self(format!("{}_{}", date.format("%Y%m%d"), hex::encode(token)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `value` has the `YYYYMMDD_<10 hex>` shape.
    #[must_use]
    pub fn is_well_formed(value: &str) -> bool {
        APP_ID.is_match(value)
    }
}

impl Display for AppId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_well_formed_and_distinct() {
        let a = AppId::generate();
        let b = AppId::generate();
        assert!(AppId::is_well_formed(a.as_str()), "{a}");
        assert!(AppId::is_well_formed(b.as_str()), "{b}");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&Local::now().format("%Y%m%d").to_string()[..4]));
    }

    #[test]
    fn from_parts_is_deterministic() {
        let d = NaiveDate::from_ymd_opt(2019, 6, 15).unwrap();
        let id = AppId::from_parts(d, [0x3f, 0xa9, 0xc0, 0x1b, 0x7e]);
        assert_eq!(id.to_string(), "20190615_3fa9c01b7e");
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["2019061_3fa9c01b7e", "20190615-3fa9c01b7e", "20190615_3FA9C01B7E", "20190615_3fa9"] {
            assert!(!AppId::is_well_formed(bad), "{bad}");
        }
    }
}
