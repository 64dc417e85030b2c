//! Date-filter rules and their string syntax.
//!
//! A filter value is one of:
//!
//! | Input                   | Kind                         |
//! |-------------------------|------------------------------|
//! | `2019`                  | [`FilterKind::Year`]         |
//! | `2019-06`               | [`FilterKind::YearMonth`]    |
//! | `2019-06-15`            | [`FilterKind::Date`]         |
//! | `2019-06-01:2019-07-31` | [`FilterKind::Range`] (inclusive) |
//!
//! Shapes are tried in that order and the first match wins.

use crate::record::LocationRole;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::LazyLock;
use thiserror::Error;

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{4}$").expect("valid regex"));
static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}$").expect("valid regex"));
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid regex"));
static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}:[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid regex")
});

/// Errors raised while parsing a filter value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error(
        "unsupported filter format: '{0}' (expected YYYY, YYYY-MM, YYYY-MM-DD or YYYY-MM-DD:YYYY-MM-DD)"
    )]
    UnsupportedFormat(String),
    #[error("invalid calendar date in filter: '{0}'")]
    InvalidDate(String),
}

/// The shape of a date filter and its parsed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Year(i32),
    YearMonth { year: i32, month: u32 },
    Date(NaiveDate),
    /// Both bounds inclusive.
    Range { start: NaiveDate, end: NaiveDate },
}

impl FilterKind {
    /// Classify `value` into one of the four accepted shapes.
    ///
    /// # Errors
    /// [`FilterError::UnsupportedFormat`] when no shape matches, and
    /// [`FilterError::InvalidDate`] when a shape matches but names an impossible date.
    pub fn parse(value: &str) -> Result<Self, FilterError> {
        let invalid = || FilterError::InvalidDate(value.to_string());

        if YEAR.is_match(value) {
            let year = value.parse::<i32>().map_err(|_| invalid())?;
            Ok(FilterKind::Year(year))
        } else if YEAR_MONTH.is_match(value) {
            let first = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
                .map_err(|_| invalid())?;
            Ok(FilterKind::YearMonth {
                year: first.year(),
                month: first.month(),
            })
        } else if DATE.is_match(value) {
            let date = parse_date(value).ok_or_else(invalid)?;
            Ok(FilterKind::Date(date))
        } else if RANGE.is_match(value) {
            let (start, end) = value.split_once(':').ok_or_else(invalid)?;
            Ok(FilterKind::Range {
                start: parse_date(start).ok_or_else(invalid)?,
                end: parse_date(end).ok_or_else(invalid)?,
            })
        } else {
            Err(FilterError::UnsupportedFormat(value.to_string()))
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

impl Display for FilterKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            FilterKind::Year(y) => write!(f, "{y:04}"),
            FilterKind::YearMonth { year, month } => write!(f, "{year:04}-{month:02}"),
            FilterKind::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FilterKind::Range { start, end } => {
                write!(f, "{}:{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }
}

/// A date filter bound to the timestamp of one trip end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterRule {
    pub role: LocationRole,
    pub kind: FilterKind,
}

impl FilterRule {
    /// Parse `value` as a filter on `role`'s timestamp.
    ///
    /// # Errors
    /// See [`FilterKind::parse`].
    pub fn parse(role: LocationRole, value: &str) -> Result<Self, FilterError> {
        Ok(Self {
            role,
            kind: FilterKind::parse(value)?,
        })
    }
}

/// The filters of one run: at most one per role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterRules {
    pub pickup: Option<FilterRule>,
    pub dropoff: Option<FilterRule>,
}

impl FilterRules {
    /// Parse the optional pickup and drop-off filter values independently.
    ///
    /// # Errors
    /// The first value that fails to parse.
    pub fn parse(pickup: Option<&str>, dropoff: Option<&str>) -> Result<Self, FilterError> {
        Ok(Self {
            pickup: pickup
                .map(|v| FilterRule::parse(LocationRole::Pickup, v))
                .transpose()?,
            dropoff: dropoff
                .map(|v| FilterRule::parse(LocationRole::Dropoff, v))
                .transpose()?,
        })
    }

    /// Rules in combination order: pickup first, then drop-off.
    pub fn iter(&self) -> impl Iterator<Item = &FilterRule> {
        self.pickup.iter().chain(self.dropoff.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pickup.is_none() && self.dropoff.is_none()
    }
}
