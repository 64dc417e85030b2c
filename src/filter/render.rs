//! Concrete [`FragmentRenderer`]s.
//!
//! - [`NativeRenderer`] builds a [`TripExpr`] tree evaluated directly against
//!   [`TripRecord`]s by the `local` and `cluster` backends. It prints in
//!   dataframe-query syntax for logs.
//! - [`SqlRenderer`] emits SQLite boolean expressions for the `sql` backend.

use crate::filter::compile::FragmentRenderer;
use crate::record::{LocationRole, TripRecord};
use chrono::{Datelike, NaiveDate};
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Evaluable predicate over a trip's timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TripExpr {
    YearEq(LocationRole, i32),
    MonthEq(LocationRole, u32),
    DayEq(LocationRole, u32),
    DateGe(LocationRole, NaiveDate),
    DateLe(LocationRole, NaiveDate),
    And(Box<TripExpr>, Box<TripExpr>),
}

impl TripExpr {
    /// Evaluate against one trip.
    #[must_use]
    pub fn eval(&self, trip: &TripRecord) -> bool {
        match self {
            TripExpr::YearEq(role, y) => trip.time_of(*role).year() == *y,
            TripExpr::MonthEq(role, m) => trip.time_of(*role).month() == *m,
            TripExpr::DayEq(role, d) => trip.time_of(*role).day() == *d,
            TripExpr::DateGe(role, date) => trip.time_of(*role).date() >= *date,
            TripExpr::DateLe(role, date) => trip.time_of(*role).date() <= *date,
            TripExpr::And(l, r) => l.eval(trip) && r.eval(trip),
        }
    }
}

impl Display for TripExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            TripExpr::YearEq(role, y) => write!(f, "{}.dt.year == {y}", role.time_column()),
            TripExpr::MonthEq(role, m) => write!(f, "{}.dt.month == {m}", role.time_column()),
            TripExpr::DayEq(role, d) => write!(f, "{}.dt.day == {d}", role.time_column()),
            TripExpr::DateGe(role, date) => write!(
                f,
                "{}.dt.date >= Timestamp({},{},{})",
                role.time_column(),
                date.year(),
                date.month(),
                date.day()
            ),
            TripExpr::DateLe(role, date) => write!(
                f,
                "{}.dt.date <= Timestamp({},{},{})",
                role.time_column(),
                date.year(),
                date.month(),
                date.day()
            ),
            TripExpr::And(l, r) => write!(f, "{l} and {r}"),
        }
    }
}

/// Renders rules into [`TripExpr`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeRenderer;

impl FragmentRenderer for NativeRenderer {
    type Fragment = TripExpr;

    fn year_eq(&self, role: LocationRole, year: i32) -> TripExpr {
        TripExpr::YearEq(role, year)
    }
    fn month_eq(&self, role: LocationRole, month: u32) -> TripExpr {
        TripExpr::MonthEq(role, month)
    }
    fn day_eq(&self, role: LocationRole, day: u32) -> TripExpr {
        TripExpr::DayEq(role, day)
    }
    fn date_ge(&self, role: LocationRole, date: NaiveDate) -> TripExpr {
        TripExpr::DateGe(role, date)
    }
    fn date_le(&self, role: LocationRole, date: NaiveDate) -> TripExpr {
        TripExpr::DateLe(role, date)
    }
    fn and(&self, left: TripExpr, right: TripExpr) -> TripExpr {
        TripExpr::And(Box::new(left), Box::new(right))
    }
}

/// Renders rules into SQLite boolean expressions.
///
/// Timestamps are expected as `YYYY-MM-DD HH:MM:SS` text, which SQLite's date
/// functions understand.
#[derive(Clone, Debug, Default)]
pub struct SqlRenderer {
    qualifier: Option<String>,
}

impl SqlRenderer {
    /// Qualify every column with a table alias (`t.datetime_PU`).
    #[must_use]
    pub fn qualified(alias: impl Into<String>) -> Self {
        Self {
            qualifier: Some(alias.into()),
        }
    }

    fn column(&self, role: LocationRole) -> String {
        match &self.qualifier {
            Some(q) => format!("{q}.{}", role.time_column()),
            None => role.time_column().to_string(),
        }
    }

    fn part_eq(&self, role: LocationRole, pattern: &str, value: i64) -> String {
        format!(
            "CAST(strftime('{pattern}', {}) AS INTEGER) = {value}",
            self.column(role)
        )
    }
}

impl FragmentRenderer for SqlRenderer {
    type Fragment = String;

    fn year_eq(&self, role: LocationRole, year: i32) -> String {
        self.part_eq(role, "%Y", i64::from(year))
    }
    fn month_eq(&self, role: LocationRole, month: u32) -> String {
        self.part_eq(role, "%m", i64::from(month))
    }
    fn day_eq(&self, role: LocationRole, day: u32) -> String {
        self.part_eq(role, "%d", i64::from(day))
    }
    fn date_ge(&self, role: LocationRole, date: NaiveDate) -> String {
        format!("date({}) >= '{}'", self.column(role), date.format("%Y-%m-%d"))
    }
    fn date_le(&self, role: LocationRole, date: NaiveDate) -> String {
        format!("date({}) <= '{}'", self.column(role), date.format("%Y-%m-%d"))
    }
    fn and(&self, left: String, right: String) -> String {
        format!("{left} AND {right}")
    }
}
