//! Rule-to-predicate compilation, shared by every backend.
//!
//! The compiler only knows *which* primitive comparisons a rule expands to and in
//! what order they are combined. How a comparison is spelled is left to a
//! [`FragmentRenderer`], so the same algorithm produces a native expression tree for
//! the in-process backends and SQL text for the SQL engine.

use crate::filter::rule::{FilterKind, FilterRule, FilterRules};
use crate::record::LocationRole;
use chrono::NaiveDate;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Backend capability: spell primitive comparisons over a role's timestamp column.
pub trait FragmentRenderer {
    /// The backend's predicate representation.
    type Fragment: Display + Send + Sync;

    fn year_eq(&self, role: LocationRole, year: i32) -> Self::Fragment;
    fn month_eq(&self, role: LocationRole, month: u32) -> Self::Fragment;
    fn day_eq(&self, role: LocationRole, day: u32) -> Self::Fragment;
    /// Calendar date of the timestamp is on or after `date`.
    fn date_ge(&self, role: LocationRole, date: NaiveDate) -> Self::Fragment;
    /// Calendar date of the timestamp is on or before `date`.
    fn date_le(&self, role: LocationRole, date: NaiveDate) -> Self::Fragment;
    /// Logical AND; `left` is evaluated/rendered first.
    fn and(&self, left: Self::Fragment, right: Self::Fragment) -> Self::Fragment;
}

/// Result of compiling a run's filters.
#[derive(Clone, Debug, PartialEq)]
pub enum CompiledPredicate<F> {
    /// No rules: every row passes.
    Unfiltered,
    /// A single complete predicate.
    Filter(F),
}

impl<F> CompiledPredicate<F> {
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        matches!(self, CompiledPredicate::Unfiltered)
    }

    #[must_use]
    pub fn as_filter(&self) -> Option<&F> {
        match self {
            CompiledPredicate::Unfiltered => None,
            CompiledPredicate::Filter(f) => Some(f),
        }
    }
}

impl<F: Display> Display for CompiledPredicate<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            CompiledPredicate::Unfiltered => write!(f, "<no filtering>"),
            CompiledPredicate::Filter(p) => write!(f, "{p}"),
        }
    }
}

/// Expand one rule into its fragment.
pub fn compile_rule<R: FragmentRenderer>(rule: &FilterRule, r: &R) -> R::Fragment {
    let role = rule.role;
    match rule.kind {
        FilterKind::Year(year) => r.year_eq(role, year),
        FilterKind::YearMonth { year, month } => {
            r.and(r.year_eq(role, year), r.month_eq(role, month))
        }
        FilterKind::Date(date) => {
            use chrono::Datelike;
            r.and(
                r.and(r.year_eq(role, date.year()), r.month_eq(role, date.month())),
                r.day_eq(role, date.day()),
            )
        }
        FilterKind::Range { start, end } => r.and(r.date_ge(role, start), r.date_le(role, end)),
    }
}

/// Compile all rules of a run into one predicate.
///
/// Pickup comes first and drop-off second whenever both are present.
pub fn compile<R: FragmentRenderer>(rules: &FilterRules, r: &R) -> CompiledPredicate<R::Fragment> {
    let mut fragments = rules.iter().map(|rule| compile_rule(rule, r));
    let Some(first) = fragments.next() else {
        return CompiledPredicate::Unfiltered;
    };
    CompiledPredicate::Filter(fragments.fold(first, |acc, next| r.and(acc, next)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spells fragments as terse tokens so tests can assert structure and order.
    struct Tokens;

    impl FragmentRenderer for Tokens {
        type Fragment = String;

        fn year_eq(&self, role: LocationRole, year: i32) -> String {
            format!("Y{}={year}", role.suffix())
        }
        fn month_eq(&self, role: LocationRole, month: u32) -> String {
            format!("M{}={month}", role.suffix())
        }
        fn day_eq(&self, role: LocationRole, day: u32) -> String {
            format!("D{}={day}", role.suffix())
        }
        fn date_ge(&self, role: LocationRole, date: NaiveDate) -> String {
            format!("GE{}={date}", role.suffix())
        }
        fn date_le(&self, role: LocationRole, date: NaiveDate) -> String {
            format!("LE{}={date}", role.suffix())
        }
        fn and(&self, left: String, right: String) -> String {
            format!("({left} & {right})")
        }
    }

    fn rules(pickup: Option<&str>, dropoff: Option<&str>) -> FilterRules {
        FilterRules::parse(pickup, dropoff).unwrap()
    }

    #[test]
    fn no_rules_means_no_filtering() {
        let p = compile(&rules(None, None), &Tokens);
        assert!(p.is_unfiltered());
        assert_eq!(p.as_filter(), None);
    }

    #[test]
    fn single_rule_is_its_own_fragment() {
        let rule = rules(Some("2019"), None);
        let expected = compile_rule(rule.pickup.as_ref().unwrap(), &Tokens);
        assert_eq!(compile(&rule, &Tokens), CompiledPredicate::Filter(expected));
        assert_eq!(
            compile(&rules(None, Some("2019-06")), &Tokens),
            CompiledPredicate::Filter("(Y_DO=2019 & M_DO=6)".to_string())
        );
    }

    #[test]
    fn kinds_expand_to_their_comparisons() {
        let render = |v: &str| compile(&rules(Some(v), None), &Tokens).to_string();
        assert_eq!(render("2019"), "Y_PU=2019");
        assert_eq!(render("2019-06"), "(Y_PU=2019 & M_PU=6)");
        assert_eq!(render("2019-06-15"), "((Y_PU=2019 & M_PU=6) & D_PU=15)");
        assert_eq!(
            render("2019-06-01:2019-07-31"),
            "(GE_PU=2019-06-01 & LE_PU=2019-07-31)"
        );
    }

    #[test]
    fn two_rules_combine_pickup_first() {
        let p = compile(&rules(Some("2019"), Some("2020")), &Tokens);
        assert_eq!(p, CompiledPredicate::Filter("(Y_PU=2019 & Y_DO=2020)".to_string()));
    }

    #[test]
    fn unfiltered_displays_a_sentinel() {
        let p: CompiledPredicate<String> = CompiledPredicate::Unfiltered;
        assert_eq!(p.to_string(), "<no filtering>");
    }
}
