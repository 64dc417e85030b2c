use chrono::NaiveDate;
use taxi_ingest::filter::{
    CompiledPredicate, FilterError, FilterKind, FilterRules, NativeRenderer, SqlRenderer, TripExpr,
    compile,
};
use taxi_ingest::record::LocationRole;
use taxi_ingest::testing::TripBuilder;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn every_four_digit_year_parses() {
    for year in (0..=9999).step_by(37).chain([1000, 2019, 9999]) {
        let input = format!("{year:04}");
        assert_eq!(FilterKind::parse(&input), Ok(FilterKind::Year(year)), "{input}");
    }
}

#[test]
fn each_shape_parses_to_its_kind() {
    assert_eq!(
        FilterKind::parse("2019-06"),
        Ok(FilterKind::YearMonth {
            year: 2019,
            month: 6
        })
    );
    assert_eq!(
        FilterKind::parse("2019-06-15"),
        Ok(FilterKind::Date(date(2019, 6, 15)))
    );
    assert_eq!(
        FilterKind::parse("2019-06-01:2019-07-31"),
        Ok(FilterKind::Range {
            start: date(2019, 6, 1),
            end: date(2019, 7, 31)
        })
    );
}

#[test]
fn malformed_values_are_rejected_with_the_value() {
    for bad in [
        "", "19", "20190", "2019-6", "2019/06", "2019-06-1", "2019-06:2019-07", " 2019",
        "2019-06-01:", "abcd",
    ] {
        let err = FilterKind::parse(bad).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedFormat(_)), "{bad:?}");
        assert!(err.to_string().contains(&format!("'{bad}'")));
    }
}

#[test]
fn impossible_dates_are_rejected() {
    for bad in ["2019-13", "2019-00", "2019-02-30", "2019-06-01:2019-06-31"] {
        assert!(
            matches!(FilterKind::parse(bad), Err(FilterError::InvalidDate(_))),
            "{bad}"
        );
    }
}

#[test]
fn both_roles_parse_independently() {
    let err = FilterRules::parse(Some("2019"), Some("June")).unwrap_err();
    assert!(err.to_string().contains("June"));

    let rules = FilterRules::parse(None, Some("2019-06")).unwrap();
    assert!(rules.pickup.is_none());
    assert_eq!(rules.dropoff.map(|r| r.role), Some(LocationRole::Dropoff));
}

#[test]
fn compile_orders_pickup_before_dropoff_for_every_renderer() {
    let rules = FilterRules::parse(Some("2019"), Some("2020")).unwrap();

    let native = compile(&rules, &NativeRenderer);
    assert_eq!(
        native,
        CompiledPredicate::Filter(TripExpr::And(
            Box::new(TripExpr::YearEq(LocationRole::Pickup, 2019)),
            Box::new(TripExpr::YearEq(LocationRole::Dropoff, 2020)),
        ))
    );

    let sql = compile(&rules, &SqlRenderer::default()).to_string();
    let pu = sql.find("datetime_PU").unwrap();
    let dro = sql.find("datetime_DO").unwrap();
    assert!(pu < dro, "{sql}");
}

#[test]
fn native_predicates_follow_calendar_semantics() {
    let trip = TripBuilder::new(1, 2)
        .pickup_at("2019-12-31 23:59:59")
        .dropoff_at("2020-01-01 00:10:00")
        .build();
    let matches = |pickup: Option<&str>, dropoff: Option<&str>| {
        let rules = FilterRules::parse(pickup, dropoff).unwrap();
        match compile(&rules, &NativeRenderer) {
            CompiledPredicate::Unfiltered => true,
            CompiledPredicate::Filter(expr) => expr.eval(&trip),
        }
    };

    assert!(matches(None, None));
    assert!(matches(Some("2019"), Some("2020")));
    assert!(matches(Some("2019-12"), Some("2020-01-01")));
    assert!(matches(Some("2019-12-31:2019-12-31"), None));
    assert!(matches(None, Some("2019-12-01:2020-01-01")));
    assert!(!matches(Some("2020"), None));
    assert!(!matches(None, Some("2019-12-31")));
    assert!(!matches(Some("2020-01-01:2019-12-01"), None));
}
