//! Order-insensitive comparison of written datasets.

use crate::record::JoinedRecord;

/// Rows as JSON strings with `app_id` blanked, sorted.
///
/// Two runs over the same inputs produce equal vectors.
///
/// # Panics
/// If a row cannot be serialized to JSON.
#[must_use]
pub fn normalized_rows(rows: &[JoinedRecord]) -> Vec<String> {
    let mut out: Vec<String> = rows
        .iter()
        .map(|r| {
            let mut r = r.clone();
            r.app_id.clear();
            serde_json::to_string(&r).expect("serialize row")
        })
        .collect();
    out.sort();
    out
}

/// Assert both datasets hold the same rows, ignoring order and `app_id`.
///
/// # Panics
/// If they differ.
pub fn assert_same_rows(actual: &[JoinedRecord], expected: &[JoinedRecord]) {
    let a = normalized_rows(actual);
    let e = normalized_rows(expected);
    assert_eq!(
        a.len(),
        e.len(),
        "row count mismatch: expected {}, got {}",
        e.len(),
        a.len()
    );
    for (i, (a, e)) in a.iter().zip(&e).enumerate() {
        assert_eq!(a, e, "row mismatch at sorted position {i}");
    }
}

/// Assert every row carries exactly one `app_id`, and return it.
///
/// # Panics
/// If `rows` is empty or mixes ids.
pub fn single_app_id(rows: &[JoinedRecord]) -> String {
    let first = rows.first().expect("no rows").app_id.clone();
    assert!(
        rows.iter().all(|r| r.app_id == first),
        "rows carry more than one app_id"
    );
    first
}
