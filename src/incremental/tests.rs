//! Tests for incremental loading

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cmp::Ordering;
use test_case::test_case;

fn deals_rule() -> IncrementalRule {
    IncrementalRule::new("update_time", "since", "2024-01-01 00:00:00")
}

// ============================================================================
// Cursor Value Tests
// ============================================================================

#[test_case("2024-03-01 10:00:00", "2024-02-28 23:59:59", Ordering::Greater ; "pipedrive timestamps")]
#[test_case("2024-03-01T10:00:00Z", "2024-03-01 11:00:00", Ordering::Less ; "rfc3339 against naive")]
#[test_case("2024-03-01T12:00:00+02:00", "2024-03-01 10:00:00", Ordering::Equal ; "offset normalised to utc")]
#[test_case("2024-03-01", "2024-03-01 00:00:01", Ordering::Less ; "plain date")]
#[test_case("9", "10", Ordering::Less ; "numbers compare numerically")]
#[test_case("abc", "abd", Ordering::Less ; "text compares lexically")]
#[test_case("100", "2024-01-01", Ordering::Less ; "mixed kinds compare as text")]
fn test_cursor_value_ordering(a: &str, b: &str, expected: Ordering) {
    assert_eq!(CursorValue::parse(a).compare(&CursorValue::parse(b)), expected);
}

#[test]
fn test_cursor_value_keeps_raw_text() {
    let value = CursorValue::parse("2024-03-01 10:00:00");
    assert!(value.is_timestamp());
    assert_eq!(value.as_str(), "2024-03-01 10:00:00");
    assert_eq!(value.to_string(), "2024-03-01 10:00:00");
}

// ============================================================================
// Rule Tests
// ============================================================================

#[test]
fn test_rule_starting_value() {
    let rule = deals_rule();
    assert!(rule.filter_stale);
    assert_eq!(rule.starting_value(None), "2024-01-01 00:00:00");
    assert_eq!(rule.starting_value(Some("2024-05-01 00:00:00")), "2024-05-01 00:00:00");
    assert!(!rule.with_filter(false).filter_stale);
}

// ============================================================================
// Tracker Tests
// ============================================================================

#[test]
fn test_tracker_takes_maximum() {
    let rule = deals_rule();
    let mut tracker = WatermarkTracker::new(&rule, rule.starting_value(None));

    for ts in ["2024-02-01 00:00:00", "2024-03-15 08:30:00", "2024-03-01 00:00:00"] {
        let admission = tracker.observe(&json!({"id": 1, "update_time": ts})).unwrap();
        assert_eq!(admission, Admission::Keep);
    }

    assert_eq!(tracker.max_seen(), Some("2024-03-15 08:30:00"));
    assert_eq!(tracker.finish(), "2024-03-15 08:30:00");
    assert_eq!(tracker.stats().kept, 3);
}

#[test]
fn test_tracker_without_records_keeps_prior() {
    let rule = deals_rule();
    let tracker = WatermarkTracker::new(&rule, "2024-06-01 00:00:00");
    assert_eq!(tracker.max_seen(), None);
    assert_eq!(tracker.finish(), "2024-06-01 00:00:00");
}

#[test]
fn test_tracker_drops_stale_but_keeps_equal() {
    let rule = deals_rule();
    let mut tracker = WatermarkTracker::new(&rule, "2024-06-01 00:00:00");

    let stale = tracker
        .observe(&json!({"update_time": "2024-05-31 23:59:59"}))
        .unwrap();
    let equal = tracker
        .observe(&json!({"update_time": "2024-06-01 00:00:00"}))
        .unwrap();

    assert_eq!(stale, Admission::DropStale);
    assert!(!stale.is_loaded());
    assert_eq!(equal, Admission::Keep);
    assert_eq!(tracker.stats().dropped_stale, 1);
}

#[test]
fn test_tracker_unfiltered_never_lowers_watermark() {
    let rule = deals_rule().with_filter(false);
    let mut tracker = WatermarkTracker::new(&rule, "2024-06-01 00:00:00");

    let admission = tracker
        .observe(&json!({"update_time": "2023-01-01 00:00:00"}))
        .unwrap();
    assert_eq!(admission, Admission::Keep);
    assert_eq!(tracker.finish(), "2024-06-01 00:00:00");
}

#[test]
fn test_tracker_null_and_missing_are_non_comparable() {
    let rule = deals_rule();
    let mut tracker = WatermarkTracker::new(&rule, "2024-01-01 00:00:00");

    assert_eq!(
        tracker.observe(&json!({"id": 1, "update_time": null})).unwrap(),
        Admission::NonComparable
    );
    assert_eq!(
        tracker.observe(&json!({"id": 2})).unwrap(),
        Admission::NonComparable
    );
    assert!(Admission::NonComparable.is_loaded());
    assert_eq!(tracker.stats().non_comparable, 2);
    assert_eq!(tracker.finish(), "2024-01-01 00:00:00");
}

#[test]
fn test_tracker_nested_cursor_path() {
    let rule = IncrementalRule::new("data.update_time", "since_timestamp", "2024-01-01 00:00:00");
    let mut tracker = WatermarkTracker::new(&rule, "2024-01-01 00:00:00");

    tracker
        .observe(&json!({"item": "note", "data": {"update_time": "2024-02-02 00:00:00"}}))
        .unwrap();
    assert_eq!(tracker.finish(), "2024-02-02 00:00:00");
}

#[test]
fn test_tracker_object_cursor_is_data_shape() {
    let rule = deals_rule();
    let mut tracker = WatermarkTracker::new(&rule, "2024-01-01 00:00:00");

    let err = tracker
        .observe(&json!({"update_time": {"value": "2024-02-02"}}))
        .unwrap_err();
    assert!(matches!(err, Error::DataShape { ref path, .. } if path == "update_time"));
}

#[test]
fn test_tracker_numeric_cursor() {
    let rule = IncrementalRule::new("id", "since_id", "0");
    let mut tracker = WatermarkTracker::new(&rule, "0");

    for id in [7, 120, 99] {
        tracker.observe(&json!({"id": id})).unwrap();
    }
    assert_eq!(tracker.finish(), "120");
}
