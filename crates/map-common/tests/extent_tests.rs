//! Tests for Extent operations used by the query resolvers.

use map_common::extent::{Extent, ExtentParseError};

// ============================================================================
// from_wms_string / to_wms_string tests
// ============================================================================

#[test]
fn test_parse_wms_extent_web_mercator() {
    let extent =
        Extent::from_wms_string("-20037508.34,-20037508.34,20037508.34,20037508.34").unwrap();
    assert!((extent.min_x - (-20037508.34)).abs() < 0.01);
    assert!((extent.max_x - 20037508.34).abs() < 0.01);
}

#[test]
fn test_parse_wms_extent_invalid_format() {
    assert!(matches!(
        Extent::from_wms_string("0,0,100"),
        Err(ExtentParseError::InvalidFormat(_))
    ));
    assert!(matches!(
        Extent::from_wms_string(""),
        Err(ExtentParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_parse_wms_extent_invalid_number() {
    assert!(matches!(
        Extent::from_wms_string("abc,0,100,100"),
        Err(ExtentParseError::InvalidNumber(_))
    ));
}

#[test]
fn test_wms_string_roundtrip() {
    let extent = Extent::new(-5712000.5, -3510000.0, -5700000.0, -3500000.25);
    let parsed = Extent::from_wms_string(&extent.to_wms_string()).unwrap();
    assert_eq!(parsed, extent);
}

// ============================================================================
// Intersection tests
// ============================================================================

#[test]
fn test_extent_intersects_adjacent_edge() {
    // Touching at an edge counts as intersecting (closed interval)
    let a = Extent::new(0.0, 0.0, 10.0, 10.0);
    let b = Extent::new(10.0, 0.0, 20.0, 10.0);
    assert!(a.intersects(&b));
    assert!(b.intersects(&a));
}

#[test]
fn test_extent_intersects_point_extent() {
    let area = Extent::new(0.0, 0.0, 10.0, 10.0);
    assert!(area.intersects(&Extent::from_point(5.0, 5.0)));
    assert!(!area.intersects(&Extent::from_point(10.5, 5.0)));
}

#[test]
fn test_extent_intersects_no_overlap() {
    let a = Extent::new(0.0, 0.0, 10.0, 10.0);
    let b = Extent::new(20.0, 20.0, 30.0, 30.0);
    assert!(!a.intersects(&b));
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_extent_intersects_contains() {
    let outer = Extent::new(0.0, 0.0, 100.0, 100.0);
    let inner = Extent::new(25.0, 25.0, 75.0, 75.0);
    assert!(outer.intersects(&inner));
    assert!(inner.intersects(&outer));
    assert_eq!(outer.intersection(&inner).unwrap(), inner);
}

// ============================================================================
// Buffer / translate / clamp tests
// ============================================================================

#[test]
fn test_extent_buffer() {
    let extent = Extent::from_point(100.0, 200.0).buffer(10.0);
    assert_eq!(extent, Extent::new(90.0, 190.0, 110.0, 210.0));
}

#[test]
fn test_extent_translate_x() {
    let extent = Extent::new(0.0, 1.0, 10.0, 2.0).translate_x(-40.0);
    assert_eq!(extent, Extent::new(-40.0, 1.0, -30.0, 2.0));
}

#[test]
fn test_extent_clamp_to() {
    let bounds = Extent::new(-180.0, -90.0, 180.0, 90.0);
    let clamped = Extent::new(170.0, -100.0, 200.0, 10.0).clamp_to(&bounds);
    assert_eq!(clamped, Extent::new(170.0, -90.0, 180.0, 10.0));
}

#[test]
fn test_extent_union() {
    let a = Extent::new(0.0, 0.0, 1.0, 1.0);
    let b = Extent::new(5.0, -2.0, 6.0, 0.5);
    assert_eq!(a.union(&b), Extent::new(0.0, -2.0, 6.0, 1.0));
}

// ============================================================================
// Validity
// ============================================================================

#[test]
fn test_extent_inverted_is_invalid_until_normalized() {
    let extent = Extent::new(10.0, 10.0, 0.0, 0.0);
    assert!(!extent.is_valid());
    assert!(extent.normalized().is_valid());
}

#[test]
fn test_extent_nan_is_invalid() {
    assert!(!Extent::new(f64::NAN, 0.0, 1.0, 1.0).is_valid());
}
