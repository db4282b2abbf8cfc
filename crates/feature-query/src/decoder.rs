//! Feature collection decoding.
//!
//! Turns a GeoJSON-like feature collection into [`Feature`] records with
//! geometries in the requested target CRS.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use map_common::{
    Coord, CrsCode, Feature, FeatureGeometry, Geometry, LayerId, Properties, PropertyValue,
    QueryError, QueryResult,
};
use ogc_protocol::exceptions::{looks_like_exception_report, parse_exception_report, summarize};
use projection::CrsRegistry;

#[derive(Debug, Deserialize)]
struct RawFeatureCollection {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(default)]
    crs: Option<RawCrs>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
    #[serde(default)]
    geometries: Vec<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawCrs {
    properties: RawCrsProperties,
}

#[derive(Debug, Deserialize)]
struct RawCrsProperties {
    name: String,
}

/// Reject exception reports before attempting JSON.
fn check_exception_report(body: &[u8]) -> QueryResult<()> {
    if !looks_like_exception_report(body) {
        return Ok(());
    }
    let text = String::from_utf8_lossy(body);
    match parse_exception_report(&text) {
        Ok(exceptions) => Err(QueryError::Decode(format!(
            "Service exception: {}",
            summarize(&exceptions)
        ))),
        // Not a report after all; let the JSON parser decide.
        Err(_) => Ok(()),
    }
}

fn parse_collection(body: &[u8]) -> QueryResult<RawFeatureCollection> {
    check_exception_report(body)?;
    let collection: RawFeatureCollection = serde_json::from_slice(body)?;
    match collection.kind.as_deref() {
        None | Some("FeatureCollection") => Ok(collection),
        Some(other) => Err(QueryError::Decode(format!(
            "expected a FeatureCollection, got '{}'",
            other
        ))),
    }
}

fn coord(value: &Value) -> QueryResult<Coord> {
    let parts = value
        .as_array()
        .ok_or_else(|| QueryError::Decode("coordinate is not an array".into()))?;
    match (
        parts.first().and_then(Value::as_f64),
        parts.get(1).and_then(Value::as_f64),
    ) {
        // Extra ordinates (z, m) are dropped.
        (Some(x), Some(y)) => Ok([x, y]),
        _ => Err(QueryError::Decode(format!("invalid coordinate {}", value))),
    }
}

fn array(value: &Value) -> QueryResult<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| QueryError::Decode(format!("expected an array, got {}", value)))
}

fn line(value: &Value) -> QueryResult<Vec<Coord>> {
    array(value)?.iter().map(coord).collect()
}

fn rings(value: &Value) -> QueryResult<Vec<Vec<Coord>>> {
    array(value)?.iter().map(line).collect()
}

fn geometry(raw: &RawGeometry) -> QueryResult<Geometry> {
    let c = &raw.coordinates;
    Ok(match raw.kind.as_str() {
        "Point" => Geometry::Point(coord(c)?),
        "MultiPoint" => Geometry::MultiPoint(line(c)?),
        "LineString" => Geometry::LineString(line(c)?),
        "MultiLineString" => Geometry::MultiLineString(rings(c)?),
        "Polygon" => Geometry::Polygon(rings(c)?),
        "MultiPolygon" => Geometry::MultiPolygon(array(c)?.iter().map(rings).collect::<QueryResult<_>>()?),
        "GeometryCollection" => Geometry::GeometryCollection(
            raw.geometries.iter().map(geometry).collect::<QueryResult<_>>()?,
        ),
        other => {
            return Err(QueryError::Decode(format!(
                "unsupported geometry type '{}'",
                other
            )))
        }
    })
}

fn feature_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reference system the collection's coordinates are in.
///
/// A `crs` member naming a known code wins; otherwise the CRS the request
/// asked for is assumed.
fn data_crs(collection: &RawFeatureCollection, request_crs: &CrsCode) -> CrsCode {
    match &collection.crs {
        Some(raw) => match CrsCode::parse(&raw.properties.name) {
            Ok(code) => code,
            Err(_) => {
                debug!(name = %raw.properties.name, "Unrecognised collection CRS");
                request_crs.clone()
            }
        },
        None => request_crs.clone(),
    }
}

/// Decode a feature collection for `layer`.
///
/// Geometries are transformed from the data CRS into `target_crs`. An
/// unknown data CRS is treated as the working projection of `crs_registry`.
pub fn decode_feature_collection(
    body: &[u8],
    layer: &LayerId,
    request_crs: &CrsCode,
    target_crs: &CrsCode,
    crs_registry: &CrsRegistry,
) -> QueryResult<Vec<Feature>> {
    let collection = parse_collection(body)?;
    let (source_crs, _) = crs_registry.resolve_or_working(&data_crs(&collection, request_crs));
    let (target_crs, _) = crs_registry.resolve_or_working(target_crs);

    let mut features = Vec::with_capacity(collection.features.len());
    for raw in &collection.features {
        let geometry = match &raw.geometry {
            Some(raw_geometry) => {
                let shape = geometry(raw_geometry)?;
                let shape = if source_crs == target_crs {
                    shape
                } else {
                    shape.try_map_coords(&mut |c: Coord| {
                        crs_registry
                            .transform_point(c[0], c[1], &source_crs, &target_crs)
                            .map(|(x, y)| [x, y])
                            .map_err(|e| QueryError::Decode(e.to_string()))
                    })?
                };
                Some(FeatureGeometry {
                    shape,
                    crs: target_crs.clone(),
                })
            }
            None => None,
        };

        let properties: Properties = raw
            .properties
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), PropertyValue::from_json(v)))
            .collect();

        features.push(Feature {
            id: raw.id.as_ref().and_then(feature_id),
            layer: layer.clone(),
            geometry,
            properties,
        });
    }

    debug!(layer = %layer, count = features.len(), crs = %target_crs, "Decoded features");
    Ok(features)
}

/// Distinct values of one property across a collection, sorted.
///
/// Null values are skipped; other scalars use their display form.
pub fn decode_property_values(body: &[u8], field: &str) -> QueryResult<Vec<String>> {
    let collection = parse_collection(body)?;
    let mut values = BTreeSet::new();
    for raw in &collection.features {
        match raw.properties.as_ref().and_then(|p| p.get(field)) {
            Some(Value::Null) | None => {}
            Some(value) => {
                let text = PropertyValue::from_json(value).to_string();
                if !text.is_empty() {
                    values.insert(text);
                }
            }
        }
    }
    if values.is_empty() && !collection.features.is_empty() {
        warn!(field = %field, "Suggestion response carried no values for the field");
    }
    Ok(values.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer() -> LayerId {
        LayerId::new("parks", "green_areas")
    }

    #[test]
    fn test_decode_polygon_feature() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": "green_areas.7",
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]},
                "properties": {"name": "Parque", "area": 12.5, "geom": null}
            }]
        });
        let registry = CrsRegistry::default();
        let features = decode_feature_collection(
            body.to_string().as_bytes(),
            &layer(),
            &CrsCode::web_mercator(),
            &CrsCode::web_mercator(),
            &registry,
        )
        .unwrap();

        assert_eq!(features.len(), 1);
        let feature = &features[0];
        assert_eq!(feature.id.as_deref(), Some("green_areas.7"));
        assert_eq!(feature.extent().unwrap().max_x, 10.0);
        assert_eq!(feature.properties.len(), 3);
        let displayable: Vec<&str> = feature.properties.displayable().map(|(k, _)| k).collect();
        assert!(!displayable.contains(&"geom"));
    }

    #[test]
    fn test_numeric_id_and_missing_geometry() {
        let body = br#"{"features":[{"id":42,"geometry":null,"properties":{"a":1}}]}"#;
        let registry = CrsRegistry::default();
        let features = decode_feature_collection(
            body,
            &layer(),
            &CrsCode::web_mercator(),
            &CrsCode::web_mercator(),
            &registry,
        )
        .unwrap();
        assert_eq!(features[0].id.as_deref(), Some("42"));
        assert!(features[0].geometry.is_none());
    }

    #[test]
    fn test_three_dimensional_coordinates() {
        let body = br#"{"type":"FeatureCollection","features":[{"geometry":{"type":"Point","coordinates":[1.5,2.5,30.0]},"properties":{}}]}"#;
        let registry = CrsRegistry::default();
        let features = decode_feature_collection(
            body,
            &layer(),
            &CrsCode::web_mercator(),
            &CrsCode::web_mercator(),
            &registry,
        )
        .unwrap();
        assert_eq!(
            features[0].geometry.as_ref().unwrap().shape,
            Geometry::Point([1.5, 2.5])
        );
    }

    #[test]
    fn test_collection_crs_member_drives_transform() {
        let body = json!({
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::4326"}},
            "features": [{"geometry": {"type": "Point", "coordinates": [-51.2177, -30.0346]}, "properties": {}}]
        });
        let registry = CrsRegistry::default();
        let features = decode_feature_collection(
            body.to_string().as_bytes(),
            &layer(),
            &CrsCode::web_mercator(),
            &CrsCode::web_mercator(),
            &registry,
        )
        .unwrap();

        let geometry = features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.crs, CrsCode::web_mercator());
        match geometry.shape {
            Geometry::Point([x, y]) => {
                assert!((x - (-5701528.28)).abs() < 0.1);
                assert!((y - (-3507998.13)).abs() < 0.1);
            }
            ref other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let registry = CrsRegistry::default();
        let crs = CrsCode::web_mercator();
        let result = decode_feature_collection(b"<html>oops</html>", &layer(), &crs, &crs, &registry);
        assert!(matches!(result, Err(QueryError::Decode(_))));

        let result = decode_feature_collection(
            br#"{"type":"Feature","geometry":null}"#,
            &layer(),
            &crs,
            &crs,
            &registry,
        );
        assert!(matches!(result, Err(QueryError::Decode(_))));
    }

    #[test]
    fn test_exception_report_is_decode_error_with_message() {
        let body = br#"<ServiceExceptionReport version="1.1.1"><ServiceException code="LayerNotQueryable">Layer not queryable</ServiceException></ServiceExceptionReport>"#;
        let registry = CrsRegistry::default();
        let crs = CrsCode::web_mercator();
        match decode_feature_collection(body, &layer(), &crs, &crs, &registry) {
            Err(QueryError::Decode(message)) => {
                assert!(message.contains("Layer not queryable"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_property_values_sorted_and_distinct() {
        let body = br#"{"type":"FeatureCollection","features":[
            {"properties":{"name":"Rua B"}},
            {"properties":{"name":"Rua A"}},
            {"properties":{"name":"Rua B"}},
            {"properties":{"name":null}},
            {"properties":{}}
        ]}"#;
        assert_eq!(
            decode_property_values(body, "name").unwrap(),
            vec!["Rua A".to_string(), "Rua B".to_string()]
        );
    }
}
