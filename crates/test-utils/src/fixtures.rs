//! Common test fixtures.
//!
//! Bodies are built with `serde_json::json!` and returned as strings, the
//! way a server would send them.

use serde_json::{json, Value};

use map_common::LayerDescriptor;

/// Extents used across tests.
pub mod bbox {
    /// Half the width of the Web Mercator world
    pub const MERCATOR_HALF_WORLD: f64 = 20_037_508.342_789_244;

    /// Full Web Mercator world width
    pub const MERCATOR_WORLD: f64 = 2.0 * MERCATOR_HALF_WORLD;

    /// Porto Alegre city centre in EPSG:3857
    pub const PORTO_ALEGRE: (f64, f64) = (-5_701_000.0, -3_508_000.0);
}

/// A GeoJSON feature with a point geometry.
pub fn point_feature(id: &str, x: f64, y: f64, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": { "type": "Point", "coordinates": [x, y] },
        "properties": properties,
    })
}

/// A GeoJSON feature whose polygon is the rectangle `(min_x, min_y, max_x, max_y)`.
pub fn polygon_feature(id: &str, rect: (f64, f64, f64, f64), properties: Value) -> Value {
    let (min_x, min_y, max_x, max_y) = rect;
    json!({
        "type": "Feature",
        "id": id,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [min_x, min_y],
                [max_x, min_y],
                [max_x, max_y],
                [min_x, max_y],
                [min_x, min_y]
            ]]
        },
        "properties": properties,
    })
}

/// A GeoJSON feature without geometry.
pub fn attribute_only_feature(id: &str, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": null,
        "properties": properties,
    })
}

pub fn feature_collection(features: Vec<Value>) -> String {
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
    .to_string()
}

/// A collection declaring its CRS, e.g. "urn:ogc:def:crs:EPSG::4326".
pub fn feature_collection_with_crs(features: Vec<Value>, crs_name: &str) -> String {
    json!({
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": crs_name } },
        "features": features,
    })
    .to_string()
}

pub fn empty_collection() -> String {
    feature_collection(Vec::new())
}

/// Collection of features carrying only `field`, as returned for a
/// property-restricted request.
pub fn property_collection(field: &str, values: &[Value]) -> String {
    let features = values
        .iter()
        .enumerate()
        .map(|(i, value)| attribute_only_feature(&format!("f.{}", i + 1), json!({ field: value })))
        .collect();
    feature_collection(features)
}

/// JSON DescribeFeatureType answer for one type.
pub fn describe_feature_type(type_name: &str, properties: &[(&str, &str)]) -> String {
    let properties: Vec<Value> = properties
        .iter()
        .map(|&(name, type_token)| {
            json!({
                "name": name,
                "maxOccurs": 1,
                "minOccurs": 0,
                "nillable": true,
                "type": type_token,
                "localType": type_token.rsplit(':').next().unwrap_or(type_token),
            })
        })
        .collect();
    json!({
        "elementFormDefault": "qualified",
        "targetNamespace": "http://example.org/features",
        "targetPrefix": type_name.split(':').next().unwrap_or(type_name),
        "featureTypes": [{
            "typeName": type_name.rsplit(':').next().unwrap_or(type_name),
            "properties": properties,
        }],
    })
    .to_string()
}

/// WMS 1.1.1 style service exception report.
pub fn exception_report(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ServiceExceptionReport version="1.1.1">
  <ServiceException code="{}">{}</ServiceException>
</ServiceExceptionReport>"#,
        code, message
    )
}

/// Descriptor of a vector layer advertising Web Mercator.
pub fn layer_descriptor(name: &str, title: &str) -> LayerDescriptor {
    LayerDescriptor {
        name: name.to_string(),
        title: Some(title.to_string()),
        crs: vec!["EPSG:4326".to_string(), "EPSG:3857".to_string()],
        keywords: vec!["features".to_string()],
        styles: vec!["polygon".to_string()],
        geographic_bbox: None,
    }
}

/// Descriptor of a layer the raster heuristic flags.
pub fn raster_descriptor(name: &str, title: &str) -> LayerDescriptor {
    LayerDescriptor {
        keywords: vec!["WCS".to_string(), "GeoTIFF".to_string()],
        styles: vec!["raster".to_string()],
        ..layer_descriptor(name, title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_ring_is_closed() {
        let feature = polygon_feature("a.1", (0.0, 0.0, 1.0, 2.0), json!({}));
        let ring = &feature["geometry"]["coordinates"][0];
        assert_eq!(ring[0], ring[4]);
    }

    #[test]
    fn test_describe_feature_type_shape() {
        let body = describe_feature_type("city:buildings", &[("height", "xsd:double")]);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["featureTypes"][0]["typeName"], "buildings");
        assert_eq!(value["featureTypes"][0]["properties"][0]["localType"], "double");
    }
}
