//! Decoded vector features.

use serde::Serialize;
use std::fmt;

use crate::{CrsCode, Extent, LayerId};

/// A 2D coordinate `[x, y]`. Extra ordinates are dropped on decode.
pub type Coord = [f64; 2];

/// Property names that hold geometry and are never displayed as attributes.
pub const GEOMETRY_PROPERTY_NAMES: [&str; 2] = ["geometry", "geom"];

/// Check whether a property name refers to a geometry column.
pub fn is_geometry_property(name: &str) -> bool {
    GEOMETRY_PROPERTY_NAMES.contains(&name)
}

/// Geometry kinds as named in GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryKind {
    pub fn from_geojson(s: &str) -> Option<Self> {
        match s {
            "Point" => Some(Self::Point),
            "MultiPoint" => Some(Self::MultiPoint),
            "LineString" => Some(Self::LineString),
            "MultiLineString" => Some(Self::MultiLineString),
            "Polygon" => Some(Self::Polygon),
            "MultiPolygon" => Some(Self::MultiPolygon),
            "GeometryCollection" => Some(Self::GeometryCollection),
            _ => None,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point | Self::MultiPoint)
    }
}

/// Geometry shapes with their coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }

    /// Visit every coordinate in document order.
    pub fn for_each_coord<F: FnMut(&Coord)>(&self, f: &mut F) {
        match self {
            Geometry::Point(c) => f(c),
            Geometry::MultiPoint(cs) | Geometry::LineString(cs) => cs.iter().for_each(f),
            Geometry::MultiLineString(rings) | Geometry::Polygon(rings) => {
                rings.iter().flatten().for_each(f)
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(f),
            Geometry::GeometryCollection(geoms) => {
                for g in geoms {
                    g.for_each_coord(f);
                }
            }
        }
    }

    /// Bounding extent, or `None` for a geometry without coordinates.
    pub fn extent(&self) -> Option<Extent> {
        let mut extent: Option<Extent> = None;
        self.for_each_coord(&mut |c| match extent.as_mut() {
            Some(e) => e.extend_point(c[0], c[1]),
            None => extent = Some(Extent::from_point(c[0], c[1])),
        });
        extent
    }

    /// Rebuild the geometry with every coordinate passed through `f`.
    pub fn try_map_coords<E, F>(&self, f: &mut F) -> Result<Geometry, E>
    where
        F: FnMut(Coord) -> Result<Coord, E>,
    {
        fn line<E, F: FnMut(Coord) -> Result<Coord, E>>(
            cs: &[Coord],
            f: &mut F,
        ) -> Result<Vec<Coord>, E> {
            cs.iter().map(|c| f(*c)).collect()
        }

        Ok(match self {
            Geometry::Point(c) => Geometry::Point(f(*c)?),
            Geometry::MultiPoint(cs) => Geometry::MultiPoint(line(cs, f)?),
            Geometry::LineString(cs) => Geometry::LineString(line(cs, f)?),
            Geometry::MultiLineString(rings) => Geometry::MultiLineString(
                rings.iter().map(|r| line(r, f)).collect::<Result<_, E>>()?,
            ),
            Geometry::Polygon(rings) => Geometry::Polygon(
                rings.iter().map(|r| line(r, f)).collect::<Result<_, E>>()?,
            ),
            Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
                polys
                    .iter()
                    .map(|p| p.iter().map(|r| line(r, f)).collect::<Result<Vec<_>, E>>())
                    .collect::<Result<_, E>>()?,
            ),
            Geometry::GeometryCollection(geoms) => Geometry::GeometryCollection(
                geoms
                    .iter()
                    .map(|g| g.try_map_coords(f))
                    .collect::<Result<_, E>>()?,
            ),
        })
    }
}

/// A geometry together with the reference system of its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureGeometry {
    pub shape: Geometry,
    pub crs: CrsCode,
}

impl FeatureGeometry {
    pub fn extent(&self) -> Option<Extent> {
        self.shape.extent()
    }

    pub fn kind(&self) -> GeometryKind {
        self.shape.kind()
    }
}

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Convert a JSON value; arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(PropertyValue::Number)
                .unwrap_or_else(|| PropertyValue::Text(n.to_string())),
            serde_json::Value::String(s) => PropertyValue::Text(s.clone()),
            other => PropertyValue::Text(other.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => Ok(()),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Feature attributes in server order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Serialize for Properties {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All attributes, geometry columns included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attributes for display: geometry columns are skipped.
    pub fn displayable(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.iter().filter(|(k, _)| !is_geometry_property(k))
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// A decoded feature. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    /// Server-assigned id, e.g. "green_areas.42"
    pub id: Option<String>,

    /// Layer the feature was returned for
    pub layer: LayerId,

    pub geometry: Option<FeatureGeometry>,

    pub properties: Properties,
}

impl Feature {
    pub fn extent(&self) -> Option<Extent> {
        self.geometry.as_ref().and_then(|g| g.extent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            [x, y],
            [x + size, y],
            [x + size, y + size],
            [x, y + size],
            [x, y],
        ]])
    }

    #[test]
    fn test_polygon_extent() {
        let extent = square(10.0, 20.0, 5.0).extent().unwrap();
        assert_eq!(extent, Extent::new(10.0, 20.0, 15.0, 25.0));
    }

    #[test]
    fn test_collection_extent() {
        let geom = Geometry::GeometryCollection(vec![
            Geometry::Point([-3.0, 1.0]),
            square(0.0, 0.0, 2.0),
        ]);
        assert_eq!(geom.extent().unwrap(), Extent::new(-3.0, 0.0, 2.0, 2.0));
        assert!(Geometry::MultiPoint(vec![]).extent().is_none());
    }

    #[test]
    fn test_try_map_coords_keeps_structure() {
        let shifted: Result<Geometry, ()> =
            square(0.0, 0.0, 1.0).try_map_coords(&mut |c| Ok([c[0] + 100.0, c[1]]));
        let shifted = shifted.unwrap();
        assert_eq!(shifted.kind(), GeometryKind::Polygon);
        assert_eq!(shifted.extent().unwrap(), Extent::new(100.0, 0.0, 101.0, 1.0));
    }

    #[test]
    fn test_displayable_skips_geometry_columns() {
        let props: Properties = vec![
            ("name".to_string(), PropertyValue::Text("Central Park".into())),
            ("geom".to_string(), PropertyValue::Text("POLYGON(...)".into())),
            ("area".to_string(), PropertyValue::Number(3.4)),
        ]
        .into_iter()
        .collect();

        let shown: Vec<&str> = props.displayable().map(|(k, _)| k).collect();
        assert_eq!(shown, vec!["name", "area"]);
        assert!(props.get("geom").is_some());
    }

    #[test]
    fn test_property_value_from_json() {
        use serde_json::json;
        assert_eq!(PropertyValue::from_json(&json!(12)), PropertyValue::Number(12.0));
        assert_eq!(PropertyValue::from_json(&json!(null)), PropertyValue::Null);
        assert_eq!(
            PropertyValue::from_json(&json!([1, 2])),
            PropertyValue::Text("[1,2]".into())
        );
    }
}
