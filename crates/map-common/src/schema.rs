//! Attribute schemas derived from schema-description responses.

use serde::{Deserialize, Serialize};

use crate::feature::is_geometry_property;
use crate::LayerId;

/// Searchable type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
}

impl FieldType {
    /// Classify a reported type token such as "xsd:string" or "int".
    ///
    /// Anything mentioning string, text or char is a string; everything else
    /// is treated as numeric.
    pub fn classify(type_token: &str) -> Self {
        let token = type_token.to_lowercase();
        if token.contains("string") || token.contains("text") || token.contains("char") {
            FieldType::String
        } else {
            FieldType::Number
        }
    }
}

/// One searchable attribute of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// The geometry column of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometryField {
    pub name: String,
    pub type_token: String,
}

impl GeometryField {
    pub fn is_point(&self) -> bool {
        self.type_token.contains("Point")
    }
}

const GEOMETRY_TYPE_TOKENS: [&str; 7] = [
    "gml:",
    "Geometry",
    "Point",
    "LineString",
    "Polygon",
    "Curve",
    "Surface",
];

fn is_geometry_type(type_token: &str) -> bool {
    GEOMETRY_TYPE_TOKENS.iter().any(|t| type_token.contains(t))
}

/// Attribute schema of one layer, cached for the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSchema {
    pub layer: LayerId,
    pub fields: Vec<LayerFieldSchema>,
    pub geometry: Option<GeometryField>,
}

impl LayerSchema {
    /// Build from `(name, type token)` pairs in document order.
    ///
    /// Geometry columns, whether recognized by name or by type, are kept out
    /// of the searchable fields; the first one is recorded as the geometry.
    pub fn from_properties<'a, I>(layer: LayerId, properties: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fields = Vec::new();
        let mut geometry = None;

        for (name, type_token) in properties {
            if is_geometry_type(type_token) || is_geometry_property(name) {
                if geometry.is_none() {
                    geometry = Some(GeometryField {
                        name: name.to_string(),
                        type_token: type_token.to_string(),
                    });
                }
                continue;
            }
            fields.push(LayerFieldSchema {
                name: name.to_string(),
                field_type: FieldType::classify(type_token),
            });
        }

        Self {
            layer,
            fields,
            geometry,
        }
    }

    pub fn field(&self, name: &str) -> Option<&LayerFieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_point_layer(&self) -> bool {
        self.geometry.as_ref().map(|g| g.is_point()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_field_type() {
        assert_eq!(FieldType::classify("xsd:string"), FieldType::String);
        assert_eq!(FieldType::classify("VARCHAR"), FieldType::String);
        assert_eq!(FieldType::classify("text"), FieldType::String);
        assert_eq!(FieldType::classify("xsd:int"), FieldType::Number);
        assert_eq!(FieldType::classify("double"), FieldType::Number);
        assert_eq!(FieldType::classify("date"), FieldType::Number);
    }

    #[test]
    fn test_schema_excludes_geometry() {
        let schema = LayerSchema::from_properties(
            LayerId::new("city", "trees"),
            vec![
                ("the_geom", "gml:Point"),
                ("species", "xsd:string"),
                ("height", "xsd:double"),
                ("geom", "xsd:string"),
            ],
        );

        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["species", "height"]);
        assert_eq!(schema.geometry.as_ref().unwrap().name, "the_geom");
        assert!(schema.is_point_layer());
        assert_eq!(schema.field("height").unwrap().field_type, FieldType::Number);
    }

    #[test]
    fn test_polygon_layer_is_not_point_layer() {
        let schema = LayerSchema::from_properties(
            LayerId::new("city", "parks"),
            vec![("geometry", "gml:MultiPolygon"), ("name", "string")],
        );
        assert!(!schema.is_point_layer());
    }
}
