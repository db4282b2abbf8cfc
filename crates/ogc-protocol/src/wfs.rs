//! WFS 1.0.0 GetFeature and DescribeFeatureType.

use serde::Deserialize;

use map_common::CrsCode;

use crate::QueryParams;

pub const WFS_VERSION: &str = "1.0.0";

/// Output format asking the server for GeoJSON.
pub const JSON_OUTPUT_FORMAT: &str = "application/json";

/// GetFeature request with an optional CQL filter.
#[derive(Debug, Clone, PartialEq)]
pub struct GetFeatureRequest {
    /// Qualified feature type name
    pub type_name: String,
    pub output_format: String,
    pub cql_filter: Option<String>,
    /// Reference system the server should return geometries in
    pub srs_name: Option<CrsCode>,
    /// Restrict the returned properties; empty means all
    pub property_names: Vec<String>,
    pub max_features: Option<u32>,
}

impl GetFeatureRequest {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            output_format: JSON_OUTPUT_FORMAT.to_string(),
            cql_filter: None,
            srs_name: None,
            property_names: Vec::new(),
            max_features: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.cql_filter = Some(filter.into());
        self
    }

    pub fn with_srs(mut self, srs: CrsCode) -> Self {
        self.srs_name = Some(srs);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>) -> Self {
        self.property_names.push(name.into());
        self
    }

    pub fn with_max_features(mut self, max: u32) -> Self {
        self.max_features = Some(max);
        self
    }

    pub fn to_params(&self) -> QueryParams {
        let mut params = vec![
            ("service".to_string(), "WFS".to_string()),
            ("version".to_string(), WFS_VERSION.to_string()),
            ("request".to_string(), "GetFeature".to_string()),
            ("typeName".to_string(), self.type_name.clone()),
            ("outputFormat".to_string(), self.output_format.clone()),
        ];
        if !self.property_names.is_empty() {
            params.push(("propertyName".to_string(), self.property_names.join(",")));
        }
        if let Some(max) = self.max_features {
            params.push(("maxFeatures".to_string(), max.to_string()));
        }
        if let Some(srs) = &self.srs_name {
            params.push(("srsName".to_string(), srs.to_string()));
        }
        if let Some(filter) = &self.cql_filter {
            params.push(("CQL_FILTER".to_string(), filter.clone()));
        }
        params
    }
}

/// DescribeFeatureType request for one feature type.
#[derive(Debug, Clone, PartialEq)]
pub struct DescribeFeatureTypeRequest {
    pub type_name: String,
    pub output_format: String,
}

impl DescribeFeatureTypeRequest {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            output_format: JSON_OUTPUT_FORMAT.to_string(),
        }
    }

    pub fn to_params(&self) -> QueryParams {
        vec![
            ("service".to_string(), "WFS".to_string()),
            ("version".to_string(), WFS_VERSION.to_string()),
            ("request".to_string(), "DescribeFeatureType".to_string()),
            ("typeName".to_string(), self.type_name.clone()),
            ("outputFormat".to_string(), self.output_format.clone()),
        ]
    }
}

/// JSON answer to DescribeFeatureType.
#[derive(Debug, Clone, Deserialize)]
pub struct DescribeFeatureTypeResponse {
    #[serde(rename = "featureTypes", default)]
    pub feature_types: Vec<FeatureTypeDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureTypeDescription {
    #[serde(rename = "typeName", default)]
    pub type_name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDescription {
    pub name: String,
    /// Type token such as "xsd:string" or "gml:MultiPolygon"
    #[serde(rename = "type", default)]
    pub type_token: String,
    #[serde(rename = "localType", default)]
    pub local_type: Option<String>,
}

impl DescribeFeatureTypeResponse {
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Properties of the first described type.
    pub fn first_properties(&self) -> Option<&[PropertyDescription]> {
        self.feature_types.first().map(|t| t.properties.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find_param;

    #[test]
    fn test_get_feature_params() {
        let params = GetFeatureRequest::new("city:buildings")
            .with_filter("height>50")
            .with_srs(CrsCode::web_mercator())
            .to_params();

        assert_eq!(find_param(&params, "request"), Some("GetFeature"));
        assert_eq!(find_param(&params, "typeName"), Some("city:buildings"));
        assert_eq!(find_param(&params, "outputFormat"), Some("application/json"));
        assert_eq!(find_param(&params, "CQL_FILTER"), Some("height>50"));
        assert_eq!(find_param(&params, "srsName"), Some("EPSG:3857"));
        assert_eq!(find_param(&params, "propertyName"), None);
    }

    #[test]
    fn test_suggestion_style_request() {
        let params = GetFeatureRequest::new("city:streets")
            .with_property("name")
            .with_max_features(100)
            .to_params();
        assert_eq!(find_param(&params, "propertyName"), Some("name"));
        assert_eq!(find_param(&params, "maxFeatures"), Some("100"));
    }

    #[test]
    fn test_parse_describe_feature_type() {
        let body = br#"{
            "elementFormDefault": "qualified",
            "featureTypes": [{
                "typeName": "buildings",
                "properties": [
                    {"name": "the_geom", "type": "gml:MultiPolygon", "localType": "MultiPolygon"},
                    {"name": "height", "type": "xsd:double", "localType": "number"},
                    {"name": "name", "type": "xsd:string", "localType": "string"}
                ]
            }]
        }"#;
        let response = DescribeFeatureTypeResponse::from_json(body).unwrap();
        let properties = response.first_properties().unwrap();
        assert_eq!(properties.len(), 3);
        assert_eq!(properties[1].name, "height");
        assert_eq!(properties[1].type_token, "xsd:double");
    }

    #[test]
    fn test_parse_describe_feature_type_without_types() {
        let response = DescribeFeatureTypeResponse::from_json(b"{}").unwrap();
        assert!(response.first_properties().is_none());
    }
}
