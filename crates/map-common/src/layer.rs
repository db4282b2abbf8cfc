//! Layer definitions for queryable map layers.

use serde::{Deserialize, Serialize};

use crate::{CrsCode, Extent};

/// Identity of a layer on the server: `workspace:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId {
    pub workspace: String,
    pub name: String,
}

impl LayerId {
    pub fn new(workspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            name: name.into(),
        }
    }

    /// Parse a qualified layer name like "parks:green_areas".
    ///
    /// Names without a workspace prefix are not queryable and yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once(':') {
            Some((workspace, name)) if !workspace.is_empty() && !name.is_empty() => {
                Some(Self::new(workspace, name))
            }
            _ => None,
        }
    }

    /// Qualified name as used in `LAYERS` and `typeName` parameters.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.workspace, self.name)
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.workspace, self.name)
    }
}

/// Layer description as produced by the capabilities collaborator.
///
/// This is the already-structured input the registry is built from; parsing
/// the capabilities document itself happens elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Qualified name, e.g. "parks:green_areas"
    pub name: String,

    /// Human-readable title
    #[serde(default)]
    pub title: Option<String>,

    /// Advertised reference systems, in document order
    #[serde(default)]
    pub crs: Vec<String>,

    /// Keywords from the capabilities document
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Advertised style names
    #[serde(default)]
    pub styles: Vec<String>,

    /// Geographic bounding box (EPSG:4326), if advertised
    #[serde(default)]
    pub geographic_bbox: Option<Extent>,
}

/// A queryable layer of the current session.
#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    pub id: LayerId,

    /// Display title; falls back to the layer name
    pub title: String,

    /// Reference system used when talking to the server about this layer
    pub reference_system: CrsCode,

    pub keywords: Vec<String>,

    pub styles: Vec<String>,

    pub geographic_bbox: Option<Extent>,

    /// Toggled by the user; the only mutable field
    pub visible: bool,
}

impl Layer {
    /// Title for display, e.g. in detail panels and search summaries.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id.name
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layer_id() {
        let id = LayerId::parse("parks:green_areas").unwrap();
        assert_eq!(id.workspace, "parks");
        assert_eq!(id.name, "green_areas");
        assert_eq!(id.qualified(), "parks:green_areas");
    }

    #[test]
    fn test_parse_layer_id_without_workspace() {
        assert!(LayerId::parse("green_areas").is_none());
        assert!(LayerId::parse(":green_areas").is_none());
        assert!(LayerId::parse("parks:").is_none());
    }

    #[test]
    fn test_descriptor_defaults() {
        let descriptor: LayerDescriptor =
            serde_json::from_str(r#"{"name": "city:roads"}"#).unwrap();
        assert!(descriptor.crs.is_empty());
        assert!(descriptor.title.is_none());
    }
}
