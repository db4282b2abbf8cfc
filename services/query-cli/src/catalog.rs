//! Layer catalog file.
//!
//! Capabilities parsing lives outside this tool; the catalog is the already
//! structured layer list it produces, stored as YAML:
//!
//! ```yaml
//! layers:
//!   - name: "city:parks"
//!     title: "Parks"
//!     crs: ["EPSG:4326", "EPSG:3857"]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use map_common::{LayerDescriptor, LayerId};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub layers: Vec<LayerDescriptor>,
}

impl Catalog {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let catalog: Catalog =
            serde_yaml::from_str(content).with_context(|| "Failed to parse layer catalog YAML")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.layers {
            if !seen.insert(descriptor.name.as_str()) {
                bail!("Layer '{}' appears twice in the catalog", descriptor.name);
            }
        }
        Ok(())
    }
}

/// Load and parse a catalog file.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read layer catalog from {:?}", path.as_ref()))?;
    Catalog::from_yaml(&content)
        .with_context(|| format!("Invalid layer catalog {:?}", path.as_ref()))
}

/// Parse `workspace:name` arguments.
pub fn parse_layer_ids(names: &[String]) -> Result<Vec<LayerId>> {
    names
        .iter()
        .map(|name| {
            LayerId::parse(name)
                .with_context(|| format!("'{}' is not a workspace-qualified layer name", name))
        })
        .collect()
}
