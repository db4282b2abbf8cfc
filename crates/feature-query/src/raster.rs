//! Raster layer detection.
//!
//! Attribute search only works on vector layers. Capabilities documents do
//! not say which layers are rasters, so this is a heuristic over keyword and
//! style names. Callers only see [`RasterClassification`], so the policy can
//! be replaced by an authoritative check later.

use serde::Serialize;

use map_common::Layer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RasterClassification {
    pub is_raster: bool,
    /// The keyword or style name that matched
    pub evidence: Option<String>,
}

impl RasterClassification {
    fn vector() -> Self {
        Self {
            is_raster: false,
            evidence: None,
        }
    }
}

/// Classify a layer by case-insensitive substring match of `token` against
/// its keywords, then its style names.
pub fn classify_layer(layer: &Layer, token: &str) -> RasterClassification {
    let token = token.to_lowercase();
    if token.is_empty() {
        return RasterClassification::vector();
    }

    layer
        .keywords
        .iter()
        .chain(layer.styles.iter())
        .find(|candidate| candidate.to_lowercase().contains(&token))
        .map(|matched| RasterClassification {
            is_raster: true,
            evidence: Some(matched.clone()),
        })
        .unwrap_or_else(RasterClassification::vector)
}
