//! Box (drag) queries with world-wrap handling.
//!
//! A box drawn across the projection seam covers several copies of the
//! world. Each copy is translated back into the canonical world, clamped to
//! the projection extent and queried on its own.

use tracing::{debug, instrument, warn};

use map_common::{Extent, Feature, Layer, QueryResult};
use ogc_protocol::GetFeatureInfoRequest;
use projection::{world_width, CrsRegistry};

use crate::client::{QueryKind, ServiceClient};
use crate::config::EngineConfig;
use crate::decoder::decode_feature_collection;
use crate::metrics;
use crate::view::ViewState;
use crate::LayerFailure;

/// Part of a box that falls into one world copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldCopy {
    /// Index of the copy; 0 is the canonical world
    pub world: i64,
    /// The box translated into the canonical world and clamped
    pub extent: Extent,
}

/// Split a box into per-world sub-extents.
///
/// Covers every world index from `floor((min_x - proj_min_x) / W)` to
/// `floor((max_x - proj_min_x) / W)` inclusive.
pub fn world_copies(extent: &Extent, projection_extent: &Extent) -> Vec<WorldCopy> {
    let extent = extent.normalized();
    let width = world_width(projection_extent);
    if !(width > 0.0) || !extent.is_valid() {
        return Vec::new();
    }

    let start_world = ((extent.min_x - projection_extent.min_x) / width).floor() as i64;
    let end_world = ((extent.max_x - projection_extent.min_x) / width).floor() as i64;

    (start_world..=end_world)
        .map(|world| WorldCopy {
            world,
            extent: extent
                .translate_x(-(world as f64) * width)
                .clamp_to(projection_extent),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct BoxResult {
    /// Features of all copies and layers, in query order
    pub features: Vec<Feature>,
    pub copies: Vec<WorldCopy>,
    pub failures: Vec<LayerFailure>,
}

/// Query every visible layer for every world copy of `extent`.
#[instrument(skip(client, crs_registry, config, view, layers), fields(layers = layers.len()))]
pub async fn resolve_box(
    client: &ServiceClient,
    crs_registry: &CrsRegistry,
    config: &EngineConfig,
    extent: &Extent,
    view: &ViewState,
    layers: &[Layer],
) -> QueryResult<BoxResult> {
    let (crs, definition) = crs_registry.resolve_or_working(&view.crs);
    let copies = if definition.wraps_x() {
        world_copies(extent, &definition.projection_extent())
    } else {
        vec![WorldCopy {
            world: 0,
            extent: extent.normalized(),
        }]
    };
    let viewport = view.viewport.unwrap_or(config.box_query.fallback_viewport);
    debug!(copies = copies.len(), ?viewport, "Box split into world copies");

    let mut result = BoxResult {
        copies: copies.clone(),
        ..Default::default()
    };
    if layers.is_empty() {
        return Ok(result);
    }

    for copy in &copies {
        for layer in layers {
            let request = GetFeatureInfoRequest::area(
                config.wms_version,
                layer.id.qualified(),
                crs.clone(),
                copy.extent,
                viewport,
                config.box_query.feature_count,
            );

            let decoded = match client.get_feature_info(QueryKind::Box, &request).await {
                Ok(response) => {
                    decode_feature_collection(&response.body, &layer.id, &crs, &crs, crs_registry)
                }
                Err(e) => Err(e),
            };

            match decoded {
                Ok(features) => {
                    let returned = features.len();
                    result.features.extend(
                        features
                            .into_iter()
                            .filter(|f| f.extent().map_or(false, |e| e.intersects(&copy.extent))),
                    );
                    debug!(
                        layer = %layer.id,
                        world = copy.world,
                        returned,
                        total = result.features.len(),
                        "Box query answered"
                    );
                }
                Err(e) if e.is_layer_local() => {
                    warn!(layer = %layer.id, world = copy.world, error = %e, "Layer failed during box query, skipping");
                    metrics::record_layer_failure(QueryKind::Box.as_str());
                    result.failures.push(LayerFailure {
                        layer: layer.id.clone(),
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(result)
}
