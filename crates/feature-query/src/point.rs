//! Point (click) queries.
//!
//! Layers are asked one after another in priority order and the first layer
//! that returns a feature wins. Layers are never raced: a later layer must
//! not win because it answered faster.

use tracing::{debug, instrument, warn};

use map_common::{Extent, Feature, Layer, QueryError, QueryResult};
use ogc_protocol::GetFeatureInfoRequest;
use projection::CrsRegistry;

use crate::client::{QueryKind, ServiceClient};
use crate::config::EngineConfig;
use crate::decoder::decode_feature_collection;
use crate::metrics;
use crate::view::ViewState;
use crate::LayerFailure;

/// The feature found at a click.
#[derive(Debug, Clone)]
pub struct PointHit {
    pub feature: Feature,
    /// Copy of the feature to highlight, when the click was close enough to
    /// its geometry
    pub highlight: Option<Feature>,
}

#[derive(Debug, Default)]
pub struct PointResult {
    pub hit: Option<PointHit>,
    /// Layers that failed and were skipped
    pub failures: Vec<LayerFailure>,
}

/// Find the first feature at `coordinate` across `layers`.
///
/// With no layers the result is empty and no request is made. A view
/// without a resolution aborts the query.
#[instrument(skip(client, crs_registry, config, view, layers), fields(layers = layers.len()))]
pub async fn resolve_point(
    client: &ServiceClient,
    crs_registry: &CrsRegistry,
    config: &EngineConfig,
    coordinate: (f64, f64),
    view: &ViewState,
    layers: &[Layer],
) -> QueryResult<PointResult> {
    if layers.is_empty() {
        debug!("No visible layers, nothing to query");
        return Ok(PointResult::default());
    }
    let resolution = view.resolution.ok_or(QueryError::MissingResolution)?;
    let (crs, _) = crs_registry.resolve_or_working(&view.crs);

    let mut result = PointResult::default();
    for layer in layers {
        let request = GetFeatureInfoRequest::point(
            config.wms_version,
            layer.id.qualified(),
            crs.clone(),
            coordinate,
            resolution,
            config.point.tile_size,
            config.point.feature_count,
            config.point.buffer_px,
        );

        let features = match client.get_feature_info(QueryKind::Point, &request).await {
            Ok(response) => {
                decode_feature_collection(&response.body, &layer.id, &crs, &crs, crs_registry)
            }
            Err(e) => Err(e),
        };

        match features {
            Ok(features) => {
                if let Some(feature) = features.into_iter().next() {
                    debug!(layer = %layer.id, id = ?feature.id, "Point query hit");
                    let tolerance = resolution * config.point.highlight_tolerance_px;
                    let highlight = highlight_for(&feature, coordinate, tolerance);
                    result.hit = Some(PointHit { feature, highlight });
                    break;
                }
            }
            Err(e) if e.is_layer_local() => {
                warn!(layer = %layer.id, error = %e, "Layer failed during point query, skipping");
                metrics::record_layer_failure(QueryKind::Point.as_str());
                result.failures.push(LayerFailure {
                    layer: layer.id.clone(),
                    error: e,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}

/// Highlight copy of `feature` if its extent touches the tolerance box
/// around the click.
pub fn highlight_for(feature: &Feature, click: (f64, f64), tolerance: f64) -> Option<Feature> {
    let click_box = Extent::from_point(click.0, click.1).buffer(tolerance);
    feature
        .extent()
        .filter(|extent| extent.intersects(&click_box))
        .map(|_| feature.clone())
}
