//! Map view state and view-fit instructions.

use serde::{Deserialize, Serialize};

use map_common::{CrsCode, Extent, Feature};

/// What the map view currently looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Map units per pixel; `None` until the view is ready
    pub resolution: Option<f64>,
    /// Reference system of map coordinates
    pub crs: CrsCode,
    /// Viewport size in pixels
    pub viewport: Option<(u32, u32)>,
}

impl ViewState {
    pub fn new(crs: CrsCode, resolution: f64, viewport: (u32, u32)) -> Self {
        Self {
            resolution: Some(resolution),
            crs,
            viewport: Some(viewport),
        }
    }
}

/// How the view is fitted to a selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    #[serde(default = "default_padding_px")]
    pub padding_px: u32,
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Zoom level the fit never exceeds
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

fn default_padding_px() -> u32 {
    50
}

fn default_duration_ms() -> u64 {
    1000
}

fn default_max_zoom() -> u8 {
    19
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding_px: default_padding_px(),
            duration_ms: default_duration_ms(),
            max_zoom: default_max_zoom(),
        }
    }
}

/// Resolution of zoom level 0 on a 256 px Web Mercator tile grid.
const ZOOM_0_RESOLUTION: f64 = 156_543.033_928_040_97;

/// Instruction for the presentation layer to fit the view to an extent.
///
/// Returned alongside selections; the caller decides whether to apply it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewFit {
    pub extent: Extent,
    pub crs: CrsCode,
    pub padding_px: u32,
    pub duration_ms: u64,
    pub max_zoom: u8,
}

impl ViewFit {
    /// Fit to one feature; `None` for a feature without geometry.
    pub fn for_feature(feature: &Feature, options: &FitOptions) -> Option<Self> {
        let geometry = feature.geometry.as_ref()?;
        Some(Self::new(geometry.extent()?, geometry.crs.clone(), options))
    }

    /// Fit to the union of the features' extents.
    pub fn for_features(features: &[Feature], options: &FitOptions) -> Option<Self> {
        let mut extent: Option<Extent> = None;
        let mut crs = None;
        for feature in features {
            let Some(geometry) = feature.geometry.as_ref() else {
                continue;
            };
            let Some(feature_extent) = geometry.extent() else {
                continue;
            };
            extent = Some(match extent {
                Some(e) => e.union(&feature_extent),
                None => feature_extent,
            });
            crs.get_or_insert_with(|| geometry.crs.clone());
        }
        Some(Self::new(extent?, crs?, options))
    }

    fn new(extent: Extent, crs: CrsCode, options: &FitOptions) -> Self {
        Self {
            extent,
            crs,
            padding_px: options.padding_px,
            duration_ms: options.duration_ms,
            max_zoom: options.max_zoom,
        }
    }

    /// Resolution the view ends up at for a viewport, respecting padding and
    /// the zoom cap. The cap assumes the standard Web Mercator tile grid.
    pub fn target_resolution(&self, viewport: (u32, u32)) -> f64 {
        let padding = 2.0 * self.padding_px as f64;
        let width = (viewport.0 as f64 - padding).max(1.0);
        let height = (viewport.1 as f64 - padding).max(1.0);
        let fitted = (self.extent.width() / width).max(self.extent.height() / height);
        let min_resolution = ZOOM_0_RESOLUTION / 2f64.powi(self.max_zoom as i32);
        fitted.max(min_resolution)
    }
}
