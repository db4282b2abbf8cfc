//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use map_common::{CrsCode, QueryError, QueryResult};
use ogc_protocol::WmsVersion;
use projection::{CrsDefinition, CrsRegistry, Ellipsoid, TransverseMercator};
use tracing::warn;

use crate::view::FitOptions;

/// Top-level engine configuration.
///
/// Every field has a default, so an empty YAML document is a valid
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Working projection of the map
    #[serde(default = "default_map_crs")]
    pub map_crs: CrsCode,

    /// WMS version used for GetFeatureInfo
    #[serde(default)]
    pub wms_version: WmsVersion,

    #[serde(default)]
    pub point: PointQueryConfig,

    #[serde(default, rename = "box")]
    pub box_query: BoxQueryConfig,

    #[serde(default)]
    pub search: SearchConfig,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How the view is fitted to selections
    #[serde(default)]
    pub fit: FitOptions,

    /// Reference systems preferred for a layer, in order, when the layer
    /// advertises them. Otherwise the first advertised system is used.
    #[serde(default = "default_preferred_crs")]
    pub preferred_crs: Vec<CrsCode>,

    /// Additional reference systems registered at startup
    #[serde(default = "default_extra_crs")]
    pub extra_crs: Vec<ExtraCrs>,
}

/// Point (click) query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointQueryConfig {
    /// Features requested per layer
    #[serde(default = "default_point_feature_count")]
    pub feature_count: u32,

    /// Pixel tolerance sent to the server
    #[serde(default = "default_buffer_px")]
    pub buffer_px: u32,

    /// Pixel radius around the click within which the hit is highlighted
    #[serde(default = "default_highlight_tolerance_px")]
    pub highlight_tolerance_px: f64,

    /// Size of the virtual image the click is placed in
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
}

/// Box (drag) query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxQueryConfig {
    /// Features requested per layer and world copy
    #[serde(default = "default_box_feature_count")]
    pub feature_count: u32,

    /// Viewport size used when the view does not report one
    #[serde(default = "default_fallback_viewport")]
    pub fallback_viewport: (u32, u32),
}

/// Attribute search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// CRS requested for search results; defaults to the map CRS
    #[serde(default)]
    pub output_crs: Option<CrsCode>,

    /// Quiet period after the last keystroke before suggestions are fetched
    #[serde(default = "default_suggest_debounce_ms")]
    pub suggest_debounce_ms: u64,

    /// Maximum features requested for suggestions
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: u32,

    /// Keyword/style token marking raster layers
    #[serde(default = "default_raster_token")]
    pub raster_token: String,
}

/// A reference system registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraCrs {
    pub code: CrsCode,
    pub projection: ProjectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionConfig {
    /// UTM zone on the GRS80 ellipsoid
    Utm { zone: u8, south: bool },
    /// Generic transverse Mercator on the GRS80 ellipsoid
    TransverseMercator {
        central_meridian: f64,
        scale_factor: f64,
        false_easting: f64,
        false_northing: f64,
    },
}

fn default_map_crs() -> CrsCode {
    CrsCode::web_mercator()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_preferred_crs() -> Vec<CrsCode> {
    CrsCode::parse("EPSG:10665").into_iter().collect()
}

fn default_extra_crs() -> Vec<ExtraCrs> {
    // SIRGAS 2000 / TM-POA, the municipal system of Porto Alegre
    CrsCode::parse("EPSG:10665")
        .into_iter()
        .map(|code| ExtraCrs {
            code,
            projection: ProjectionConfig::TransverseMercator {
                central_meridian: -51.0,
                scale_factor: 0.999995,
                false_easting: 300_000.0,
                false_northing: 5_000_000.0,
            },
        })
        .collect()
}

fn default_point_feature_count() -> u32 {
    1
}

fn default_buffer_px() -> u32 {
    8
}

fn default_highlight_tolerance_px() -> f64 {
    10.0
}

fn default_tile_size() -> u32 {
    256
}

fn default_box_feature_count() -> u32 {
    50
}

fn default_fallback_viewport() -> (u32, u32) {
    (256, 256)
}

fn default_suggest_debounce_ms() -> u64 {
    300
}

fn default_suggestion_limit() -> u32 {
    100
}

fn default_raster_token() -> String {
    "raster".to_string()
}

impl Default for PointQueryConfig {
    fn default() -> Self {
        Self {
            feature_count: default_point_feature_count(),
            buffer_px: default_buffer_px(),
            highlight_tolerance_px: default_highlight_tolerance_px(),
            tile_size: default_tile_size(),
        }
    }
}

impl Default for BoxQueryConfig {
    fn default() -> Self {
        Self {
            feature_count: default_box_feature_count(),
            fallback_viewport: default_fallback_viewport(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            output_crs: None,
            suggest_debounce_ms: default_suggest_debounce_ms(),
            suggestion_limit: default_suggestion_limit(),
            raster_token: default_raster_token(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            map_crs: default_map_crs(),
            wms_version: WmsVersion::default(),
            point: PointQueryConfig::default(),
            box_query: BoxQueryConfig::default(),
            search: SearchConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            fit: FitOptions::default(),
            preferred_crs: default_preferred_crs(),
            extra_crs: default_extra_crs(),
        }
    }
}

impl ProjectionConfig {
    pub fn to_definition(&self) -> Option<CrsDefinition> {
        match self {
            ProjectionConfig::Utm { zone, south } => {
                CrsDefinition::utm(*zone, *south, Ellipsoid::GRS80).ok()
            }
            ProjectionConfig::TransverseMercator {
                central_meridian,
                scale_factor,
                false_easting,
                false_northing,
            } => Some(CrsDefinition::TransverseMercator(TransverseMercator::new(
                *central_meridian,
                *scale_factor,
                *false_easting,
                *false_northing,
                Ellipsoid::GRS80,
            ))),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::invalid_input("config", format!("{}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> QueryResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| QueryError::invalid_input("config", e.to_string()))
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(value) = env::var("QUERY_MAP_CRS") {
            match CrsCode::parse(&value) {
                Ok(code) => self.map_crs = code,
                Err(e) => warn!(value = %value, error = %e, "Ignoring QUERY_MAP_CRS"),
            }
        }
        if let Ok(value) = env::var("QUERY_REQUEST_TIMEOUT_SECS") {
            match value.parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warn!(value = %value, "Ignoring QUERY_REQUEST_TIMEOUT_SECS"),
            }
        }
        if let Ok(value) = env::var("QUERY_SUGGEST_DEBOUNCE_MS") {
            match value.parse() {
                Ok(ms) => self.search.suggest_debounce_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring QUERY_SUGGEST_DEBOUNCE_MS"),
            }
        }
        if let Ok(value) = env::var("QUERY_PREFERRED_CRS") {
            self.preferred_crs = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| CrsCode::parse(s).ok())
                .collect();
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> QueryResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(QueryError::invalid_input(
                "request_timeout_secs",
                "must be > 0",
            ));
        }
        if self.point.feature_count == 0 {
            return Err(QueryError::invalid_input("point.feature_count", "must be > 0"));
        }
        if self.point.tile_size == 0 {
            return Err(QueryError::invalid_input("point.tile_size", "must be > 0"));
        }
        if self.box_query.feature_count == 0 {
            return Err(QueryError::invalid_input("box.feature_count", "must be > 0"));
        }
        let (width, height) = self.box_query.fallback_viewport;
        if width == 0 || height == 0 {
            return Err(QueryError::invalid_input(
                "box.fallback_viewport",
                "must be non-empty",
            ));
        }
        if self.search.suggestion_limit == 0 {
            return Err(QueryError::invalid_input(
                "search.suggestion_limit",
                "must be > 0",
            ));
        }
        for extra in &self.extra_crs {
            if extra.projection.to_definition().is_none() {
                return Err(QueryError::invalid_input(
                    "extra_crs",
                    format!("invalid projection for {}", extra.code),
                ));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn suggest_debounce(&self) -> Duration {
        Duration::from_millis(self.search.suggest_debounce_ms)
    }

    /// CRS requested for attribute search results.
    pub fn search_output_crs(&self) -> &CrsCode {
        self.search.output_crs.as_ref().unwrap_or(&self.map_crs)
    }

    /// Registry with the map CRS as working projection and every extra
    /// system registered.
    pub fn build_crs_registry(&self) -> CrsRegistry {
        let mut registry = CrsRegistry::new(self.map_crs.clone());
        for extra in &self.extra_crs {
            match extra.projection.to_definition() {
                Some(definition) => registry.register(extra.code.clone(), definition),
                None => warn!(crs = %extra.code, "Skipping invalid CRS definition"),
            }
        }
        registry
    }
}
