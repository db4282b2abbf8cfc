//! WMS GetFeatureInfo request construction.
//!
//! Two request shapes are built here: a point query around a clicked
//! coordinate, and an area query with an explicit bounding box and the
//! viewport's pixel size.

use serde::{Deserialize, Serialize};

use map_common::{AxisOrder, CrsCode, Extent};

use crate::QueryParams;

/// Supported GetFeatureInfo response formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum InfoFormat {
    /// application/json - GeoJSON feature collection
    #[serde(rename = "application/json")]
    #[default]
    Json,
    /// text/html - Human-readable HTML for popups
    #[serde(rename = "text/html")]
    Html,
    /// text/xml - GML
    #[serde(rename = "text/xml")]
    Xml,
    /// text/plain - Simple text format
    #[serde(rename = "text/plain")]
    Text,
}

impl InfoFormat {
    /// Parse from MIME type string
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_lowercase().as_str() {
            "application/json" => Some(InfoFormat::Json),
            "text/html" => Some(InfoFormat::Html),
            "text/xml" => Some(InfoFormat::Xml),
            "text/plain" => Some(InfoFormat::Text),
            _ => None,
        }
    }

    /// Get MIME type string
    pub fn to_mime(&self) -> &'static str {
        match self {
            InfoFormat::Json => "application/json",
            InfoFormat::Html => "text/html",
            InfoFormat::Xml => "text/xml",
            InfoFormat::Text => "text/plain",
        }
    }
}

/// WMS protocol version.
///
/// The versions differ in parameter naming (`SRS`/`X`/`Y` against
/// `CRS`/`I`/`J`) and in the axis order of `BBOX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum WmsVersion {
    #[serde(rename = "1.1.1")]
    #[default]
    V1_1_1,
    #[serde(rename = "1.3.0")]
    V1_3_0,
}

impl WmsVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            WmsVersion::V1_1_1 => "1.1.1",
            WmsVersion::V1_3_0 => "1.3.0",
        }
    }

    pub fn crs_param(&self) -> &'static str {
        match self {
            WmsVersion::V1_1_1 => "SRS",
            WmsVersion::V1_3_0 => "CRS",
        }
    }

    /// Names of the pixel column/row parameters.
    pub fn pixel_params(&self) -> (&'static str, &'static str) {
        match self {
            WmsVersion::V1_1_1 => ("X", "Y"),
            WmsVersion::V1_3_0 => ("I", "J"),
        }
    }

    pub fn axis_order(&self, crs: &CrsCode) -> AxisOrder {
        match self {
            WmsVersion::V1_1_1 => crs.axis_order_wms_1_1(),
            WmsVersion::V1_3_0 => crs.axis_order_wms_1_3(),
        }
    }
}

/// GetFeatureInfo request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GetFeatureInfoRequest {
    pub version: WmsVersion,
    /// Qualified layer names, used for both LAYERS and QUERY_LAYERS
    pub layers: Vec<String>,
    /// Coordinate reference system of `bbox`
    pub crs: CrsCode,
    /// Bounding box in x/y order
    pub bbox: Extent,
    /// Map width in pixels
    pub width: u32,
    /// Map height in pixels
    pub height: u32,
    /// Pixel column (0-based from left)
    pub i: u32,
    /// Pixel row (0-based from top)
    pub j: u32,
    pub info_format: InfoFormat,
    /// Maximum number of features to return
    pub feature_count: u32,
    /// Pixel tolerance around the query position
    pub buffer: Option<u32>,
}

impl GetFeatureInfoRequest {
    /// Query around a single map coordinate.
    ///
    /// The request describes a virtual `tile_size` square image centred on
    /// the coordinate at the given resolution, with the query pixel in the
    /// middle of it.
    #[allow(clippy::too_many_arguments)]
    pub fn point(
        version: WmsVersion,
        layer: impl Into<String>,
        crs: CrsCode,
        coordinate: (f64, f64),
        resolution: f64,
        tile_size: u32,
        feature_count: u32,
        buffer: u32,
    ) -> Self {
        let half = tile_size as f64 / 2.0 * resolution;
        let (x, y) = coordinate;
        Self {
            version,
            layers: vec![layer.into()],
            crs,
            bbox: Extent::new(x - half, y - half, x + half, y + half),
            width: tile_size,
            height: tile_size,
            i: tile_size / 2,
            j: tile_size / 2,
            info_format: InfoFormat::Json,
            feature_count,
            buffer: Some(buffer),
        }
    }

    /// Query a whole area.
    ///
    /// `viewport` is the map's pixel size; some servers need it to map the
    /// box onto pixels. The query position is the centre of the box and no
    /// pixel buffer is sent.
    pub fn area(
        version: WmsVersion,
        layer: impl Into<String>,
        crs: CrsCode,
        extent: Extent,
        viewport: (u32, u32),
        feature_count: u32,
    ) -> Self {
        let (width, height) = viewport;
        Self {
            version,
            layers: vec![layer.into()],
            crs,
            bbox: extent,
            width,
            height,
            i: width / 2,
            j: height / 2,
            info_format: InfoFormat::Json,
            feature_count,
            buffer: Some(0),
        }
    }

    /// BBOX value with the axis order required by the version and CRS.
    pub fn bbox_param(&self) -> String {
        match self.version.axis_order(&self.crs) {
            AxisOrder::XY => self.bbox.to_wms_string(),
            AxisOrder::LatLon => format!(
                "{},{},{},{}",
                self.bbox.min_y, self.bbox.min_x, self.bbox.max_y, self.bbox.max_x
            ),
        }
    }

    /// Key-value parameters for the request URL.
    pub fn to_params(&self) -> QueryParams {
        let layers = self.layers.join(",");
        let (i_param, j_param) = self.version.pixel_params();
        let mut params = vec![
            ("SERVICE".to_string(), "WMS".to_string()),
            ("VERSION".to_string(), self.version.as_str().to_string()),
            ("REQUEST".to_string(), "GetFeatureInfo".to_string()),
            ("FORMAT".to_string(), "image/png".to_string()),
            ("TRANSPARENT".to_string(), "true".to_string()),
            ("LAYERS".to_string(), layers.clone()),
            ("QUERY_LAYERS".to_string(), layers),
            ("STYLES".to_string(), String::new()),
            ("INFO_FORMAT".to_string(), self.info_format.to_mime().to_string()),
            ("FEATURE_COUNT".to_string(), self.feature_count.to_string()),
        ];
        if let Some(buffer) = self.buffer {
            params.push(("BUFFER".to_string(), buffer.to_string()));
        }
        params.extend([
            (self.version.crs_param().to_string(), self.crs.to_string()),
            ("BBOX".to_string(), self.bbox_param()),
            ("WIDTH".to_string(), self.width.to_string()),
            ("HEIGHT".to_string(), self.height.to_string()),
            (i_param.to_string(), self.i.to_string()),
            (j_param.to_string(), self.j.to_string()),
        ]);
        params
    }

    /// Map coordinate of the query pixel's centre.
    pub fn query_position(&self) -> (f64, f64) {
        pixel_to_map(self.i, self.j, self.width, self.height, &self.bbox)
    }
}

/// Convert pixel coordinates to map coordinates
///
/// # Arguments
/// - `i`: Pixel column (0-based from left)
/// - `j`: Pixel row (0-based from top)
/// - `width`: Map width in pixels
/// - `height`: Map height in pixels
/// - `bbox`: Bounding box of the image
pub fn pixel_to_map(i: u32, j: u32, width: u32, height: u32, bbox: &Extent) -> (f64, f64) {
    // Calculate pixel center position (0.5 offset for pixel center)
    let x_ratio = (i as f64 + 0.5) / width as f64;
    let y_ratio = (j as f64 + 0.5) / height as f64;

    let x = bbox.min_x + x_ratio * bbox.width();
    let y = bbox.max_y - y_ratio * bbox.height(); // Y is inverted (top=max, bottom=min)

    (x, y)
}
