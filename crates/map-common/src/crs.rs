//! Coordinate Reference System codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized CRS identifier such as `EPSG:3857`.
///
/// Codes are kept as strings because the set of supported systems is open:
/// extra systems are registered at startup by the projection registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CrsCode(String);

impl CrsCode {
    /// WGS84 geographic (lon/lat in degrees).
    pub const WGS84: &'static str = "EPSG:4326";
    /// Web Mercator (meters), the map's usual working projection.
    pub const WEB_MERCATOR: &'static str = "EPSG:3857";

    pub fn wgs84() -> Self {
        Self(Self::WGS84.to_string())
    }

    pub fn web_mercator() -> Self {
        Self(Self::WEB_MERCATOR.to_string())
    }

    /// Parse a CRS string as found in capabilities documents and requests.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326" / "epsg:4326"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    /// - "EPSG:900913" (legacy alias of EPSG:3857)
    /// - "urn:ogc:def:crs:EPSG::3857" and "urn:ogc:def:crs:EPSG:6.6:3857"
    /// - "http://www.opengis.net/gml/srs/epsg.xml#3857"
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        let number = if let Some(rest) = normalized.strip_prefix("EPSG:") {
            rest.to_string()
        } else if let Some(rest) = normalized.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            // Optional version segment between the two colons.
            rest.rsplit(':').next().unwrap_or_default().to_string()
        } else if let Some((_, rest)) = normalized.split_once("EPSG.XML#") {
            rest.to_string()
        } else if normalized == "CRS:84" || normalized == "URN:OGC:DEF:CRS:OGC:1.3:CRS84" {
            "4326".to_string()
        } else {
            return Err(CrsParseError::UnsupportedCrs(s.to_string()));
        };

        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(CrsParseError::UnsupportedCrs(s.to_string()));
        }

        let number = match number.as_str() {
            "900913" | "3785" | "102100" => "3857".to_string(),
            _ => number,
        };

        Ok(Self(format!("EPSG:{}", number)))
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> Option<u32> {
        self.0.strip_prefix("EPSG:").and_then(|n| n.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the axis order for this CRS in WMS 1.3.0.
    ///
    /// WMS 1.3.0 uses the "natural" axis order of the CRS:
    /// - Geographic CRS: lat, lon (y, x)
    /// - Projected CRS: easting, northing (x, y)
    pub fn axis_order_wms_1_3(&self) -> AxisOrder {
        if self.is_geographic() {
            AxisOrder::LatLon
        } else {
            AxisOrder::XY
        }
    }

    /// Get the axis order for WMS 1.1.1 (always x, y regardless of CRS).
    pub fn axis_order_wms_1_1(&self) -> AxisOrder {
        AxisOrder::XY
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg(), Some(4326) | Some(4269) | Some(4674))
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Axis order for coordinate interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// X (longitude/easting), Y (latitude/northing)
    XY,
    /// Y (latitude/northing), X (longitude/easting)
    LatLon,
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
