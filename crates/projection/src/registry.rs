//! CRS registry and extent transformation.
//!
//! The registry maps CRS codes to projection definitions. Well-known codes
//! (geographic, Web Mercator, WGS84 and SIRGAS 2000 UTM zones) resolve
//! without registration; project-specific codes are registered at startup.

use std::collections::HashMap;

use map_common::{CrsCode, Extent};
use tracing::{debug, warn};

use crate::mercator::WebMercator;
use crate::transverse_mercator::{Ellipsoid, TransverseMercator};

/// Number of segments each extent edge is split into before transforming.
const EXTENT_EDGE_STEPS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Invalid UTM zone {0}")]
    InvalidZone(u8),

    #[error("Coordinate ({x}, {y}) cannot be transformed from {from} to {to}")]
    OutOfDomain {
        x: f64,
        y: f64,
        from: String,
        to: String,
    },
}

impl From<ProjectionError> for map_common::QueryError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::UnknownCrs(code) => map_common::QueryError::UnknownCrs(code),
            other => map_common::QueryError::invalid_input("coordinate", other.to_string()),
        }
    }
}

/// How coordinates of a CRS relate to geographic lon/lat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrsDefinition {
    /// Longitude/latitude in degrees
    Geographic,
    WebMercator,
    TransverseMercator(TransverseMercator),
}

impl CrsDefinition {
    /// UTM zone definition.
    pub fn utm(zone: u8, south: bool, ellipsoid: Ellipsoid) -> Result<Self, ProjectionError> {
        TransverseMercator::utm(zone, south, ellipsoid)
            .map(CrsDefinition::TransverseMercator)
            .ok_or(ProjectionError::InvalidZone(zone))
    }

    /// Definition for codes that need no registration.
    pub fn well_known(code: &CrsCode) -> Option<Self> {
        let epsg = code.epsg()?;
        match epsg {
            4326 | 4269 | 4674 => Some(CrsDefinition::Geographic),
            3857 => Some(CrsDefinition::WebMercator),
            // WGS 84 / UTM zone nN and nS
            32601..=32660 => Self::utm((epsg - 32600) as u8, false, Ellipsoid::WGS84).ok(),
            32701..=32760 => Self::utm((epsg - 32700) as u8, true, Ellipsoid::WGS84).ok(),
            // SIRGAS 2000 / UTM zones 11N-22N and 17S-25S
            31965..=31976 => Self::utm((epsg - 31954) as u8, false, Ellipsoid::GRS80).ok(),
            31977..=31985 => Self::utm((epsg - 31960) as u8, true, Ellipsoid::GRS80).ok(),
            _ => None,
        }
    }

    /// Projected coordinates to geographic (lon, lat).
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            CrsDefinition::Geographic => (x, y),
            CrsDefinition::WebMercator => WebMercator.inverse(x, y),
            CrsDefinition::TransverseMercator(tm) => tm.inverse(x, y),
        }
    }

    /// Geographic (lon, lat) to projected coordinates.
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            CrsDefinition::Geographic => (lon, lat),
            CrsDefinition::WebMercator => WebMercator.forward(lon, lat),
            CrsDefinition::TransverseMercator(tm) => tm.forward(lon, lat),
        }
    }

    /// Total extent of the projected world.
    ///
    /// For transverse Mercator this is the zone (±3° around the central
    /// meridian) rather than the whole globe, which the projection cannot
    /// represent.
    pub fn projection_extent(&self) -> Extent {
        match self {
            CrsDefinition::Geographic => Extent::new(-180.0, -90.0, 180.0, 90.0),
            CrsDefinition::WebMercator => WebMercator.extent(),
            CrsDefinition::TransverseMercator(tm) => {
                let lon0 = tm.central_meridian_deg();
                let mut points = Vec::with_capacity(81);
                for i in 0..=8 {
                    for j in 0..=8 {
                        let lon = lon0 - 3.0 + 6.0 * i as f64 / 8.0;
                        let lat = -80.0 + 164.0 * j as f64 / 8.0;
                        points.push(tm.forward(lon, lat));
                    }
                }
                Extent::from_points(points).unwrap_or_else(|| Extent::new(0.0, 0.0, 0.0, 0.0))
            }
        }
    }

    /// Whether the projected world repeats horizontally.
    pub fn wraps_x(&self) -> bool {
        matches!(self, CrsDefinition::Geographic | CrsDefinition::WebMercator)
    }
}

/// Width of one world copy for a projection's total extent.
pub fn world_width(projection_extent: &Extent) -> f64 {
    projection_extent.width()
}

/// Registry of known reference systems.
#[derive(Debug, Clone)]
pub struct CrsRegistry {
    /// Map working projection; the fallback for unknown codes
    working: CrsCode,
    registered: HashMap<CrsCode, CrsDefinition>,
}

impl CrsRegistry {
    /// Create a registry whose working projection is `working`.
    ///
    /// An unknown working code falls back to Web Mercator.
    pub fn new(working: CrsCode) -> Self {
        let working = if CrsDefinition::well_known(&working).is_some() {
            working
        } else {
            warn!(crs = %working, "Unknown working projection, using EPSG:3857");
            CrsCode::web_mercator()
        };
        Self {
            working,
            registered: HashMap::new(),
        }
    }

    /// Register (or replace) a definition for a code.
    pub fn register(&mut self, code: CrsCode, definition: CrsDefinition) {
        debug!(crs = %code, ?definition, "Registering CRS");
        self.registered.insert(code, definition);
    }

    /// Register a code as a UTM zone.
    pub fn register_utm(
        &mut self,
        code: CrsCode,
        zone: u8,
        south: bool,
    ) -> Result<(), ProjectionError> {
        let definition = CrsDefinition::utm(zone, south, Ellipsoid::GRS80)?;
        self.register(code, definition);
        Ok(())
    }

    pub fn working_crs(&self) -> &CrsCode {
        &self.working
    }

    pub fn is_known(&self, code: &CrsCode) -> bool {
        self.get(code).is_some()
    }

    pub fn get(&self, code: &CrsCode) -> Option<CrsDefinition> {
        self.registered
            .get(code)
            .copied()
            .or_else(|| CrsDefinition::well_known(code))
    }

    pub fn resolve(&self, code: &CrsCode) -> Result<CrsDefinition, ProjectionError> {
        self.get(code)
            .ok_or_else(|| ProjectionError::UnknownCrs(code.to_string()))
    }

    /// Resolve a code, falling back to the working projection when unknown.
    ///
    /// Returns the code actually used together with its definition.
    pub fn resolve_or_working(&self, code: &CrsCode) -> (CrsCode, CrsDefinition) {
        match self.get(code) {
            Some(definition) => (code.clone(), definition),
            None => {
                warn!(
                    crs = %code,
                    fallback = %self.working,
                    "Unknown CRS, falling back to working projection"
                );
                (self.working.clone(), self.working_definition())
            }
        }
    }

    fn working_definition(&self) -> CrsDefinition {
        self.get(&self.working).unwrap_or(CrsDefinition::WebMercator)
    }

    /// Total extent of a CRS's projected world.
    pub fn projection_extent(&self, code: &CrsCode) -> Result<Extent, ProjectionError> {
        Ok(self.resolve(code)?.projection_extent())
    }

    /// Geographic lon/lat to the working projection.
    pub fn to_map_crs(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.working_definition().from_geographic(lon, lat)
    }

    /// Transform one coordinate between two reference systems.
    pub fn transform_point(
        &self,
        x: f64,
        y: f64,
        from: &CrsCode,
        to: &CrsCode,
    ) -> Result<(f64, f64), ProjectionError> {
        if from == to {
            return Ok((x, y));
        }
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        let (lon, lat) = source.to_geographic(x, y);
        let (tx, ty) = target.from_geographic(lon, lat);
        if !tx.is_finite() || !ty.is_finite() {
            return Err(ProjectionError::OutOfDomain {
                x,
                y,
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok((tx, ty))
    }

    /// Transform an extent, sampling along its edges so curved edges in the
    /// target system are covered.
    pub fn transform_extent(
        &self,
        extent: &Extent,
        from: &CrsCode,
        to: &CrsCode,
    ) -> Result<Extent, ProjectionError> {
        if from == to {
            return Ok(*extent);
        }

        let mut points = Vec::with_capacity(4 * EXTENT_EDGE_STEPS);
        for step in 0..EXTENT_EDGE_STEPS {
            let t = step as f64 / EXTENT_EDGE_STEPS as f64;
            let x = extent.min_x + t * extent.width();
            let y = extent.min_y + t * extent.height();
            points.push((x, extent.min_y));
            points.push((extent.max_x, y));
            points.push((extent.max_x - t * extent.width(), extent.max_y));
            points.push((extent.min_x, extent.max_y - t * extent.height()));
        }

        let transformed = points
            .into_iter()
            .map(|(x, y)| self.transform_point(x, y, from, to))
            .collect::<Result<Vec<_>, _>>()?;

        Extent::from_points(transformed).ok_or(ProjectionError::OutOfDomain {
            x: extent.min_x,
            y: extent.min_y,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

impl Default for CrsRegistry {
    fn default() -> Self {
        Self::new(CrsCode::web_mercator())
    }
}
