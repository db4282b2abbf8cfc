//! Spherical Web Mercator projection (EPSG:3857).

use std::f64::consts::PI;

use map_common::Extent;

/// Sphere radius used by Web Mercator (WGS84 semi-major axis).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Half the width of the projected world in meters.
pub const HALF_WORLD: f64 = 20037508.342789244;

/// Latitude limit where the projected world becomes square.
pub const MAX_LATITUDE: f64 = 85.0511287798066;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WebMercator;

impl WebMercator {
    /// Full projected extent.
    pub fn extent(&self) -> Extent {
        Extent::new(-HALF_WORLD, -HALF_WORLD, HALF_WORLD, HALF_WORLD)
    }

    /// Geographic (lon, lat in degrees) to projected meters.
    ///
    /// Latitude is clamped to the projection's limit so poles stay finite.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let x = EARTH_RADIUS * lon.to_radians();
        let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    /// Projected meters to geographic (lon, lat in degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}
