//! Transverse Mercator projection on an ellipsoid.
//!
//! Used for the UTM family of reference systems (EPSG:326xx, EPSG:327xx and
//! the SIRGAS 2000 UTM zones) that municipal servers commonly publish data in.
//!
//! The series expansions follow Snyder, "Map Projections: A Working Manual"
//! (USGS 1395), equations 8-9 to 8-25. They are accurate to well under a
//! millimeter within a zone and degrade gracefully a few degrees outside it.

use std::f64::consts::PI;

/// Reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (meters)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6378137.0,
        f: 1.0 / 298.257223563,
    };

    /// GRS80, used by SIRGAS 2000. Differs from WGS84 by about 0.1 mm.
    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6378137.0,
        f: 1.0 / 298.257222101,
    };

    /// First eccentricity squared.
    pub fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }
}

/// Transverse Mercator projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    /// Central meridian in radians
    pub lon0: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    /// False easting (meters)
    pub false_easting: f64,
    /// False northing (meters)
    pub false_northing: f64,
    pub ellipsoid: Ellipsoid,
    /// Second eccentricity squared
    ep2: f64,
}

impl TransverseMercator {
    /// Create a projection from its defining parameters.
    ///
    /// # Arguments
    /// * `lon0_deg` - Central meridian (degrees)
    /// * `k0` - Scale factor on the central meridian
    /// * `false_easting` - Added to every easting (meters)
    /// * `false_northing` - Added to every northing (meters)
    /// * `ellipsoid` - Reference ellipsoid
    pub fn new(
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
        ellipsoid: Ellipsoid,
    ) -> Self {
        let e2 = ellipsoid.e2();
        Self {
            lon0: lon0_deg * PI / 180.0,
            k0,
            false_easting,
            false_northing,
            ellipsoid,
            ep2: e2 / (1.0 - e2),
        }
    }

    /// Standard UTM zone (1..=60), northern or southern hemisphere.
    ///
    /// Returns `None` for zones outside 1..=60.
    pub fn utm(zone: u8, south: bool, ellipsoid: Ellipsoid) -> Option<Self> {
        if !(1..=60).contains(&zone) {
            return None;
        }
        let lon0 = zone as f64 * 6.0 - 183.0;
        let false_northing = if south { 10_000_000.0 } else { 0.0 };
        Some(Self::new(lon0, 0.9996, 500_000.0, false_northing, ellipsoid))
    }

    /// Central meridian in degrees.
    pub fn central_meridian_deg(&self) -> f64 {
        self.lon0 * 180.0 / PI
    }

    /// Meridian arc length from the equator to latitude `phi` (radians).
    fn meridian_arc(&self, phi: f64) -> f64 {
        let e2 = self.ellipsoid.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        self.ellipsoid.a
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }

    /// Geographic (lon, lat in degrees) to projected (easting, northing).
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ep2;

        let phi = lat_deg * PI / 180.0;
        let mut dlon = lon_deg * PI / 180.0 - self.lon0;
        // Normalize longitude difference to [-π, π]
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let sin_phi = phi.sin();
        let cos_phi = phi.cos();
        let tan_phi = phi.tan();

        let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let big_a = dlon * cos_phi;
        let m = self.meridian_arc(phi);

        let x = self.k0
            * n
            * (big_a
                + (1.0 - t + c) * big_a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * big_a.powi(5) / 120.0);

        let y = self.k0
            * (m + n
                * tan_phi
                * (big_a * big_a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * big_a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * big_a.powi(6)
                        / 720.0));

        (x + self.false_easting, y + self.false_northing)
    }

    /// Projected (easting, northing) to geographic (lon, lat in degrees).
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ep2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let x = easting - self.false_easting;
        let y = northing - self.false_northing;

        let m = y / self.k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let sqrt_1_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);

        // Footpoint latitude
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        let tan_phi1 = phi1.tan();

        let c1 = ep2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = a / denom.sqrt();
        let r1 = a * (1.0 - e2) / denom.powf(1.5);
        let d = x / (n1 * self.k0);

        let phi = phi1
            - (n1 * tan_phi1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);

        let lambda = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;

        (lambda * 180.0 / PI, phi * 180.0 / PI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_zone() {
        assert!(TransverseMercator::utm(0, false, Ellipsoid::WGS84).is_none());
        assert!(TransverseMercator::utm(61, true, Ellipsoid::WGS84).is_none());
    }

    #[test]
    fn test_central_meridian() {
        let utm22 = TransverseMercator::utm(22, true, Ellipsoid::GRS80).unwrap();
        assert!((utm22.central_meridian_deg() - (-51.0)).abs() < 1e-12);

        let (e, n) = utm22.forward(-51.0, 0.0);
        assert!((e - 500_000.0).abs() < 1e-6);
        assert!((n - 10_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_known_point_northern() {
        // 40°N 75°W in UTM zone 18N
        let utm18 = TransverseMercator::utm(18, false, Ellipsoid::WGS84).unwrap();
        let (e, n) = utm18.forward(-75.0, 40.0);
        assert!((e - 500_000.0).abs() < 1e-6);
        assert!((n - 4_427_757.22).abs() < 0.01, "northing = {}", n);
    }

    #[test]
    fn test_known_point_southern() {
        // Porto Alegre in SIRGAS 2000 / UTM zone 22S
        let utm22 = TransverseMercator::utm(22, true, Ellipsoid::GRS80).unwrap();
        let (e, n) = utm22.forward(-51.2177, -30.0346);
        assert!((e - 479_010.60).abs() < 0.05, "easting = {}", e);
        assert!((n - 6_677_360.72).abs() < 0.05, "northing = {}", n);
    }

    #[test]
    fn test_roundtrip() {
        let utm22 = TransverseMercator::utm(22, true, Ellipsoid::GRS80).unwrap();
        for (lon, lat) in [(-51.2177, -30.0346), (-53.9, -33.5), (-48.1, -25.0)] {
            let (e, n) = utm22.forward(lon, lat);
            let (lon2, lat2) = utm22.inverse(e, n);
            assert!((lon - lon2).abs() < 1e-8, "lon roundtrip {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-8, "lat roundtrip {} vs {}", lat, lat2);
        }
    }
}
