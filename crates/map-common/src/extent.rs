//! Extent types and operations.

use serde::{Deserialize, Serialize};

/// An axis-aligned extent `[min_x, min_y, max_x, max_y]`.
///
/// Coordinates are in whatever reference system the owner states: degrees for
/// geographic systems, meters for projected ones. Extents built from user
/// input should go through [`Extent::normalized`] so that `min <= max` holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create a new extent from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Degenerate extent covering a single point.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Smallest extent covering all points, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut extent = Self::from_point(x, y);
        for (x, y) in iter {
            extent.extend_point(x, y);
        }
        Some(extent)
    }

    /// Parse a BBOX parameter string: "minx,miny,maxx,maxy"
    pub fn from_wms_string(s: &str) -> Result<Self, ExtentParseError> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(ExtentParseError::InvalidFormat(s.to_string()));
        }

        let parse = |part: &str| {
            part.parse::<f64>()
                .map_err(|_| ExtentParseError::InvalidNumber(part.to_string()))
        };

        Ok(Self {
            min_x: parse(parts[0])?,
            min_y: parse(parts[1])?,
            max_x: parse(parts[2])?,
            max_y: parse(parts[3])?,
        })
    }

    /// Render as a BBOX parameter value.
    pub fn to_wms_string(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Copy with swapped bounds where min exceeds max.
    pub fn normalized(&self) -> Self {
        Self {
            min_x: self.min_x.min(self.max_x),
            min_y: self.min_y.min(self.max_y),
            max_x: self.min_x.max(self.max_x),
            max_y: self.min_y.max(self.max_y),
        }
    }

    /// True when every bound is finite and `min <= max` on both axes.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// Width of the extent in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the extent in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Check if this extent intersects another.
    ///
    /// Edges are closed: extents that only touch count as intersecting, and a
    /// degenerate point extent intersects any extent containing it.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Compute the intersection of two extents.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.intersects(other) {
            return None;
        }

        Some(Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Check if a point is contained within this extent.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow the extent by `value` on every side.
    pub fn buffer(&self, value: f64) -> Extent {
        Extent::new(
            self.min_x - value,
            self.min_y - value,
            self.max_x + value,
            self.max_y + value,
        )
    }

    /// Shift the extent horizontally by `dx`.
    pub fn translate_x(&self, dx: f64) -> Extent {
        Extent::new(self.min_x + dx, self.min_y, self.max_x + dx, self.max_y)
    }

    /// Clamp every bound into `bounds`.
    pub fn clamp_to(&self, bounds: &Extent) -> Extent {
        let clamp = |v: f64, lo: f64, hi: f64| v.max(lo).min(hi);
        Extent::new(
            clamp(self.min_x, bounds.min_x, bounds.max_x),
            clamp(self.min_y, bounds.min_y, bounds.max_y),
            clamp(self.max_x, bounds.min_x, bounds.max_x),
            clamp(self.max_y, bounds.min_y, bounds.max_y),
        )
    }

    pub fn extend_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Union of two extents.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }
}

impl From<[f64; 4]> for Extent {
    fn from(v: [f64; 4]) -> Self {
        Extent::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.min_x, e.min_y, e.max_x, e.max_y]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtentParseError {
    #[error("Invalid extent format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in extent: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wms_extent() {
        let extent = Extent::from_wms_string("-125.0,24.0,-66.0,50.0").unwrap();
        assert_eq!(extent.min_x, -125.0);
        assert_eq!(extent.min_y, 24.0);
        assert_eq!(extent.max_x, -66.0);
        assert_eq!(extent.max_y, 50.0);
    }

    #[test]
    fn test_intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(5.0, 5.0, 15.0, 15.0);
        let c = Extent::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection, Extent::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_normalized_swaps_inverted_bounds() {
        let extent = Extent::new(10.0, 8.0, 2.0, 4.0).normalized();
        assert_eq!(extent, Extent::new(2.0, 4.0, 10.0, 8.0));
        assert!(extent.is_valid());
    }

    #[test]
    fn test_from_points() {
        let extent = Extent::from_points(vec![(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)]).unwrap();
        assert_eq!(extent, Extent::new(-2.0, -1.0, 4.0, 5.0));
        assert!(Extent::from_points(Vec::new()).is_none());
    }
}
