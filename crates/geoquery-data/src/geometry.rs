//! Geographic primitives shared by containers and the query core.
//!
//! Coordinates are WGS84 decimal degrees. Distances are great-circle metres.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

const METRES_PER_DEGREE_LAT: f64 = 111_320.0;

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    /// Build a point, clamping latitude to [-90, 90] and longitude to [-180, 180].
    ///
    /// Non-finite components fall back to `0.0` so a malformed coordinate never
    /// poisons distance computations.
    pub fn new(lat: f64, lon: f64) -> Self {
        let lat = if lat.is_finite() { lat } else { 0.0 };
        let lon = if lon.is_finite() { lon } else { 0.0 };
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: lon.clamp(-180.0, 180.0),
        }
    }

    /// Build a point only if both components are finite and in range.
    pub fn try_new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// Great-circle distance in metres.
    pub fn distance_m(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }

    /// Shift the point by the given metres north and east (equirectangular approximation).
    pub fn offset_m(&self, north_m: f64, east_m: f64) -> Self {
        let dlat = north_m / METRES_PER_DEGREE_LAT;
        let cos_lat = self.lat.to_radians().cos().max(1e-6);
        let dlon = east_m / (METRES_PER_DEGREE_LAT * cos_lat);
        Self::new(self.lat + dlat, self.lon + dlon)
    }
}

/// An axis-aligned rectangle in degrees. Always normalized so `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Default for Rect {
    fn default() -> Self {
        Self::world()
    }
}

impl Rect {
    /// Build a rectangle from two corners in any order, clamping to valid ranges.
    pub fn new(a: Point, b: Point) -> Self {
        let (a, b) = (Point::new(a.lat, a.lon), Point::new(b.lat, b.lon));
        Self {
            min_lat: a.lat.min(b.lat),
            min_lon: a.lon.min(b.lon),
            max_lat: a.lat.max(b.lat),
            max_lon: a.lon.max(b.lon),
        }
    }

    pub fn from_bounds(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self::new(Point::new(min_lat, min_lon), Point::new(max_lat, max_lon))
    }

    /// The whole world.
    pub const fn world() -> Self {
        Self {
            min_lat: -90.0,
            min_lon: -180.0,
            max_lat: 90.0,
            max_lon: 180.0,
        }
    }

    /// A degenerate rectangle around a single point.
    pub fn from_point(p: Point) -> Self {
        Self::new(p, p)
    }

    /// A square of `half_side_m` metres around `center`.
    pub fn around(center: Point, half_side_m: f64) -> Self {
        let half = half_side_m.max(0.0);
        Self::new(
            center.offset_m(-half, -half),
            center.offset_m(half, half),
        )
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn width_deg(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height_deg(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longest side in degrees, used for index scale selection.
    pub fn max_side_deg(&self) -> f64 {
        self.width_deg().max(self.height_deg())
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat)
            && (self.min_lon..=self.max_lon).contains(&p.lon)
    }

    /// True if `other` lies entirely inside `self` (borders included).
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Grow (or shrink, for negative values) every side by `margin_m` metres.
    pub fn inflate_m(&self, margin_m: f64) -> Self {
        let sw = Point::new(self.min_lat, self.min_lon).offset_m(-margin_m, -margin_m);
        let ne = Point::new(self.max_lat, self.max_lon).offset_m(margin_m, margin_m);
        Self::new(sw, ne)
    }

    /// Distance from `p` to the closest point of the rectangle, zero when inside.
    pub fn distance_to_m(&self, p: &Point) -> f64 {
        let closest = Point::new(
            p.lat.clamp(self.min_lat, self.max_lat),
            p.lon.clamp(self.min_lon, self.max_lon),
        );
        closest.distance_m(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_clamps_malformed_input() {
        let p = Point::new(f64::NAN, 400.0);
        assert_eq!(p.lat, 0.0);
        assert_eq!(p.lon, 180.0);
        assert!(Point::try_new(91.0, 0.0).is_none());
        assert!(Point::try_new(45.0, 10.0).is_some());
    }

    #[test]
    fn test_distance_and_offset_agree() {
        let origin = Point::new(48.8566, 2.3522);
        let moved = origin.offset_m(0.0, 1000.0);
        let d = origin.distance_m(&moved);
        assert!((d - 1000.0).abs() < 10.0, "expected ~1000m, got {d}");
    }

    #[test]
    fn test_rect_containment() {
        let outer = Rect::from_bounds(0.0, 0.0, 10.0, 10.0);
        let inner = Rect::from_bounds(2.0, 2.0, 3.0, 3.0);
        assert!(outer.contains_rect(&inner));
        assert!(!inner.contains_rect(&outer));
        assert!(outer.contains_rect(&outer));
        assert!(outer.intersects(&inner));
        assert!(!inner.intersects(&Rect::from_bounds(5.0, 5.0, 6.0, 6.0)));
    }

    #[test]
    fn test_rect_corners_are_normalized() {
        let r = Rect::new(Point::new(10.0, 20.0), Point::new(-5.0, -3.0));
        assert_eq!(r.min_lat, -5.0);
        assert_eq!(r.max_lon, 20.0);
        assert_eq!(r.center(), Point::new(2.5, 8.5));
    }

    #[test]
    fn test_distance_to_rect() {
        let r = Rect::around(Point::new(10.0, 10.0), 500.0);
        assert_eq!(r.distance_to_m(&Point::new(10.0, 10.0)), 0.0);
        let outside = Point::new(10.0, 10.0).offset_m(2000.0, 0.0);
        let d = r.distance_to_m(&outside);
        assert!(d > 1400.0 && d < 1600.0, "got {d}");
    }
}
