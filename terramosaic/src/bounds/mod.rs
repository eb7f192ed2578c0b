//! Geographic bounding boxes and normalization
//!
//! Provides the [`BoundingBox`] type used by both pipelines and the wrapping
//! procedure that brings arbitrary longitude/latitude bounds (e.g., produced
//! by unioning geometry across the antimeridian) back into canonical ranges.

use geo::{polygon, Polygon, Rect};

/// Half-range of valid longitudes in degrees.
pub const LON_OFFSET: f64 = 180.0;

/// Half-range of valid latitudes in degrees.
pub const LAT_OFFSET: f64 = 90.0;

/// A geographic bounding box in degrees, ordered (west, south, east, north).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Wraps a single coordinate into `[-offset, offset)`.
#[inline]
fn wrap(value: f64, offset: f64) -> f64 {
    (value + offset).rem_euclid(2.0 * offset) - offset
}

impl BoundingBox {
    /// Creates a bounding box without normalizing the coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Creates a bounding box from a `[min_lon, min_lat, max_lon, max_lat]`
    /// array, as found in GeoJSON `bbox` members and STAC search requests.
    pub fn from_array(bounds: [f64; 4]) -> Self {
        Self::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }

    /// Returns the box as a `[min_lon, min_lat, max_lon, max_lat]` array.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// Wraps each coordinate into canonical ranges: longitude in
    /// `[-180, 180)` and latitude in `[-90, 90)`.
    ///
    /// The procedure adds the half-range offset, reduces modulo the full
    /// range, and subtracts the offset back. It is idempotent: normalizing
    /// an already-normalized box returns it unchanged.
    ///
    /// Note that when the true box straddles the antimeridian the result has
    /// `min_lon > max_lon`; see [`BoundingBox::split_antimeridian`] for the
    /// explicit handling of that case.
    pub fn normalize(&self) -> Self {
        Self {
            min_lon: wrap(self.min_lon, LON_OFFSET),
            min_lat: wrap(self.min_lat, LAT_OFFSET),
            max_lon: wrap(self.max_lon, LON_OFFSET),
            max_lat: wrap(self.max_lat, LAT_OFFSET),
        }
    }

    /// Returns true if normalization produced a box that wraps across the
    /// antimeridian (west edge east of the east edge).
    pub fn straddles_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Splits an antimeridian-straddling box into two canonical boxes, one
    /// on each side of the ±180° line.
    ///
    /// For a box that does not straddle the antimeridian the second element
    /// is `None` and the first is the box itself.
    pub fn split_antimeridian(&self) -> (Self, Option<Self>) {
        if !self.straddles_antimeridian() {
            return (*self, None);
        }
        let west = Self::new(self.min_lon, self.min_lat, LON_OFFSET, self.max_lat);
        let east = Self::new(-LON_OFFSET, self.min_lat, self.max_lon, self.max_lat);
        (west, Some(east))
    }

    /// Converts the box to a closed `geo` polygon.
    pub fn to_polygon(&self) -> Polygon<f64> {
        polygon![
            (x: self.min_lon, y: self.min_lat),
            (x: self.max_lon, y: self.min_lat),
            (x: self.max_lon, y: self.max_lat),
            (x: self.min_lon, y: self.max_lat),
            (x: self.min_lon, y: self.min_lat),
        ]
    }

    /// Converts the box to a `geo` axis-aligned rectangle.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            geo::coord! { x: self.min_lon, y: self.min_lat },
            geo::coord! { x: self.max_lon, y: self.max_lat },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_in_range_bounds_unchanged() {
        let bbox = BoundingBox::new(-148.56, 60.80, -147.44, 61.18);
        assert_eq!(bbox.normalize(), bbox);
    }

    #[test]
    fn test_longitude_wraps_past_180() {
        let bbox = BoundingBox::new(185.0, 10.0, 190.0, 20.0).normalize();
        assert!((bbox.min_lon - -175.0).abs() < 1e-12);
        assert!((bbox.max_lon - -170.0).abs() < 1e-12);
    }

    #[test]
    fn test_exactly_180_maps_to_negative_180() {
        let bbox = BoundingBox::new(180.0, 0.0, 180.0, 0.0).normalize();
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, -180.0);
    }

    #[test]
    fn test_straddling_box_detected_and_split() {
        // A true box crossing the antimeridian normalizes to min > max.
        let bbox = BoundingBox::new(175.0, -10.0, 185.0, 10.0).normalize();
        assert!(bbox.straddles_antimeridian());

        let (west, east) = bbox.split_antimeridian();
        let east = east.expect("straddling box must split in two");
        assert_eq!(west.to_array(), [175.0, -10.0, 180.0, 10.0]);
        assert_eq!(east.to_array(), [-180.0, -10.0, -175.0, 10.0]);
    }

    #[test]
    fn test_non_straddling_box_does_not_split() {
        let bbox = BoundingBox::new(-10.0, -10.0, 10.0, 10.0);
        let (whole, rest) = bbox.split_antimeridian();
        assert_eq!(whole, bbox);
        assert!(rest.is_none());
    }

    proptest! {
        #[test]
        fn prop_normalized_coordinates_in_canonical_ranges(
            min_lon in -1000.0f64..1000.0,
            min_lat in -1000.0f64..1000.0,
            max_lon in -1000.0f64..1000.0,
            max_lat in -1000.0f64..1000.0,
        ) {
            let bbox = BoundingBox::new(min_lon, min_lat, max_lon, max_lat).normalize();
            prop_assert!((-180.0..180.0).contains(&bbox.min_lon));
            prop_assert!((-180.0..180.0).contains(&bbox.max_lon));
            prop_assert!((-90.0..90.0).contains(&bbox.min_lat));
            prop_assert!((-90.0..90.0).contains(&bbox.max_lat));
        }

        #[test]
        fn prop_normalize_is_idempotent(
            min_lon in -1000.0f64..1000.0,
            min_lat in -1000.0f64..1000.0,
            max_lon in -1000.0f64..1000.0,
            max_lat in -1000.0f64..1000.0,
        ) {
            let once = BoundingBox::new(min_lon, min_lat, max_lon, max_lat).normalize();
            prop_assert_eq!(once.normalize(), once);
        }
    }
}
