//! Raster grids, affine transforms, and pixel data
//!
//! A [`RasterGrid`] describes a pixel grid: dimensions, the six-parameter
//! affine transform from pixel row/column to world coordinates, and the CRS
//! as an EPSG code. All rasterization and reprojection in this crate
//! preserves an explicit transform exactly; reprojecting back onto a grid
//! must reproduce that grid's transform bit-for-bit.

pub mod geotiff;

pub use geotiff::{read_geotiff, read_grid, write_geotiff, write_geotiff_u16, GeoTiffError};

use ndarray::Array3;

/// Six-parameter affine transform mapping pixel (col, row) to world (x, y):
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Equality is exact per-coefficient, which is what transform round-trip
/// guarantees are checked against.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform from the grid's west/north corner and pixel
    /// resolutions (both positive; `y_res` is applied downward).
    pub fn from_origin(west: f64, north: f64, x_res: f64, y_res: f64) -> Self {
        Self {
            a: x_res,
            b: 0.0,
            c: west,
            d: 0.0,
            e: -y_res,
            f: north,
        }
    }

    /// Maps fractional pixel coordinates to world coordinates.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// World coordinate of the center of pixel (col, row).
    #[inline]
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Maps world coordinates to fractional pixel coordinates, or `None`
    /// for a degenerate (non-invertible) transform.
    #[inline]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 {
            return None;
        }
        let dx = x - self.c;
        let dy = y - self.f;
        Some((
            (self.e * dx - self.b * dy) / det,
            (-self.d * dx + self.a * dy) / det,
        ))
    }
}

/// A pixel grid: dimensions, affine transform, and CRS.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    /// EPSG code of the grid's coordinate reference system.
    pub epsg: u32,
}

impl RasterGrid {
    pub fn new(width: usize, height: usize, transform: GeoTransform, epsg: u32) -> Self {
        Self {
            width,
            height,
            transform,
            epsg,
        }
    }

    /// Builds a north-up grid spanning `bounds` = [min_x, min_y, max_x,
    /// max_y] with the given pixel dimensions.
    pub fn from_bounds(bounds: [f64; 4], width: usize, height: usize, epsg: u32) -> Self {
        let x_res = (bounds[2] - bounds[0]) / width as f64;
        let y_res = (bounds[3] - bounds[1]) / height as f64;
        Self::new(
            width,
            height,
            GeoTransform::from_origin(bounds[0], bounds[3], x_res, y_res),
            epsg,
        )
    }

    /// Builds a north-up grid spanning `bounds` at the given resolution,
    /// rounding dimensions outward so the bounds stay fully covered.
    pub fn from_bounds_resolution(bounds: [f64; 4], x_res: f64, y_res: f64, epsg: u32) -> Self {
        let width = ((bounds[2] - bounds[0]) / x_res).ceil().max(1.0) as usize;
        let height = ((bounds[3] - bounds[1]) / y_res).ceil().max(1.0) as usize;
        Self::new(
            width,
            height,
            GeoTransform::from_origin(bounds[0], bounds[3], x_res, y_res),
            epsg,
        )
    }

    /// The grid's extent as [min_x, min_y, max_x, max_y], assuming a
    /// north-up transform.
    pub fn bounds(&self) -> [f64; 4] {
        let (min_x, max_y) = self.transform.apply(0.0, 0.0);
        let (max_x, min_y) = self
            .transform
            .apply(self.width as f64, self.height as f64);
        [min_x, min_y, max_x, max_y]
    }

    /// Pixel resolution as positive (x, y) sizes.
    pub fn resolution(&self) -> (f64, f64) {
        (self.transform.a, -self.transform.e)
    }
}

/// Pixel data on a grid, shaped `[bands, height, width]`.
#[derive(Debug, Clone)]
pub struct Raster<T> {
    pub grid: RasterGrid,
    pub data: Array3<T>,
}

impl<T> Raster<T> {
    /// Wraps band data on a grid.
    ///
    /// # Panics
    ///
    /// Panics if `data`'s height/width axes disagree with the grid.
    pub fn new(grid: RasterGrid, data: Array3<T>) -> Self {
        let shape = data.shape();
        assert_eq!(
            (shape[1], shape[2]),
            (grid.height, grid.width),
            "raster data shape must match its grid"
        );
        Self { grid, data }
    }

    /// Number of bands.
    pub fn bands(&self) -> usize {
        self.data.shape()[0]
    }
}
