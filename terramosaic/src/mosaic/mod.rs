//! Mosaic compositing
//!
//! Stacks selected tiles on a common output grid and composites them with a
//! first-valid-wins rule: for each pixel of each band, the value comes from
//! the first tile in the stack with valid data there. Tile order is the
//! cover selector's preserved ascending-cloud order, so the lowest-cloud
//! tile always wins ties. Zero is the sensor's nodata convention and is
//! masked out of compositing.
//!
//! [`Mosaic::optimize`] precomputes the full composite so later sub-window
//! reads are array slices instead of per-pixel scans. It is a performance
//! optimization only and never changes the numeric result.

use ndarray::{s, Array3};
use thiserror::Error;

use crate::raster::{Raster, RasterGrid};

/// Errors that can occur while compositing.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// No valid tiles survived filtering; nothing to composite.
    #[error("No tiles left to composite")]
    EmptyStack,

    /// A tile in the stack is not on the output grid.
    #[error("Tile {index} grid does not match the output grid")]
    GridMismatch { index: usize },

    /// Tiles disagree on band count.
    #[error("Tile {index} has {got} bands, expected {expected}")]
    BandMismatch {
        index: usize,
        got: usize,
        expected: usize,
    },
}

/// A lazy composite over a stack of tiles sharing one output grid.
pub struct Mosaic {
    grid: RasterGrid,
    bands: usize,
    stack: Vec<Array3<u16>>,
    composite: Option<Array3<u16>>,
}

impl Mosaic {
    /// Builds a mosaic from tiles already warped onto a common grid, in
    /// compositing priority order (lowest cloud cover first).
    pub fn from_stack(tiles: Vec<Raster<u16>>) -> Result<Self, MosaicError> {
        let first = tiles.first().ok_or(MosaicError::EmptyStack)?;
        let grid = first.grid;
        let bands = first.bands();

        let mut stack = Vec::with_capacity(tiles.len());
        for (index, tile) in tiles.into_iter().enumerate() {
            if tile.grid != grid {
                return Err(MosaicError::GridMismatch { index });
            }
            if tile.bands() != bands {
                return Err(MosaicError::BandMismatch {
                    index,
                    got: tile.bands(),
                    expected: bands,
                });
            }
            stack.push(tile.data);
        }

        Ok(Self {
            grid,
            bands,
            stack,
            composite: None,
        })
    }

    /// The output grid.
    pub fn grid(&self) -> RasterGrid {
        self.grid
    }

    /// Number of bands.
    pub fn bands(&self) -> usize {
        self.bands
    }

    #[inline]
    fn composite_pixel(&self, band: usize, row: usize, col: usize) -> u16 {
        for tile in &self.stack {
            let value = tile[[band, row, col]];
            if value != 0 {
                return value;
            }
        }
        0
    }

    /// Precomputes the full composite so sub-window reads become slices.
    pub fn optimize(&mut self) {
        if self.composite.is_some() {
            return;
        }
        let mut full = Array3::<u16>::zeros((self.bands, self.grid.height, self.grid.width));
        for band in 0..self.bands {
            for row in 0..self.grid.height {
                for col in 0..self.grid.width {
                    full[[band, row, col]] = self.composite_pixel(band, row, col);
                }
            }
        }
        self.composite = Some(full);
    }

    /// Reads a composited sub-window (all bands).
    ///
    /// # Panics
    ///
    /// Panics if the window exceeds the grid.
    pub fn read_window(&self, row0: usize, col0: usize, height: usize, width: usize) -> Array3<u16> {
        assert!(row0 + height <= self.grid.height && col0 + width <= self.grid.width);

        if let Some(composite) = &self.composite {
            return composite
                .slice(s![.., row0..row0 + height, col0..col0 + width])
                .to_owned();
        }

        let mut out = Array3::<u16>::zeros((self.bands, height, width));
        for band in 0..self.bands {
            for row in 0..height {
                for col in 0..width {
                    out[[band, row, col]] = self.composite_pixel(band, row0 + row, col0 + col);
                }
            }
        }
        out
    }

    /// Reads the full composite as a raster on the output grid.
    pub fn read_full(&self) -> Raster<u16> {
        let data = self.read_window(0, 0, self.grid.height, self.grid.width);
        Raster::new(self.grid, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> RasterGrid {
        RasterGrid::from_bounds([0.0, 0.0, 4.0, 4.0], 4, 4, 4326)
    }

    fn tile_with(values: &[(usize, usize, u16)]) -> Raster<u16> {
        let mut data = Array3::<u16>::zeros((1, 4, 4));
        for &(row, col, v) in values {
            data[[0, row, col]] = v;
        }
        Raster::new(grid(), data)
    }

    #[test]
    fn test_empty_stack_is_an_error() {
        assert!(matches!(
            Mosaic::from_stack(Vec::new()),
            Err(MosaicError::EmptyStack)
        ));
    }

    #[test]
    fn test_first_valid_tile_wins() {
        let best = tile_with(&[(0, 0, 100)]);
        let worse = tile_with(&[(0, 0, 200), (1, 1, 300)]);
        let mosaic = Mosaic::from_stack(vec![best, worse]).unwrap();

        let full = mosaic.read_full();
        // Front tile wins where it has data; nodata falls through.
        assert_eq!(full.data[[0, 0, 0]], 100);
        assert_eq!(full.data[[0, 1, 1]], 300);
        assert_eq!(full.data[[0, 2, 2]], 0);
    }

    #[test]
    fn test_optimize_does_not_change_results() {
        let tiles = vec![tile_with(&[(0, 0, 7), (3, 3, 8)]), tile_with(&[(1, 2, 9)])];
        let mut mosaic = Mosaic::from_stack(tiles).unwrap();

        let lazy = mosaic.read_full();
        mosaic.optimize();
        let eager = mosaic.read_full();
        assert_eq!(lazy.data, eager.data);
    }

    #[test]
    fn test_window_read_matches_full_read() {
        let tiles = vec![tile_with(&[(1, 1, 5), (2, 3, 6)])];
        let mosaic = Mosaic::from_stack(tiles).unwrap();

        let full = mosaic.read_full();
        let window = mosaic.read_window(1, 1, 2, 3);
        assert_eq!(window[[0, 0, 0]], full.data[[0, 1, 1]]);
        assert_eq!(window[[0, 1, 2]], full.data[[0, 2, 3]]);
    }

    #[test]
    fn test_mismatched_grid_rejected() {
        let other_grid = RasterGrid::from_bounds([0.0, 0.0, 4.0, 4.0], 8, 8, 4326);
        let ok = tile_with(&[]);
        let bad = Raster::new(other_grid, Array3::<u16>::zeros((1, 8, 8)));
        assert!(matches!(
            Mosaic::from_stack(vec![ok, bad]),
            Err(MosaicError::GridMismatch { index: 1 })
        ));
    }
}
