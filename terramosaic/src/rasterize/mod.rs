//! Vector-to-raster burn-in
//!
//! Burns classified road geometries into per-class binary channels aligned
//! to a target grid. Two burn policies exist: `Exact` marks the pixels
//! under the line's centerline (a Bresenham walk between pixel centers),
//! and `AllTouched` marks every pixel the line passes through (a supercover
//! grid traversal). Local roads use `AllTouched` because they are more
//! topologically fragmented and the wider footprint keeps them connected in
//! the output mask; primary and secondary roads use `Exact`.
//!
//! Channels are stacked in fixed order [primary, secondary, local], with
//! binary {0,1} values scaled to {0,255} and a single unsigned byte per
//! channel.

use geo::LineString;
use ndarray::{Array2, Array3};

use crate::raster::{Raster, RasterGrid};
use crate::roads::{ClassifiedRoadSet, RoadClass};

/// How a geometry claims pixels during burn-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnPolicy {
    /// Mark only pixels under the centerline.
    Exact,
    /// Mark every pixel the geometry touches.
    AllTouched,
}

impl BurnPolicy {
    /// Policy used for a given road class channel.
    pub fn for_class(class: RoadClass) -> Self {
        match class {
            RoadClass::Local => BurnPolicy::AllTouched,
            _ => BurnPolicy::Exact,
        }
    }
}

#[inline]
fn mark(channel: &mut Array2<u8>, col: i64, row: i64) {
    let (height, width) = channel.dim();
    if col >= 0 && row >= 0 && (col as usize) < width && (row as usize) < height {
        channel[[row as usize, col as usize]] = 1;
    }
}

/// Classic Bresenham walk between two pixel positions.
fn burn_centerline(channel: &mut Array2<u8>, a: (f64, f64), b: (f64, f64)) {
    let (mut x, mut y) = (a.0.floor() as i64, a.1.floor() as i64);
    let (x1, y1) = (b.0.floor() as i64, b.1.floor() as i64);

    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        mark(channel, x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Supercover traversal (Amanatides & Woo): marks every cell the segment
/// passes through, including cells only clipped at a corner crossing.
fn burn_all_touched(channel: &mut Array2<u8>, a: (f64, f64), b: (f64, f64)) {
    let (mut x, mut y) = (a.0.floor() as i64, a.1.floor() as i64);
    let (end_x, end_y) = (b.0.floor() as i64, b.1.floor() as i64);

    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let step_x: i64 = if dx > 0.0 { 1 } else { -1 };
    let step_y: i64 = if dy > 0.0 { 1 } else { -1 };

    // Parametric distance along the segment to the next vertical /
    // horizontal cell boundary, and per-cell increments.
    let (mut t_max_x, t_delta_x) = if dx != 0.0 {
        let next_boundary = if dx > 0.0 {
            (x + 1) as f64
        } else {
            x as f64
        };
        ((next_boundary - a.0) / dx, (1.0 / dx).abs())
    } else {
        (f64::INFINITY, f64::INFINITY)
    };
    let (mut t_max_y, t_delta_y) = if dy != 0.0 {
        let next_boundary = if dy > 0.0 {
            (y + 1) as f64
        } else {
            y as f64
        };
        ((next_boundary - a.1) / dy, (1.0 / dy).abs())
    } else {
        (f64::INFINITY, f64::INFINITY)
    };

    loop {
        mark(channel, x, y);
        if x == end_x && y == end_y {
            break;
        }
        if t_max_x > 1.0 && t_max_y > 1.0 {
            // Numerical guard: both boundary crossings lie past the segment
            // end but the end cell was not reached; mark it and stop.
            mark(channel, end_x, end_y);
            break;
        }
        if t_max_x < t_max_y {
            t_max_x += t_delta_x;
            x += step_x;
        } else {
            t_max_y += t_delta_y;
            y += step_y;
        }
    }
}

/// Burns a set of line geometries (in the grid's CRS) into a single binary
/// channel. An empty set yields an all-zero channel without invoking the
/// burn-in routine.
pub fn rasterize_lines(
    lines: &[LineString<f64>],
    grid: &RasterGrid,
    policy: BurnPolicy,
) -> Array2<u8> {
    let mut channel = Array2::<u8>::zeros((grid.height, grid.width));
    if lines.is_empty() {
        return channel;
    }

    for line in lines {
        for segment in line.lines() {
            let Some(start) = grid.transform.world_to_pixel(segment.start.x, segment.start.y)
            else {
                continue;
            };
            let Some(end) = grid.transform.world_to_pixel(segment.end.x, segment.end.y) else {
                continue;
            };
            match policy {
                BurnPolicy::Exact => burn_centerline(&mut channel, start, end),
                BurnPolicy::AllTouched => burn_all_touched(&mut channel, start, end),
            }
        }
    }
    channel
}

/// Burns the classified road set into a three-channel byte raster on
/// `grid`, in [primary, secondary, local] order with values {0, 255}.
pub fn rasterize_roads(set: &ClassifiedRoadSet, grid: &RasterGrid) -> Raster<u8> {
    let mut data = Array3::<u8>::zeros((RoadClass::CHANNELS.len(), grid.height, grid.width));

    for (channel_index, &class) in RoadClass::CHANNELS.iter().enumerate() {
        let channel = rasterize_lines(set.for_class(class), grid, BurnPolicy::for_class(class));
        data.index_axis_mut(ndarray::Axis(0), channel_index)
            .assign(&channel.mapv(|v| v * 255));
    }

    Raster::new(*grid, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: usize, height: usize) -> RasterGrid {
        // One world unit per pixel, origin at the top-left.
        RasterGrid::from_bounds([0.0, 0.0, width as f64, height as f64], width, height, 4326)
    }

    fn line(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(coords.to_vec())
    }

    #[test]
    fn test_empty_set_yields_zero_channel_of_correct_shape() {
        let grid = grid(16, 8);
        let channel = rasterize_lines(&[], &grid, BurnPolicy::Exact);
        assert_eq!(channel.dim(), (8, 16));
        assert!(channel.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_horizontal_line_burns_one_row() {
        let grid = grid(8, 8);
        // Origin is north: world y 4.5 on an 8-unit grid maps to row 3.
        let channel = rasterize_lines(
            &[line(&[(0.5, 4.5), (7.5, 4.5)])],
            &grid,
            BurnPolicy::Exact,
        );
        let burned: Vec<(usize, usize)> = channel
            .indexed_iter()
            .filter(|(_, &v)| v == 1)
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(burned.len(), 8);
        assert!(burned.iter().all(|&(row, _)| row == 3));
    }

    #[test]
    fn test_all_touched_is_connected_and_strictly_wider() {
        let grid = grid(32, 32);
        // A shallow diagonal crossing many pixel boundaries away from
        // centers; the centerline walk may skip corner-clipped pixels.
        let diagonal = line(&[(0.2, 31.7), (31.8, 0.3)]);

        let exact = rasterize_lines(std::slice::from_ref(&diagonal), &grid, BurnPolicy::Exact);
        let touched = rasterize_lines(
            std::slice::from_ref(&diagonal),
            &grid,
            BurnPolicy::AllTouched,
        );

        let exact_count = exact.iter().filter(|&&v| v == 1).count();
        let touched_count = touched.iter().filter(|&&v| v == 1).count();
        assert!(touched_count > exact_count);

        // Every pair of consecutive marked cells in the traversal shares an
        // edge, so the all-touched footprint has no diagonal-only gaps:
        // each column the line crosses contains at least one marked pixel.
        for col in 0..32 {
            assert!(
                (0..32).any(|row| touched[[row, col]] == 1),
                "column {col} has a gap"
            );
        }
    }

    #[test]
    fn test_vertical_segment_all_touched() {
        let grid = grid(8, 8);
        let channel = rasterize_lines(
            &[line(&[(2.5, 0.5), (2.5, 7.5)])],
            &grid,
            BurnPolicy::AllTouched,
        );
        let count = channel.iter().filter(|&&v| v == 1).count();
        assert_eq!(count, 8);
    }

    #[test]
    fn test_segments_outside_grid_clipped_silently() {
        let grid = grid(4, 4);
        let channel = rasterize_lines(
            &[line(&[(-10.0, 2.5), (10.0, 2.5)])],
            &grid,
            BurnPolicy::AllTouched,
        );
        // Only the in-grid portion is marked.
        assert_eq!(channel.iter().filter(|&&v| v == 1).count(), 4);
    }

    #[test]
    fn test_road_channels_in_fixed_order_and_scaled() {
        use crate::roads::ClassifiedRoadSet;

        let grid = grid(8, 8);
        let set = ClassifiedRoadSet {
            primary: vec![line(&[(0.5, 7.5), (7.5, 7.5)])],
            secondary: vec![],
            local: vec![line(&[(0.5, 0.5), (7.5, 0.5)])],
        };

        let raster = rasterize_roads(&set, &grid);
        assert_eq!(raster.data.dim(), (3, 8, 8));
        assert_eq!(raster.data[[0, 0, 3]], 255); // primary along the top row
        assert!(raster.data.index_axis(ndarray::Axis(0), 1).iter().all(|&v| v == 0));
        assert_eq!(raster.data[[2, 7, 3]], 255); // local along the bottom row
    }
}
