//! Greedy minimal-cloud cover selection
//!
//! The central algorithm of the mosaic path. Candidates are walked in
//! ascending cloud-cover order; a candidate is kept only if the part of its
//! footprint inside the query bounds adds area not already covered by the
//! tiles kept so far. The loop stops early once the accumulated coverage
//! contains the whole query bounds.
//!
//! The policy is best-cloud-first, skip-if-redundant. It is not guaranteed
//! minimal in the strict set-cover sense, but every kept tile contributes
//! new area, and for any sub-area the lowest-cloud tile covering it is
//! preferred over worse duplicates. Output order is the input's cloud-sorted
//! order, which downstream compositing relies on: index 0 has the lowest
//! cloud cover and wins ties at every pixel.

use geo::{Area, BooleanOps, MultiPolygon};
use tracing::debug;

use crate::bounds::BoundingBox;
use crate::catalog::CandidateTile;

/// Area slack (in squared degrees) below which a residual geometry is
/// treated as empty. Absorbs floating-point noise from repeated boolean
/// operations.
const AREA_EPSILON: f64 = 1e-10;

/// Returns true if `geometry` is fully contained in `covered`, up to
/// [`AREA_EPSILON`] of residual area.
fn is_covered(covered: &MultiPolygon<f64>, geometry: &MultiPolygon<f64>) -> bool {
    geometry.difference(covered).unsigned_area() <= AREA_EPSILON
}

/// Selects the subset of `candidates` that covers `bounds` with minimal
/// cloud, preserving ascending cloud-cover order in the result.
///
/// If no subset of candidates fully covers the bounds, all contributing
/// candidates are returned and the partial coverage is accepted silently.
pub fn select_optimal_cover(
    mut candidates: Vec<CandidateTile>,
    bounds: &BoundingBox,
) -> Vec<CandidateTile> {
    candidates.sort_by(|a, b| a.cloud_cover.total_cmp(&b.cloud_cover));

    let bounds_geom = MultiPolygon(vec![bounds.to_polygon()]);
    let mut covered = MultiPolygon::<f64>(vec![]);
    let mut selected = Vec::new();

    for candidate in candidates {
        let overlap = candidate.footprint.intersection(&bounds_geom);
        if is_covered(&covered, &overlap) {
            // Redundant: a lower-cloud tile already covers this area.
            continue;
        }

        covered = covered.union(&candidate.footprint);
        selected.push(candidate);

        if is_covered(&covered, &bounds_geom) {
            break;
        }
    }

    if !is_covered(&covered, &bounds_geom) {
        debug!(
            tiles = selected.len(),
            "Candidates exhausted before fully covering bounds; accepting partial coverage"
        );
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn tile(id: &str, cloud_cover: f64, poly: geo::Polygon<f64>) -> CandidateTile {
        CandidateTile {
            id: id.to_string(),
            footprint: MultiPolygon(vec![poly]),
            cloud_cover,
            acquired: None,
            assets: Default::default(),
        }
    }

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> geo::Polygon<f64> {
        polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
            (x: min_x, y: min_y),
        ]
    }

    fn ids(tiles: &[CandidateTile]) -> Vec<&str> {
        tiles.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_single_covering_tile_selected() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let tiles = vec![
            tile("full", 5.0, rect(-0.5, -0.5, 1.5, 1.5)),
            tile("also-full", 9.0, rect(-1.0, -1.0, 2.0, 2.0)),
        ];
        assert_eq!(ids(&select_optimal_cover(tiles, &bounds)), ["full"]);
    }

    #[test]
    fn test_two_halves_beat_redundant_full_tile() {
        // B and C each cover half the bounds at better cloud scores than the
        // full-coverage tile A; together they finish the cover before A is
        // ever reached.
        let bounds = BoundingBox::new(0.0, 0.0, 2.0, 1.0);
        let tiles = vec![
            tile("a-full", 5.0, rect(-0.5, -0.5, 2.5, 1.5)),
            tile("b-west", 1.0, rect(-0.5, -0.5, 1.0, 1.5)),
            tile("c-east", 2.0, rect(1.0, -0.5, 2.5, 1.5)),
        ];
        assert_eq!(
            ids(&select_optimal_cover(tiles, &bounds)),
            ["b-west", "c-east"]
        );
    }

    #[test]
    fn test_result_is_subsequence_of_cloud_sorted_input() {
        let bounds = BoundingBox::new(0.0, 0.0, 3.0, 1.0);
        let tiles = vec![
            tile("mid", 8.0, rect(1.0, 0.0, 2.0, 1.0)),
            tile("west", 2.0, rect(0.0, 0.0, 1.0, 1.0)),
            tile("east", 13.0, rect(2.0, 0.0, 3.0, 1.0)),
            tile("west-dup", 6.0, rect(0.0, 0.0, 1.0, 1.0)),
        ];
        let selected = select_optimal_cover(tiles, &bounds);
        assert_eq!(ids(&selected), ["west", "mid", "east"]);

        let clouds: Vec<f64> = selected.iter().map(|t| t.cloud_cover).collect();
        let mut sorted = clouds.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(clouds, sorted);
    }

    #[test]
    fn test_partial_coverage_returned_silently() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let tiles = vec![tile("corner", 1.0, rect(0.0, 0.0, 1.0, 1.0))];
        assert_eq!(ids(&select_optimal_cover(tiles, &bounds)), ["corner"]);
    }

    #[test]
    fn test_no_candidates_yields_empty_selection() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(select_optimal_cover(Vec::new(), &bounds).is_empty());
    }

    #[test]
    fn test_disjoint_tile_outside_bounds_skipped() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let tiles = vec![
            tile("far-away", 0.5, rect(5.0, 5.0, 6.0, 6.0)),
            tile("covering", 3.0, rect(-0.5, -0.5, 1.5, 1.5)),
        ];
        // The disjoint tile has an empty overlap with the bounds and must
        // not be selected even though it has the best cloud score.
        assert_eq!(ids(&select_optimal_cover(tiles, &bounds)), ["covering"]);
    }
}
