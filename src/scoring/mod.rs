//! Occupancy overlap scoring between fusion nodes.
//!
//! Evaluates a hypothesized relative transform between two nodes by
//! comparing occupancy values of spatially corresponding cells, producing a
//! scalar dissimilarity used to accept or reject loop-closure and
//! registration hypotheses.

use nalgebra::Isometry3;

use crate::error::Result;
use crate::map::{LocalMap, OccupancyMap};
use crate::node::FusionNode;

/// Occupancy value of a cell that is initialized but was never observed.
const UNOBSERVED: f64 = 0.5;

/// Score returned when no cell pair was comparable.
const NO_OVERLAP: f64 = 1.0;

/// Mean squared occupancy difference between two nodes under `hypothesis`.
///
/// Every initialized cell of `moving`'s occupancy map whose value is not the
/// 0.5 unobserved sentinel is transformed into `reference`'s frame; where the
/// reference map has an observed cell covering the transformed center, the
/// squared occupancy difference is accumulated. The score is the mean over
/// all compared pairs.
///
/// Lower is better: `0.0` for identical observed maps under the identity,
/// exactly `1.0` when zero pairs were comparable, so callers can tell "no
/// overlap evidence" apart from "perfect overlap". The score is a heuristic,
/// not a metric.
pub fn overlap_score<R: LocalMap, S: LocalMap>(
    reference: &FusionNode<R>,
    moving: &FusionNode<S>,
    hypothesis: &Isometry3<f64>,
) -> Result<f64> {
    let reference_map = reference.occupancy_map()?;
    // Owned snapshot of the moving map's cells; dropped when this call
    // returns, on every path.
    let cells = moving.occupancy_map()?.initialized_cells();

    let mut diff_sum = 0.0;
    let mut compared = 0usize;
    for cell in &cells {
        // Exact sentinel comparison, not a threshold: 0.5 marks a cell
        // without any readings.
        if cell.occupancy == UNOBSERVED {
            continue;
        }
        let transformed = hypothesis * cell.center;
        let Some(reference_cell) = reference_map.cell_at(&transformed) else {
            continue;
        };
        if reference_cell.occupancy == UNOBSERVED {
            continue;
        }
        let diff = cell.occupancy - reference_cell.occupancy;
        diff_sum += diff * diff;
        compared += 1;
    }

    if compared == 0 {
        return Ok(NO_OVERLAP);
    }
    log::debug!(
        "Overlap score compared {} of {} moving cells",
        compared,
        cells.len()
    );
    Ok(diff_sum / compared as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SangrahaError;
    use crate::map::{FusedMap, SparseVoxelMap, VoxelMapConfig};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn voxel_map() -> SparseVoxelMap {
        SparseVoxelMap::new(VoxelMapConfig {
            resolution: 1.0,
            ..VoxelMapConfig::default()
        })
    }

    fn node_with_occupancy(map: SparseVoxelMap) -> FusionNode<FusedMap> {
        FusionNode::with_map(FusedMap::new(map, Default::default()))
    }

    fn cell_point(i: i32) -> Point3<f64> {
        Point3::new(i as f64 + 0.5, 0.5, 0.5)
    }

    #[test]
    fn test_requires_attached_maps() {
        let empty: FusionNode<FusedMap> = FusionNode::new();
        let full = node_with_occupancy(voxel_map());
        assert!(matches!(
            overlap_score(&empty, &full, &Isometry3::identity()),
            Err(SangrahaError::MapNotAttached)
        ));
        assert!(matches!(
            overlap_score(&full, &empty, &Isometry3::identity()),
            Err(SangrahaError::MapNotAttached)
        ));
    }

    #[test]
    fn test_disjoint_maps_hit_sentinel() {
        let mut reference = voxel_map();
        let mut moving = voxel_map();
        reference.set_occupancy(&cell_point(0), 0.9);
        moving.set_occupancy(&cell_point(100), 0.9);

        let score = overlap_score(
            &node_with_occupancy(reference),
            &node_with_occupancy(moving),
            &Isometry3::identity(),
        )
        .unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_unobserved_cells_hit_sentinel() {
        // Overlapping extents, but every cell sits at the 0.5 sentinel.
        let mut reference = voxel_map();
        let mut moving = voxel_map();
        for i in 0..10 {
            reference.touch(&cell_point(i));
            moving.touch(&cell_point(i));
        }

        let score = overlap_score(
            &node_with_occupancy(reference),
            &node_with_occupancy(moving),
            &Isometry3::identity(),
        )
        .unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_identical_maps_score_zero() {
        let mut map = voxel_map();
        for i in 0..20 {
            map.set_occupancy(&cell_point(i), 0.8);
        }
        let reference = node_with_occupancy(map.clone());
        let moving = node_with_occupancy(map);

        let score = overlap_score(&reference, &moving, &Isometry3::identity()).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_worked_example() {
        // Two 100-cell grids, 10 cells overlapping under identity: 5 pairs
        // differ by 0.1 and 5 pairs match, so the mean squared difference is
        // (5 * 0.01 + 5 * 0.0) / 10 = 0.005.
        let mut reference = voxel_map();
        let mut moving = voxel_map();
        for i in -90..10 {
            reference.set_occupancy(&cell_point(i), 0.2);
        }
        for i in 0..100 {
            let occupancy = if i < 5 { 0.3 } else { 0.2 };
            moving.set_occupancy(&cell_point(i), occupancy);
        }

        let score = overlap_score(
            &node_with_occupancy(reference),
            &node_with_occupancy(moving),
            &Isometry3::identity(),
        )
        .unwrap();
        assert_relative_eq!(score, 0.005, epsilon = 1e-9);
    }

    #[test]
    fn test_hypothesis_shifts_moving_cells() {
        // The moving map only overlaps the reference once shifted by 10m.
        let mut reference = voxel_map();
        let mut moving = voxel_map();
        for i in 0..10 {
            reference.set_occupancy(&cell_point(i), 0.8);
            moving.set_occupancy(&cell_point(i - 10), 0.8);
        }
        let reference = node_with_occupancy(reference);
        let moving = node_with_occupancy(moving);

        let unaligned = overlap_score(&reference, &moving, &Isometry3::identity()).unwrap();
        assert_eq!(unaligned, 1.0);

        let shift = Isometry3::new(Vector3::new(10.0, 0.0, 0.0), Vector3::zeros());
        let aligned = overlap_score(&reference, &moving, &shift).unwrap();
        assert_eq!(aligned, 0.0);
    }
}
