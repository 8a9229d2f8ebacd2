//! Local-map collaborator contracts.
//!
//! A fusion node does not know how its local map stores occupancy or
//! features; it consumes them through the narrow traits below. The crate
//! ships two reference implementations, [`SparseVoxelMap`] and
//! [`LandmarkMap`], bundled by [`FusedMap`], but any map satisfying the
//! contracts plugs into the node, scorer and matcher unchanged.

pub mod landmark;
pub mod voxel;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use nalgebra::Point3;

use crate::error::Result;
use crate::matching::FeatureMatch;

pub use landmark::{LandmarkMap, LandmarkMatcherConfig};
pub use voxel::{SparseVoxelMap, VoxelMapConfig};

/// Value snapshot of one initialized occupancy cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyCell {
    /// Cell center in the map's local frame.
    pub center: Point3<f64>,
    /// Occupancy rescaled to [0, 1]; exactly 0.5 means initialized but
    /// never observed.
    pub occupancy: f64,
}

/// Probabilistic occupancy map contract.
pub trait OccupancyMap {
    /// Persist the map at `path`; the map owns its file format.
    fn save(&self, path: &Path) -> Result<()>;

    /// Replace this map's content with the one stored at `path`.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Snapshot of every initialized cell.
    ///
    /// The returned vector owns its cells, so they are released when it is
    /// dropped, on every exit path of the caller.
    fn initialized_cells(&self) -> Vec<OccupancyCell>;

    /// Cell covering `point`, by spatial containment only.
    fn cell_at(&self, point: &Point3<f64>) -> Option<OccupancyCell>;
}

/// Feature map contract: correspondence-based matching against a peer.
pub trait FeatureMap {
    /// Match this map (reference) against `other` (moving), producing
    /// correspondences and an estimated relative transform that maps
    /// moving-map coordinates into this map's frame.
    fn match_against(&self, other: &Self) -> Result<FeatureMatch>;
}

/// A node-local map: occupancy grid plus feature map, persisted as a unit.
pub trait LocalMap {
    type Occupancy: OccupancyMap;
    type Features: FeatureMap;

    /// The occupancy half of the map.
    fn occupancy(&self) -> &Self::Occupancy;

    /// The feature half of the map.
    fn features(&self) -> &Self::Features;

    /// Persist the whole map at `path`; the map owns its file layout.
    fn save(&self, path: &Path) -> Result<()>;

    /// Replace this map's content with the one stored at `path`.
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// A concrete local map: sparse voxel occupancy plus a landmark feature map.
///
/// Persisted as two files: occupancy at the given path and landmarks at
/// `<path>.feat` alongside it.
#[derive(Debug, Clone, Default)]
pub struct FusedMap {
    occupancy: SparseVoxelMap,
    features: LandmarkMap,
}

impl FusedMap {
    pub fn new(occupancy: SparseVoxelMap, features: LandmarkMap) -> Self {
        Self {
            occupancy,
            features,
        }
    }

    /// Mutable access to the occupancy half, for map building.
    pub fn occupancy_mut(&mut self) -> &mut SparseVoxelMap {
        &mut self.occupancy
    }

    /// Mutable access to the feature half, for map building.
    pub fn features_mut(&mut self) -> &mut LandmarkMap {
        &mut self.features
    }

    fn features_path(path: &Path) -> PathBuf {
        let mut os: OsString = path.as_os_str().to_owned();
        os.push(".feat");
        PathBuf::from(os)
    }
}

impl LocalMap for FusedMap {
    type Occupancy = SparseVoxelMap;
    type Features = LandmarkMap;

    fn occupancy(&self) -> &SparseVoxelMap {
        &self.occupancy
    }

    fn features(&self) -> &LandmarkMap {
        &self.features
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.occupancy.save(path)?;
        self.features.save(&Self::features_path(path))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.occupancy.load(path)?;
        self.features.load(&Self::features_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fused_map_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map");

        let mut map = FusedMap::default();
        map.occupancy_mut()
            .observe(&Point3::new(0.1, 0.1, 0.1), true);
        map.features_mut().push(Point3::new(1.0, 2.0, 3.0));
        map.save(&path).unwrap();

        let mut loaded = FusedMap::default();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.occupancy().len(), 1);
        assert_eq!(loaded.features().len(), 1);
    }
}
