//! Fusion nodes: one local map plus its pose estimate in a pose graph.
//!
//! A [`FusionNode`] ties together a local map (occupancy plus features), a
//! global pose estimate with covariance, and the incremental motion
//! estimates between successive local maps. An external pose-graph
//! optimizer consumes the per-node state together with the pairwise
//! primitives in [`crate::scoring`] and [`crate::matching`], and writes
//! optimized poses back through [`FusionNode::set_pose`].
//!
//! Nodes are not safe for concurrent mutation; callers that share a node
//! between an optimizer and a mapping thread must serialize access.

use std::path::{Path, PathBuf};

use nalgebra::Isometry3;

use crate::core::transform::{project_to_plane, Covariance3};
use crate::core::PointCloud3D;
use crate::error::{Result, SangrahaError};
use crate::io::{pcd, transform_file};
use crate::map::LocalMap;

/// One node of a map-fusion pose graph.
///
/// Created with identity transforms and no backing map; a map is attached
/// before any map-dependent operation. The accumulated point cloud is
/// visualization data only and is persisted best effort.
#[derive(Debug)]
pub struct FusionNode<M: LocalMap> {
    /// Local map, attached before map-dependent use.
    map: Option<M>,

    /// Rigid transform from node-local to global coordinates.
    ///
    /// Written back by pose-graph optimization.
    global_pose: Isometry3<f64>,

    /// 3x3 uncertainty of the global pose estimate.
    covariance: Covariance3,

    /// Incremental motion from the previous node's local frame, from
    /// odometry alone.
    odometry_delta: Isometry3<f64>,

    /// Incremental motion between successive local maps as produced by the
    /// fusion process; may differ from odometry due to scan registration.
    fusion_delta: Isometry3<f64>,

    /// Accumulated point cloud in the node's local frame.
    cloud: PointCloud3D,

    /// Number of fusion updates applied to this node.
    update_count: u32,
}

impl<M: LocalMap> Default for FusionNode<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: LocalMap> FusionNode<M> {
    /// Create a node with identity transforms and no backing map.
    pub fn new() -> Self {
        Self {
            map: None,
            global_pose: Isometry3::identity(),
            covariance: Covariance3::zeros(),
            odometry_delta: Isometry3::identity(),
            fusion_delta: Isometry3::identity(),
            cloud: PointCloud3D::new(),
            update_count: 0,
        }
    }

    /// Create a node with a map already attached.
    pub fn with_map(map: M) -> Self {
        let mut node = Self::new();
        node.map = Some(map);
        node
    }

    /// Attach (or replace) the local map.
    pub fn attach_map(&mut self, map: M) {
        self.map = Some(map);
    }

    /// The local map, if attached.
    pub fn map(&self) -> Result<&M> {
        self.map.as_ref().ok_or(SangrahaError::MapNotAttached)
    }

    /// Mutable access to the local map, if attached.
    pub fn map_mut(&mut self) -> Result<&mut M> {
        self.map.as_mut().ok_or(SangrahaError::MapNotAttached)
    }

    /// The occupancy half of the attached map.
    pub fn occupancy_map(&self) -> Result<&M::Occupancy> {
        Ok(self.map()?.occupancy())
    }

    /// The feature half of the attached map.
    pub fn feature_map(&self) -> Result<&M::Features> {
        Ok(self.map()?.features())
    }

    /// Global pose estimate.
    pub fn pose(&self) -> &Isometry3<f64> {
        &self.global_pose
    }

    /// Set the global pose estimate (e.g. after graph optimization).
    pub fn set_pose(&mut self, pose: Isometry3<f64>) {
        self.global_pose = pose;
    }

    /// Pose covariance.
    pub fn covariance(&self) -> &Covariance3 {
        &self.covariance
    }

    /// Set the pose covariance.
    pub fn set_covariance(&mut self, covariance: Covariance3) {
        self.covariance = covariance;
    }

    /// Odometry-only incremental motion estimate.
    pub fn odometry_delta(&self) -> &Isometry3<f64> {
        &self.odometry_delta
    }

    /// Set the odometry-only incremental motion estimate.
    pub fn set_odometry_delta(&mut self, delta: Isometry3<f64>) {
        self.odometry_delta = delta;
    }

    /// Fusion incremental motion estimate.
    pub fn fusion_delta(&self) -> &Isometry3<f64> {
        &self.fusion_delta
    }

    /// Set the fusion incremental motion estimate.
    pub fn set_fusion_delta(&mut self, delta: Isometry3<f64>) {
        self.fusion_delta = delta;
    }

    /// Number of fusion updates applied to this node.
    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    /// Record one fusion update (bookkeeping only).
    pub fn record_update(&mut self) {
        self.update_count += 1;
    }

    /// Transform `cloud` by `delta` and append it to the local cloud.
    ///
    /// This is the only mutator of the accumulated cloud; points are kept
    /// in insertion order and never deduplicated.
    pub fn accumulate_cloud(&mut self, delta: &Isometry3<f64>, cloud: &PointCloud3D) {
        self.cloud.extend(&cloud.transform(delta));
    }

    /// The accumulated cloud in the node's local frame.
    pub fn local_cloud(&self) -> &PointCloud3D {
        &self.cloud
    }

    /// The accumulated cloud projected into the global frame.
    ///
    /// Applies whatever `pose()` holds at call time; callers must re-fetch
    /// after pose updates. The local cloud is not mutated.
    pub fn global_cloud(&self) -> PointCloud3D {
        self.cloud.transform(&self.global_pose)
    }

    /// Project the global pose and both incremental deltas onto the plane.
    ///
    /// Used when the system is constrained to 2D operation. Idempotent.
    pub fn force_2d(&mut self) {
        self.global_pose = project_to_plane(&self.global_pose);
        self.odometry_delta = project_to_plane(&self.odometry_delta);
        self.fusion_delta = project_to_plane(&self.fusion_delta);
    }

    /// Persist the node under `prefix`.
    ///
    /// Writes, in order: the map at `<prefix>` (its own format), the global
    /// pose at `<prefix>.T`, the odometry delta at `<prefix>local_odom.T`
    /// and the fusion delta at `<prefix>local_fuse.T`, failing fast on the
    /// first error. The point cloud goes to `<prefix>.pcd` best effort when
    /// non-empty; a cloud export failure is logged, not fatal.
    pub fn save(&self, prefix: &str) -> Result<()> {
        let map = self.map.as_ref().ok_or(SangrahaError::MapNotAttached)?;
        map.save(Path::new(prefix))?;
        transform_file::save_transform(&self.global_pose, &pose_path(prefix))?;
        transform_file::save_transform(&self.odometry_delta, &odometry_path(prefix))?;
        transform_file::save_transform(&self.fusion_delta, &fusion_path(prefix))?;

        if !self.cloud.is_empty() {
            if let Err(e) = pcd::save_pcd(&self.cloud, &cloud_path(prefix)) {
                log::warn!("Point cloud export to {}.pcd failed: {}", prefix, e);
            }
        }
        log::info!("Saved fusion node at prefix {}", prefix);
        Ok(())
    }

    /// Load the node from `prefix`, the inverse of [`FusionNode::save`].
    ///
    /// Map and transform load failures abort the load. A missing or corrupt
    /// `.pcd` is tolerated and leaves the cloud empty: the cloud is
    /// visualization data, so its absence is a degraded condition, not an
    /// error.
    pub fn load(&mut self, prefix: &str) -> Result<()> {
        let map = self.map.as_mut().ok_or(SangrahaError::MapNotAttached)?;
        map.load(Path::new(prefix))?;
        self.global_pose = transform_file::load_transform(&pose_path(prefix))?;
        self.odometry_delta = transform_file::load_transform(&odometry_path(prefix))?;
        self.fusion_delta = transform_file::load_transform(&fusion_path(prefix))?;

        self.cloud = match pcd::load_pcd(&cloud_path(prefix)) {
            Ok(cloud) => cloud,
            Err(e) => {
                log::debug!("No point cloud at {}.pcd: {}", prefix, e);
                PointCloud3D::new()
            }
        };
        log::info!("Loaded fusion node from prefix {}", prefix);
        Ok(())
    }
}

fn pose_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}.T", prefix))
}

fn odometry_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}local_odom.T", prefix))
}

fn fusion_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}local_fuse.T", prefix))
}

fn cloud_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}.pcd", prefix))
}
