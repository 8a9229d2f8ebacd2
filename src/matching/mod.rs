//! Feature-based node matching.
//!
//! [`match_nodes`] is a thin seam: it unwraps two nodes to their feature
//! maps and delegates to the feature map's own matching routine, so
//! graph-level callers never touch feature-map internals. The matching
//! algorithm itself lives with the feature map implementation.

use nalgebra::Isometry3;

use crate::error::Result;
use crate::map::{FeatureMap, LocalMap};
use crate::node::FusionNode;

/// One matched feature pair between two maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index of the feature in the reference map.
    pub reference: usize,
    /// Index of the feature in the moving map.
    pub moving: usize,
    /// Distance between the pair under the estimated transform (meters).
    pub distance: f64,
}

/// Result of matching two feature maps.
#[derive(Debug, Clone)]
pub struct FeatureMatch {
    /// Matched feature pairs.
    pub correspondences: Vec<Correspondence>,
    /// Estimated transform mapping moving-map coordinates into the
    /// reference frame.
    pub transform: Isometry3<f64>,
    /// Mean correspondence residual in meters; infinite when no transform
    /// could be estimated.
    pub score: f64,
}

impl FeatureMatch {
    /// Degraded result: no correspondences, identity transform, infinite
    /// score.
    pub fn no_match() -> Self {
        Self {
            correspondences: Vec::new(),
            transform: Isometry3::identity(),
            score: f64::INFINITY,
        }
    }

    /// Whether a transform estimate was produced.
    pub fn is_match(&self) -> bool {
        !self.correspondences.is_empty()
    }
}

/// Match two nodes using their feature maps.
///
/// Produces correspondences and an estimated relative transform taking
/// `moving`'s local frame into `reference`'s local frame. Requires both
/// nodes to have a map attached.
pub fn match_nodes<M: LocalMap>(
    reference: &FusionNode<M>,
    moving: &FusionNode<M>,
) -> Result<FeatureMatch> {
    reference.feature_map()?.match_against(moving.feature_map()?)
}
