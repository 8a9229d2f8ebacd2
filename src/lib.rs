//! Sangraha - map-fusion node primitives for pose-graph SLAM
//!
//! Sangraha supplies the per-node state and the pairwise scoring/matching
//! primitives a pose-graph optimizer consumes. Each [`FusionNode`] owns a
//! local map (occupancy plus features), a global pose estimate with
//! covariance, the incremental odometry and fusion motion estimates between
//! successive local maps, and an accumulated point cloud for visualization.
//! Graph optimization itself is out of scope: an external optimizer reads
//! node state, evaluates candidate relative transforms with
//! [`overlap_score`] and [`match_nodes`], and writes optimized poses back
//! through [`FusionNode::set_pose`].
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Persistence
//! │           (transform files, PCD export)             │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │           node/    scoring/    matching/            │  ← Node state and
//! │      (fusion nodes, overlap score, matching)        │    pairwise ops
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      map/                           │  ← Local-map
//! │      (collaborator traits, voxel + landmark)        │    collaborators
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │              (transforms, point clouds)             │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Data flow
//!
//! An external caller constructs or loads one node per local map,
//! accumulates point clouds into nodes during mapping, then evaluates
//! candidate relative transforms between node pairs (loop-closure
//! hypotheses) with the overlap scorer and the feature matcher. Results
//! feed the external optimizer; optimized global poses come back through
//! the pose accessor.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use sangraha::{match_nodes, overlap_score, FusedMap, FusionNode};
//!
//! let node = FusionNode::with_map(FusedMap::default());
//! node.save("maps/node_000")?;
//!
//! let mut other = FusionNode::with_map(FusedMap::default());
//! other.load("maps/node_001")?;
//!
//! let hypothesis = match_nodes(&node, &other)?.transform;
//! let score = overlap_score(&node, &other, &hypothesis)?;
//! if score < 0.1 {
//!     // Feed the loop-closure constraint to the optimizer.
//! }
//! # Ok::<(), sangraha::SangrahaError>(())
//! ```
//!
//! # Concurrency
//!
//! Single-threaded by design: no internal locking, all operations are
//! synchronous. A node is not safe for concurrent mutation; callers that
//! share nodes between threads must serialize access.

// ============================================================================
// Layer 1: Foundation (no internal deps)
// ============================================================================
pub mod core;
pub mod error;

// ============================================================================
// Layer 2: Local-map collaborators (depends on core)
// ============================================================================
pub mod map;

// ============================================================================
// Layer 3: Nodes and pairwise operations (depends on core, map, io)
// ============================================================================
pub mod matching;
pub mod node;
pub mod scoring;

// ============================================================================
// Layer 4: Persistence (depends on core)
// ============================================================================
pub mod io;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Foundation
pub use crate::core::{project_to_plane, Covariance3, PointCloud3D};
pub use crate::error::{Result, SangrahaError};

// Local maps
pub use crate::map::{
    FeatureMap, FusedMap, LandmarkMap, LandmarkMatcherConfig, LocalMap, OccupancyCell,
    OccupancyMap, SparseVoxelMap, VoxelMapConfig,
};

// Nodes and pairwise operations
pub use crate::matching::{match_nodes, Correspondence, FeatureMatch};
pub use crate::node::FusionNode;
pub use crate::scoring::overlap_score;

// Persistence
pub use crate::io::{load_transform, save_transform};
