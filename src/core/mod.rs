//! Foundation types: rigid transforms and point clouds.

pub mod cloud;
pub mod transform;

pub use cloud::PointCloud3D;
pub use transform::{project_to_plane, Covariance3};
