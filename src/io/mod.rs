//! Persistence: transform files and point cloud export.

pub mod pcd;
pub mod transform_file;

pub use transform_file::{load_transform, save_transform};
