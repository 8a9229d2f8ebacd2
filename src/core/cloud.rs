//! Point cloud storage for node visualization clouds.

use nalgebra::{Isometry3, Point3};
use serde::{Deserialize, Serialize};

/// Collection of 3D points using Struct of Arrays (SoA) layout.
///
/// Instead of `Vec<Point3>` (x,y,z,x,y,z...), stores separate coordinate
/// vectors. The layout is cache friendly for the bulk transform and export
/// operations this crate performs; points are `f32` since the cloud is
/// visualization data, while transforms stay `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PointCloud3D {
    /// X coordinates in meters (SoA layout)
    pub xs: Vec<f32>,
    /// Y coordinates in meters (SoA layout)
    pub ys: Vec<f32>,
    /// Z coordinates in meters (SoA layout)
    pub zs: Vec<f32>,
}

impl PointCloud3D {
    /// Create an empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            zs: Vec::with_capacity(capacity),
        }
    }

    /// Create a cloud from a point slice.
    pub fn from_points(points: &[Point3<f32>]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push(p.x, p.y, p.z);
        }
        cloud
    }

    /// Append a single point.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        self.xs.push(x);
        self.ys.push(y);
        self.zs.push(z);
    }

    /// Append all points of `other`, preserving insertion order.
    pub fn extend(&mut self, other: &PointCloud3D) {
        self.xs.extend_from_slice(&other.xs);
        self.ys.extend_from_slice(&other.ys);
        self.zs.extend_from_slice(&other.zs);
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Iterate over points.
    pub fn iter(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        (0..self.len()).map(|i| Point3::new(self.xs[i], self.ys[i], self.zs[i]))
    }

    /// Return a new cloud with every point transformed by `transform`.
    pub fn transform(&self, transform: &Isometry3<f64>) -> PointCloud3D {
        let mut result = PointCloud3D::with_capacity(self.len());
        for i in 0..self.len() {
            let p = transform
                * Point3::new(self.xs[i] as f64, self.ys[i] as f64, self.zs[i] as f64);
            result.push(p.x as f32, p.y as f32, p.z as f32);
        }
        result
    }

    /// Remove all points.
    pub fn clear(&mut self) {
        self.xs.clear();
        self.ys.clear();
        self.zs.clear();
    }
}
