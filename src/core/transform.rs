//! Rigid 3D transform helpers.
//!
//! Poses and incremental motion estimates are [`nalgebra::Isometry3`]: a
//! unit quaternion rotation plus a translation, so the rotation part stays
//! orthonormal by construction. This module adds the plane projection used
//! when the system is constrained to 2D operation.

use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion};

/// 3x3 covariance of a planar pose estimate (x, y, yaw).
pub type Covariance3 = Matrix3<f64>;

/// Project a rigid transform onto the z = 0 plane.
///
/// The out-of-plane translation is zeroed and the rotation is collapsed to
/// its yaw component, so the result moves points within the plane only while
/// remaining a rigid transform. Projecting twice yields the same transform
/// as projecting once.
pub fn project_to_plane(transform: &Isometry3<f64>) -> Isometry3<f64> {
    let (_, _, yaw) = transform.rotation.euler_angles();
    Isometry3::from_parts(
        Translation3::new(transform.translation.x, transform.translation.y, 0.0),
        UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
    )
}
