//! End-to-end tests for fusion node persistence and pairwise evaluation.

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Point3, Vector3};
use sangraha::{
    match_nodes, overlap_score, Covariance3, FusedMap, FusionNode, LandmarkMap, PointCloud3D,
    SparseVoxelMap, VoxelMapConfig,
};

fn sample_map() -> FusedMap {
    let mut occupancy = SparseVoxelMap::new(VoxelMapConfig {
        resolution: 0.5,
        ..VoxelMapConfig::default()
    });
    for i in 0..30 {
        let p = Point3::new(i as f64 * 0.5, 0.0, 0.0);
        occupancy.observe(&p, i % 3 == 0);
    }

    let mut features = LandmarkMap::default();
    features.push(Point3::new(0.0, 0.0, 0.0));
    features.push(Point3::new(2.0, 0.0, 0.0));
    features.push(Point3::new(0.0, 3.0, 0.5));
    features.push(Point3::new(-1.0, 1.0, 1.0));

    FusedMap::new(occupancy, features)
}

fn sample_node() -> FusionNode<FusedMap> {
    let mut node = FusionNode::with_map(sample_map());
    node.set_pose(Isometry3::new(
        Vector3::new(4.0, -2.0, 0.0),
        Vector3::new(0.0, 0.0, 0.8),
    ));
    node.set_covariance(Covariance3::identity() * 0.01);
    node.set_odometry_delta(Isometry3::new(
        Vector3::new(0.5, 0.02, 0.0),
        Vector3::new(0.0, 0.0, 0.05),
    ));
    node.set_fusion_delta(Isometry3::new(
        Vector3::new(0.48, 0.01, 0.0),
        Vector3::new(0.0, 0.0, 0.06),
    ));

    let mut cloud = PointCloud3D::new();
    for i in 0..50 {
        cloud.push(i as f32 * 0.1, (i as f32 * 0.1).sin(), 0.0);
    }
    node.accumulate_cloud(&Isometry3::identity(), &cloud);
    node
}

fn assert_isometry_eq(a: &Isometry3<f64>, b: &Isometry3<f64>) {
    assert_relative_eq!(
        a.translation.vector,
        b.translation.vector,
        epsilon = 1e-12
    );
    assert_relative_eq!(
        a.rotation.into_inner().coords,
        b.rotation.into_inner().coords,
        epsilon = 1e-12
    );
}

#[test]
fn node_save_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("node_000").to_string_lossy().into_owned();

    let node = sample_node();
    node.save(&prefix).unwrap();

    let mut loaded = FusionNode::with_map(FusedMap::default());
    loaded.load(&prefix).unwrap();

    assert_isometry_eq(loaded.pose(), node.pose());
    assert_isometry_eq(loaded.odometry_delta(), node.odometry_delta());
    assert_isometry_eq(loaded.fusion_delta(), node.fusion_delta());
    assert_eq!(loaded.local_cloud(), node.local_cloud());

    // The reloaded occupancy map reproduces the original cell contract.
    let score = overlap_score(&node, &loaded, &Isometry3::identity()).unwrap();
    assert_eq!(score, 0.0);
}

#[test]
fn load_without_cloud_is_lenient() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("node_001").to_string_lossy().into_owned();

    let node = sample_node();
    node.save(&prefix).unwrap();
    std::fs::remove_file(format!("{}.pcd", prefix)).unwrap();

    let mut loaded = FusionNode::with_map(FusedMap::default());
    loaded.load(&prefix).unwrap();
    assert!(loaded.local_cloud().is_empty());
    assert_isometry_eq(loaded.pose(), node.pose());
}

#[test]
fn load_with_corrupt_cloud_is_lenient() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("node_002").to_string_lossy().into_owned();

    sample_node().save(&prefix).unwrap();
    std::fs::write(format!("{}.pcd", prefix), b"definitely not a pcd\n").unwrap();

    let mut loaded = FusionNode::with_map(FusedMap::default());
    loaded.load(&prefix).unwrap();
    assert!(loaded.local_cloud().is_empty());
}

#[test]
fn load_with_missing_transform_fails() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("node_003").to_string_lossy().into_owned();

    sample_node().save(&prefix).unwrap();
    std::fs::remove_file(format!("{}local_fuse.T", prefix)).unwrap();

    let mut loaded = FusionNode::with_map(FusedMap::default());
    assert!(loaded.load(&prefix).is_err());
}

#[test]
fn matcher_feeds_overlap_scorer() {
    // Two nodes observing the same scene from offset local frames: the
    // feature matcher recovers the relative transform, and under that
    // hypothesis the occupancy maps agree. The offset stays inside the
    // matcher's correspondence gate and on the voxel grid.
    let offset = Isometry3::new(Vector3::new(0.4, -0.2, 0.0), Vector3::zeros());

    let mut reference_map = FusedMap::default();
    let mut moving_map = FusedMap::default();
    let landmarks = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(1.0, 1.0, 1.0),
    ];
    for lm in &landmarks {
        reference_map.features_mut().push(offset * lm);
        moving_map.features_mut().push(*lm);
        reference_map.occupancy_mut().observe(&(offset * lm), true);
        moving_map.occupancy_mut().observe(lm, true);
    }

    let reference = FusionNode::with_map(reference_map);
    let moving = FusionNode::with_map(moving_map);

    let matched = match_nodes(&reference, &moving).unwrap();
    assert!(matched.is_match());
    assert_relative_eq!(
        matched.transform.translation.vector,
        offset.translation.vector,
        epsilon = 1e-9
    );

    let score = overlap_score(&reference, &moving, &matched.transform).unwrap();
    assert_eq!(score, 0.0);
}
