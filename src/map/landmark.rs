//! Landmark feature map and correspondence-based matching.
//!
//! A [`LandmarkMap`] is a sparse set of 3D landmark points extracted from a
//! local map. Matching associates landmarks by gated nearest neighbour using
//! a k-d tree, estimates the rigid transform with the closed-form SVD
//! (Kabsch) solution, and re-associates for a few passes so the estimate can
//! pull in pairs the initial association missed.
//!
//! # File format
//!
//! Text, one landmark per line: header `SGL 1`, a count line, then
//! `x y z` lines.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::FeatureMap;
use crate::error::{Result, SangrahaError};
use crate::matching::{Correspondence, FeatureMatch};

const MAGIC: &str = "SGL";
const VERSION: u8 = 1;

/// Configuration for landmark matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkMatcherConfig {
    /// Maximum correspondence distance (meters).
    ///
    /// Landmark pairs farther apart than this are rejected as outliers.
    pub max_correspondence_distance: f64,

    /// Minimum number of correspondences required for a transform estimate.
    pub min_correspondences: usize,

    /// Association passes; each pass re-associates under the latest
    /// transform estimate.
    pub iterations: u32,
}

impl Default for LandmarkMatcherConfig {
    fn default() -> Self {
        Self {
            max_correspondence_distance: 1.0,
            min_correspondences: 3,
            iterations: 5,
        }
    }
}

/// Sparse set of 3D landmarks associated with a local map.
#[derive(Debug, Clone, Default)]
pub struct LandmarkMap {
    landmarks: Vec<Point3<f64>>,
    config: LandmarkMatcherConfig,
}

impl LandmarkMap {
    pub fn new(config: LandmarkMatcherConfig) -> Self {
        Self {
            landmarks: Vec::new(),
            config,
        }
    }

    /// Add a landmark in the map's local frame.
    pub fn push(&mut self, landmark: Point3<f64>) {
        self.landmarks.push(landmark);
    }

    /// All landmarks, in insertion order.
    pub fn landmarks(&self) -> &[Point3<f64>] {
        &self.landmarks
    }

    /// Number of landmarks.
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// Check if the map holds no landmarks.
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Persist the landmarks at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{} {}", MAGIC, VERSION)?;
        writeln!(writer, "{}", self.landmarks.len())?;
        for lm in &self.landmarks {
            writeln!(writer, "{} {} {}", lm.x, lm.y, lm.z)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Replace this map's landmarks with the ones stored at `path`.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(SangrahaError::InvalidFormat("empty file".to_string())),
        };
        let mut fields = header.split_whitespace();
        if fields.next() != Some(MAGIC) {
            return Err(SangrahaError::InvalidFormat(
                "missing SGL magic".to_string(),
            ));
        }
        let version: u8 = fields
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| SangrahaError::InvalidFormat("missing version".to_string()))?;
        if version != VERSION {
            return Err(SangrahaError::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let count: usize = lines
            .next()
            .transpose()?
            .and_then(|line| line.trim().parse().ok())
            .ok_or_else(|| SangrahaError::InvalidFormat("missing landmark count".to_string()))?;

        let mut landmarks = Vec::with_capacity(count);
        for line in lines.take(count) {
            let line = line?;
            let mut fields = line.split_whitespace();
            let mut coord = [0.0f64; 3];
            for value in coord.iter_mut() {
                *value = fields
                    .next()
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| {
                        SangrahaError::InvalidFormat(format!("bad landmark line: {}", line))
                    })?;
            }
            landmarks.push(Point3::new(coord[0], coord[1], coord[2]));
        }
        if landmarks.len() != count {
            return Err(SangrahaError::InvalidFormat(format!(
                "declared {} landmarks but found {}",
                count,
                landmarks.len()
            )));
        }

        self.landmarks = landmarks;
        Ok(())
    }
}

impl FeatureMap for LandmarkMap {
    fn match_against(&self, other: &Self) -> Result<FeatureMatch> {
        let config = &self.config;
        if self.landmarks.is_empty()
            || other.landmarks.is_empty()
            || self.landmarks.len() < config.min_correspondences
            || other.landmarks.len() < config.min_correspondences
        {
            return Ok(FeatureMatch::no_match());
        }

        let mut tree: KdTree<f64, 3> = KdTree::new();
        for (i, lm) in self.landmarks.iter().enumerate() {
            tree.add(&[lm.x, lm.y, lm.z], i as u64);
        }

        let max_dist_sq = config.max_correspondence_distance.powi(2);
        let mut transform = Isometry3::identity();
        let mut correspondences = Vec::new();

        for _ in 0..config.iterations.max(1) {
            correspondences.clear();
            for (j, lm) in other.landmarks.iter().enumerate() {
                let moved = transform * lm;
                let nearest = tree.nearest_one::<SquaredEuclidean>(&[moved.x, moved.y, moved.z]);
                if nearest.distance <= max_dist_sq {
                    correspondences.push(Correspondence {
                        reference: nearest.item as usize,
                        moving: j,
                        distance: nearest.distance.sqrt(),
                    });
                }
            }
            if correspondences.len() < config.min_correspondences {
                return Ok(FeatureMatch::no_match());
            }
            transform = estimate_transform(&self.landmarks, &other.landmarks, &correspondences);
        }

        // Residuals under the final estimate.
        let mut residual_sum = 0.0;
        for c in &mut correspondences {
            let moved = transform * other.landmarks[c.moving];
            c.distance = (moved - self.landmarks[c.reference]).norm();
            residual_sum += c.distance;
        }
        let score = residual_sum / correspondences.len() as f64;

        log::debug!(
            "Landmark match: {} correspondences, mean residual {:.4} m",
            correspondences.len(),
            score
        );
        Ok(FeatureMatch {
            correspondences,
            transform,
            score,
        })
    }
}

/// Closed-form rigid transform from matched pairs (Kabsch).
///
/// Returns the transform T minimizing sum |T * moving - reference|^2 over
/// the given pairs.
fn estimate_transform(
    reference: &[Point3<f64>],
    moving: &[Point3<f64>],
    pairs: &[Correspondence],
) -> Isometry3<f64> {
    let n = pairs.len() as f64;

    let mut ref_centroid = Vector3::zeros();
    let mut mov_centroid = Vector3::zeros();
    for c in pairs {
        ref_centroid += reference[c.reference].coords;
        mov_centroid += moving[c.moving].coords;
    }
    ref_centroid /= n;
    mov_centroid /= n;

    // Cross-covariance H = sum (m - mc)(r - rc)^T
    let mut h = Matrix3::zeros();
    for c in pairs {
        let r = reference[c.reference].coords - ref_centroid;
        let m = moving[c.moving].coords - mov_centroid;
        h += m * r.transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u.expect("SVD with compute_u");
    let v_t = svd.v_t.expect("SVD with compute_v");

    // Reflection guard: force a proper rotation.
    let d = (v_t.transpose() * u.transpose()).determinant().signum();
    let mut correction = Matrix3::identity();
    correction[(2, 2)] = d;
    let rotation_matrix = v_t.transpose() * correction * u.transpose();

    let rotation =
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));
    let translation = ref_centroid - rotation * mov_centroid;
    Isometry3::from_parts(Translation3::from(translation), rotation)
}
