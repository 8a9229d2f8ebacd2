//! Sparse voxel occupancy map.
//!
//! A minimal 3D occupancy map for fusion nodes. Voxels are created on first
//! touch and carry a clamped log-odds value; occupancy is reported through
//! the logistic function, so an initialized but never-observed voxel reports
//! exactly 0.5 — the sentinel the overlap scorer skips.
//!
//! # File format (`SGVOX`, version 1, little-endian)
//!
//! - Magic: `SGVOX` (5 bytes)
//! - Version: u8
//! - Resolution: f64
//! - Voxel count: u64
//! - Per voxel: key x,y,z as i32 each, log-odds as f64

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::{OccupancyCell, OccupancyMap};
use crate::error::{Result, SangrahaError};

const MAGIC: &[u8; 5] = b"SGVOX";
const VERSION: u8 = 1;

/// Configuration for [`SparseVoxelMap`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxelMapConfig {
    /// Voxel edge length in meters.
    pub resolution: f64,
    /// Log-odds increment for an occupied observation.
    pub hit_log_odds: f64,
    /// Log-odds decrement for a free observation.
    pub miss_log_odds: f64,
    /// Clamp for accumulated log-odds (applied symmetrically).
    pub max_log_odds: f64,
}

impl Default for VoxelMapConfig {
    fn default() -> Self {
        Self {
            resolution: 0.2,
            hit_log_odds: 0.85,
            miss_log_odds: 0.4,
            max_log_odds: 10.0,
        }
    }
}

/// Sparse log-odds occupancy map over cubic voxels.
#[derive(Debug, Clone, Default)]
pub struct SparseVoxelMap {
    config: VoxelMapConfig,
    /// Log-odds per initialized voxel, keyed by voxel index.
    voxels: HashMap<(i32, i32, i32), f64>,
}

impl SparseVoxelMap {
    pub fn new(config: VoxelMapConfig) -> Self {
        Self {
            config,
            voxels: HashMap::new(),
        }
    }

    /// Voxel edge length in meters.
    pub fn resolution(&self) -> f64 {
        self.config.resolution
    }

    /// Number of initialized voxels.
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Check if no voxel has been initialized.
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Initialize the voxel containing `point` without observing it.
    ///
    /// The voxel reports occupancy 0.5 until it receives an observation.
    pub fn touch(&mut self, point: &Point3<f64>) {
        let key = self.key(point);
        self.voxels.entry(key).or_insert(0.0);
    }

    /// Update the voxel containing `point` with one observation.
    pub fn observe(&mut self, point: &Point3<f64>, occupied: bool) {
        let delta = if occupied {
            self.config.hit_log_odds
        } else {
            -self.config.miss_log_odds
        };
        let max = self.config.max_log_odds;
        let key = self.key(point);
        let log_odds = self.voxels.entry(key).or_insert(0.0);
        *log_odds = (*log_odds + delta).clamp(-max, max);
    }

    /// Set the voxel containing `point` to an exact occupancy probability.
    ///
    /// Initializes the voxel if needed. `occupancy` is clamped away from 0
    /// and 1 by the log-odds clamp.
    pub fn set_occupancy(&mut self, point: &Point3<f64>, occupancy: f64) {
        let max = self.config.max_log_odds;
        let log_odds = (occupancy / (1.0 - occupancy)).ln().clamp(-max, max);
        let key = self.key(point);
        self.voxels.insert(key, log_odds);
    }

    fn key(&self, point: &Point3<f64>) -> (i32, i32, i32) {
        let r = self.config.resolution;
        (
            (point.x / r).floor() as i32,
            (point.y / r).floor() as i32,
            (point.z / r).floor() as i32,
        )
    }

    fn center(&self, key: (i32, i32, i32)) -> Point3<f64> {
        let r = self.config.resolution;
        Point3::new(
            (key.0 as f64 + 0.5) * r,
            (key.1 as f64 + 0.5) * r,
            (key.2 as f64 + 0.5) * r,
        )
    }
}

/// Logistic conversion; exactly 0.5 at log-odds 0.
fn occupancy_from_log_odds(log_odds: f64) -> f64 {
    1.0 / (1.0 + (-log_odds).exp())
}

impl OccupancyMap for SparseVoxelMap {
    fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&[VERSION])?;
        writer.write_all(&self.config.resolution.to_le_bytes())?;
        writer.write_all(&(self.voxels.len() as u64).to_le_bytes())?;
        for (key, log_odds) in &self.voxels {
            writer.write_all(&key.0.to_le_bytes())?;
            writer.write_all(&key.1.to_le_bytes())?;
            writer.write_all(&key.2.to_le_bytes())?;
            writer.write_all(&log_odds.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SangrahaError::InvalidFormat(
                "not a SGVOX map file".to_string(),
            ));
        }
        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != VERSION {
            return Err(SangrahaError::VersionMismatch {
                expected: VERSION,
                found: version[0],
            });
        }

        let mut f64_buf = [0u8; 8];
        reader.read_exact(&mut f64_buf)?;
        let resolution = f64::from_le_bytes(f64_buf);
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(SangrahaError::InvalidFormat(format!(
                "bad voxel resolution: {}",
                resolution
            )));
        }

        reader.read_exact(&mut f64_buf)?;
        let count = u64::from_le_bytes(f64_buf) as usize;

        let mut voxels = HashMap::with_capacity(count);
        let mut i32_buf = [0u8; 4];
        for _ in 0..count {
            let mut key = [0i32; 3];
            for k in key.iter_mut() {
                reader.read_exact(&mut i32_buf)?;
                *k = i32::from_le_bytes(i32_buf);
            }
            reader.read_exact(&mut f64_buf)?;
            voxels.insert((key[0], key[1], key[2]), f64::from_le_bytes(f64_buf));
        }

        self.config.resolution = resolution;
        self.voxels = voxels;
        log::debug!("Loaded voxel map with {} cells", count);
        Ok(())
    }

    fn initialized_cells(&self) -> Vec<OccupancyCell> {
        self.voxels
            .iter()
            .map(|(&key, &log_odds)| OccupancyCell {
                center: self.center(key),
                occupancy: occupancy_from_log_odds(log_odds),
            })
            .collect()
    }

    fn cell_at(&self, point: &Point3<f64>) -> Option<OccupancyCell> {
        let key = self.key(point);
        self.voxels.get(&key).map(|&log_odds| OccupancyCell {
            center: self.center(key),
            occupancy: occupancy_from_log_odds(log_odds),
        })
    }
}
