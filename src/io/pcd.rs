//! Minimal ASCII PCD (v0.7) export/import for visualization clouds.
//!
//! Only the `x y z` float layout the node produces is supported. The header
//! is parsed leniently: entries we do not use (VIEWPOINT, HEIGHT, ...) are
//! accepted and ignored, but the file must declare `FIELDS x y z` and
//! `DATA ascii`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::PointCloud3D;
use crate::error::{Result, SangrahaError};

/// Export a cloud to `path` in ASCII PCD format.
pub fn save_pcd(cloud: &PointCloud3D, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let n = cloud.len();
    writeln!(writer, "# .PCD v0.7 - Point Cloud Data file format")?;
    writeln!(writer, "VERSION 0.7")?;
    writeln!(writer, "FIELDS x y z")?;
    writeln!(writer, "SIZE 4 4 4")?;
    writeln!(writer, "TYPE F F F")?;
    writeln!(writer, "COUNT 1 1 1")?;
    writeln!(writer, "WIDTH {}", n)?;
    writeln!(writer, "HEIGHT 1")?;
    writeln!(writer, "VIEWPOINT 0 0 0 1 0 0 0")?;
    writeln!(writer, "POINTS {}", n)?;
    writeln!(writer, "DATA ascii")?;
    for i in 0..n {
        writeln!(writer, "{} {} {}", cloud.xs[i], cloud.ys[i], cloud.zs[i])?;
    }
    writer.flush()?;
    Ok(())
}

/// Import a cloud from an ASCII PCD file at `path`.
pub fn load_pcd(path: &Path) -> Result<PointCloud3D> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut points: Option<usize> = None;
    let mut fields_ok = false;
    loop {
        let line = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(SangrahaError::InvalidFormat(
                    "PCD header ended before DATA".to_string(),
                ));
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("FIELDS") => {
                fields_ok = tokens.collect::<Vec<_>>() == ["x", "y", "z"];
            }
            Some("POINTS") => {
                points = tokens.next().and_then(|t| t.parse().ok());
            }
            Some("DATA") => {
                if tokens.next() != Some("ascii") {
                    return Err(SangrahaError::InvalidFormat(
                        "only ascii PCD data is supported".to_string(),
                    ));
                }
                break;
            }
            _ => {} // VERSION, SIZE, TYPE, COUNT, WIDTH, HEIGHT, VIEWPOINT
        }
    }

    if !fields_ok {
        return Err(SangrahaError::InvalidFormat(
            "PCD fields must be exactly x y z".to_string(),
        ));
    }
    let points = points
        .ok_or_else(|| SangrahaError::InvalidFormat("PCD header missing POINTS".to_string()))?;

    let mut cloud = PointCloud3D::with_capacity(points);
    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let mut coord = [0.0f32; 3];
        for value in coord.iter_mut() {
            *value = tokens
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| {
                    SangrahaError::InvalidFormat(format!("bad PCD point line: {}", line))
                })?;
        }
        cloud.push(coord[0], coord[1], coord[2]);
    }

    if cloud.len() != points {
        return Err(SangrahaError::InvalidFormat(format!(
            "PCD declared {} points but contained {}",
            points,
            cloud.len()
        )));
    }
    Ok(cloud)
}
