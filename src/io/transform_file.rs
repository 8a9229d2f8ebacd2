//! Versioned text format for rigid transform persistence.
//!
//! Format (one transform per file):
//! - Line 1: magic and version: `SGT 1`
//! - Line 2: translation `tx ty tz`
//! - Line 3: rotation as a unit quaternion `qw qx qy qz`
//!
//! Values use Rust's shortest round-trip float formatting, so a save/load
//! cycle reproduces the transform up to quaternion renormalization. The
//! schema is deliberately explicit so the files stay readable across
//! implementations in other languages.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};

use crate::error::{Result, SangrahaError};

const MAGIC: &str = "SGT";
const VERSION: u8 = 1;

/// Serialize a rigid transform to `path`.
pub fn save_transform(transform: &Isometry3<f64>, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{} {}", MAGIC, VERSION)?;
    let t = &transform.translation;
    writeln!(writer, "{} {} {}", t.x, t.y, t.z)?;
    let q = transform.rotation.quaternion();
    writeln!(writer, "{} {} {} {}", q.w, q.i, q.j, q.k)?;
    writer.flush()?;
    Ok(())
}

/// Deserialize a rigid transform from `path`.
///
/// Fails if the file cannot be opened, the magic or version does not match,
/// or the payload does not parse as a valid transform.
pub fn load_transform(path: &Path) -> Result<Isometry3<f64>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let header = next_line(&mut lines)?;
    let mut fields = header.split_whitespace();
    if fields.next() != Some(MAGIC) {
        return Err(SangrahaError::InvalidFormat(
            "missing SGT magic".to_string(),
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

    let t = parse_floats::<3>(&next_line(&mut lines)?)?;
    let q = parse_floats::<4>(&next_line(&mut lines)?)?;

    let quaternion = Quaternion::new(q[0], q[1], q[2], q[3]);
    if !(quaternion.norm() > 0.0 && quaternion.norm().is_finite()) {
        return Err(SangrahaError::InvalidFormat(
            "rotation quaternion is not normalizable".to_string(),
        ));
    }

    Ok(Isometry3::from_parts(
        Translation3::new(t[0], t[1], t[2]),
        UnitQuaternion::from_quaternion(quaternion),
    ))
}

fn next_line(lines: &mut impl Iterator<Item = std::io::Result<String>>) -> Result<String> {
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(SangrahaError::InvalidFormat(
            "unexpected end of file".to_string(),
        )),
    }
}

fn parse_floats<const N: usize>(line: &str) -> Result<[f64; N]> {
    let mut out = [0.0; N];
    let mut fields = line.split_whitespace();
    for value in out.iter_mut() {
        *value = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| {
                SangrahaError::InvalidFormat(format!("expected {} floats in line: {}", N, line))
            })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::io::Write as _;

    #[test]
    fn test_transform_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pose.T");

        let t = Isometry3::new(Vector3::new(1.25, -3.5, 0.75), Vector3::new(0.2, -0.4, 1.1));
        save_transform(&t, &path).unwrap();
        let loaded = load_transform(&path).unwrap();

        assert_relative_eq!(
            t.translation.vector,
            loaded.translation.vector,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            t.rotation.into_inner().coords,
            loaded.rotation.into_inner().coords,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_identity_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.T");
        save_transform(&Isometry3::identity(), &path).unwrap();
        let loaded = load_transform(&path).unwrap();
        assert_eq!(loaded, Isometry3::identity());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_transform(&dir.path().join("absent.T"));
        assert!(matches!(result, Err(SangrahaError::Io(_))));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.T");
        std::fs::write(&path, "NOPE 1\n0 0 0\n1 0 0 0\n").unwrap();
        assert!(matches!(
            load_transform(&path),
            Err(SangrahaError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.T");
        std::fs::write(&path, "SGT 9\n0 0 0\n1 0 0 0\n").unwrap();
        assert!(matches!(
            load_transform(&path),
            Err(SangrahaError::VersionMismatch {
                expected: 1,
                found: 9
            })
        ));
    }

    #[test]
    fn test_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.T");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "SGT 1").unwrap();
        writeln!(file, "1 2 3").unwrap();
        assert!(matches!(
            load_transform(&path),
            Err(SangrahaError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_degenerate_rotation_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.T");
        std::fs::write(&path, "SGT 1\n0 0 0\n0 0 0 0\n").unwrap();
        assert!(matches!(
            load_transform(&path),
            Err(SangrahaError::InvalidFormat(_))
        ));
    }
}
