//! Pose prior files.
//!
//! Layout (little-endian): an `i32` scan count, then for each scan nine
//! `f64` rotation entries in column-major order followed by three `f64`
//! translation entries.

use crate::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use sj_core::PosePrior;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const RECORD_BYTES: usize = 12 * 8;

fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

pub fn read_poses<R: Read>(mut reader: R) -> Result<Vec<PosePrior>> {
    let mut count_buf = [0u8; 4];
    reader
        .read_exact(&mut count_buf)
        .map_err(|_| Error::Parse("Pose file is missing its scan count".to_string()))?;
    let count = i32::from_le_bytes(count_buf);
    if count < 0 {
        return Err(Error::Parse(format!("Negative scan count {}", count)));
    }

    let mut poses = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let mut entries = [0.0f64; 12];
        for e in entries.iter_mut() {
            *e = read_f64(&mut reader).map_err(|_| {
                Error::Parse(format!(
                    "Pose file truncated in record {} of {} ({} bytes each)",
                    i, count, RECORD_BYTES
                ))
            })?;
        }
        let rotation = Matrix3::from_column_slice(&entries[..9]);
        let translation = Vector3::new(entries[9], entries[10], entries[11]);
        poses.push(PosePrior::new(rotation, translation));
    }

    Ok(poses)
}

pub fn write_poses<W: Write>(writer: &mut W, poses: &[PosePrior]) -> Result<()> {
    let count = i32::try_from(poses.len())
        .map_err(|_| Error::InvalidInput(format!("{} poses do not fit the count", poses.len())))?;
    writer.write_all(&count.to_le_bytes())?;
    for pose in poses {
        // nalgebra storage is column-major already
        for v in pose.rotation.iter().chain(pose.translation.iter()) {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn read_pose_file<P: AsRef<Path>>(path: P) -> Result<Vec<PosePrior>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    read_poses(BufReader::new(File::open(path)?))
}

pub fn write_pose_file<P: AsRef<Path>>(path: P, poses: &[PosePrior]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_poses(&mut writer, poses)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_column_major_layout() {
        let mut bytes = 1i32.to_le_bytes().to_vec();
        // Column-major: first column is (1, 4, 7).
        for v in [1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 9.0, 10.0, 11.0, 12.0f64] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let poses = read_poses(Cursor::new(bytes)).unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].rotation[(0, 1)], 2.0);
        assert_eq!(poses[0].rotation[(1, 0)], 4.0);
        assert_eq!(poses[0].translation, Vector3::new(10.0, 11.0, 12.0));
    }

    #[test]
    fn test_write_then_read() {
        let poses = vec![
            PosePrior::identity(),
            PosePrior::new(Matrix3::zeros(), Vector3::new(1.0, 2.0, 3.0)),
        ];
        let mut buf = Vec::new();
        write_poses(&mut buf, &poses).unwrap();
        assert_eq!(buf.len(), 4 + 2 * RECORD_BYTES);
        assert_eq!(read_poses(Cursor::new(buf)).unwrap(), poses);
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let mut buf = Vec::new();
        write_poses(&mut buf, &[PosePrior::identity()]).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(read_poses(Cursor::new(buf)), Err(Error::Parse(_))));
        assert!(read_poses(Cursor::new(Vec::new())).is_err());
    }
}
