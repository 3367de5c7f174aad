//! Sources of raw sensor-frame scans.

use crate::ply::read_ply_file;
use crate::{Error, Result};
use sj_core::{PointCloud, RawPoint, RawScan};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A raw scan and the name used for its logs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub name: String,
    pub raw: RawScan,
}

/// Indexed access to the scans of one capture session.
pub trait ScanSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scan(&self, index: usize) -> Result<ScanRecord>;
}

/// Scans held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryScanSource {
    records: Vec<ScanRecord>,
}

impl MemoryScanSource {
    pub fn new(records: Vec<ScanRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, name: impl Into<String>, raw: RawScan) {
        self.records.push(ScanRecord {
            name: name.into(),
            raw,
        });
    }
}

impl ScanSource for MemoryScanSource {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn scan(&self, index: usize) -> Result<ScanRecord> {
        self.records.get(index).cloned().ok_or_else(|| {
            Error::InvalidInput(format!(
                "Scan index {} out of range ({} scans)",
                index,
                self.records.len()
            ))
        })
    }
}

/// Every `*.ply` file of a directory, in file-name order. Each file holds
/// one scan in the sensor frame.
#[derive(Debug, Clone)]
pub struct PlyScanDirectory {
    files: Vec<PathBuf>,
}

impl PlyScanDirectory {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::MissingFile(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_ply = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("ply"))
                .unwrap_or(false);
            if path.is_file() && is_ply {
                files.push(path);
            }
        }
        files.sort();
        debug!("Found {} scans in {}", files.len(), dir.display());

        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl ScanSource for PlyScanDirectory {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn scan(&self, index: usize) -> Result<ScanRecord> {
        let path = self.files.get(index).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Scan index {} out of range ({} scans)",
                index,
                self.files.len()
            ))
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("scan_{}", index));

        Ok(ScanRecord {
            name,
            raw: raw_scan_from_cloud(read_ply_file(path)?),
        })
    }
}

pub fn raw_scan_from_cloud(cloud: PointCloud) -> RawScan {
    RawScan::new(
        cloud
            .points
            .into_iter()
            .zip(cloud.colors)
            .map(|(position, color)| RawPoint { position, color })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ply::write_ply_file;
    use nalgebra::Point3;

    #[test]
    fn test_memory_source_bounds() {
        let mut source = MemoryScanSource::default();
        source.push("a", RawScan::default());
        assert_eq!(source.len(), 1);
        assert_eq!(source.scan(0).unwrap().name, "a");
        assert!(source.scan(1).is_err());
    }

    #[test]
    fn test_directory_lists_ply_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut cloud = PointCloud::new();
        cloud.push(Point3::new(1.0, 2.0, 3.0), [9, 8, 7]);
        write_ply_file(dir.path().join("b.ply"), &cloud).unwrap();
        write_ply_file(dir.path().join("a.ply"), &PointCloud::new()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = PlyScanDirectory::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);
        let first = source.scan(0).unwrap();
        assert_eq!(first.name, "a");
        assert!(first.raw.is_empty());
        let second = source.scan(1).unwrap();
        assert_eq!(second.name, "b");
        assert_eq!(second.raw.points[0].color, [9, 8, 7]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PlyScanDirectory::open(dir.path().join("nope")),
            Err(Error::MissingFile(_))
        ));
    }
}
