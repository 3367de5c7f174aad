//! Human-readable record of the transforms applied to each scan.

use crate::Result;
use sj_core::RigidTransform;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CUMULATIVE_LOG: &str = "all_transformations.txt";

/// Writes `<dir>/<name>_trans.txt` per scan and appends every entry to
/// `<dir>/all_transformations.txt`.
#[derive(Debug, Clone)]
pub struct TransformLog {
    dir: PathBuf,
}

fn write_matrix<W: Write>(writer: &mut W, m: &RigidTransform) -> std::io::Result<()> {
    for r in 0..4 {
        let row: Vec<String> = (0..4).map(|c| format!("{}", m[(r, c)])).collect();
        writeln!(writer, "{}", row.join(" "))?;
    }
    Ok(())
}

fn write_entry<W: Write>(
    writer: &mut W,
    name: &str,
    before: &RigidTransform,
    after: &RigidTransform,
) -> std::io::Result<()> {
    writeln!(writer, "{}", name)?;
    writeln!(writer, "Before registration:")?;
    write_matrix(writer, before)?;
    writeln!(writer, "After registration:")?;
    write_matrix(writer, after)?;
    writeln!(writer)
}

impl TransformLog {
    /// Create the log directory if needed.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scan_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_trans.txt", name))
    }

    pub fn cumulative_path(&self) -> PathBuf {
        self.dir.join(CUMULATIVE_LOG)
    }

    /// Truncate the cumulative log for a fresh run.
    pub fn reset(&self) -> Result<()> {
        File::create(self.cumulative_path())?;
        Ok(())
    }

    pub fn record(&self, name: &str, before: &RigidTransform, after: &RigidTransform) -> Result<()> {
        let mut scan = BufWriter::new(File::create(self.scan_path(name))?);
        write_entry(&mut scan, name, before, after)?;
        scan.flush()?;

        let mut all = self.append_cumulative()?;
        write_entry(&mut all, name, before, after)?;
        all.flush()?;
        Ok(())
    }

    /// Note a scan that was left out of the model, so the cumulative log
    /// still lists every scan of the run. No per-scan file is written.
    pub fn record_skipped(&self, name: &str, reason: &str) -> Result<()> {
        let mut all = self.append_cumulative()?;
        writeln!(all, "{}", name)?;
        writeln!(all, "Skipped: {}", reason)?;
        writeln!(all)?;
        all.flush()?;
        Ok(())
    }

    fn append_cumulative(&self) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.cumulative_path())?;
        Ok(BufWriter::new(file))
    }
}
