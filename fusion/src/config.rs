//! Run-wide configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use sj_core::{Error, Result};
use sj_registration::RegistrationParams;

use crate::accumulator::FusionParams;
use crate::cleanup::CleanupParams;
use crate::preprocess::PreprocessParams;

/// What to do when the output model already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Recompute and overwrite.
    Redo,
    /// Load the existing model instead of recomputing it.
    #[default]
    Resume,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// First scan index to fuse.
    pub start_index: usize,
    /// Number of scans to fuse; all remaining scans when absent.
    pub num_scans: Option<usize>,
    pub mode: RunMode,
    /// Attach a coarse copy of the model to the run report.
    pub preview: bool,
    pub preview_cell: f64,
    /// Worker threads for the per-point stages. `SCANJOIN_CPU_THREADS` or
    /// hardware concurrency when absent.
    pub threads: Option<usize>,
    pub transform_dir: PathBuf,
    pub model_path: PathBuf,
    pub preprocess: PreprocessParams,
    pub registration: RegistrationParams,
    pub fusion: FusionParams,
    pub cleanup: CleanupParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            num_scans: None,
            mode: RunMode::default(),
            preview: false,
            preview_cell: 0.05,
            threads: None,
            transform_dir: PathBuf::from("transformations"),
            model_path: PathBuf::from("output.ply"),
            preprocess: PreprocessParams::default(),
            registration: RegistrationParams::default(),
            fusion: FusionParams::default(),
            cleanup: CleanupParams::default(),
        }
    }
}

impl RunConfig {
    /// Load from JSON. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_scans == Some(0) {
            return Err(Error::InvalidConfig(
                "num_scans must be at least 1 when given".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidConfig(
                "threads must be at least 1 when given".to_string(),
            ));
        }
        if !(self.preview_cell > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "preview_cell must be positive, got {}",
                self.preview_cell
            )));
        }
        if !(0.0..=1.0).contains(&self.registration.overlap_ratio) {
            return Err(Error::InvalidConfig(format!(
                "overlap_ratio must lie in [0, 1], got {}",
                self.registration.overlap_ratio
            )));
        }
        self.preprocess.validate()?;
        self.registration.validate()?;
        self.fusion.validate()?;
        self.cleanup.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, RunMode::Resume);
        assert_eq!(config.preprocess.base_cell, 0.02);
        assert_eq!(config.fusion.point_budget, 100_000_000);
        assert_eq!(config.cleanup.neighbors, 50);
        assert_eq!(config.registration.max_rounds, 30);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{"start_index": 2, "num_scans": 3, "mode": "redo",
                "fusion": {"point_budget": 1000}, "registration": {"fitness_ceiling": 5.0}}"#,
        )
        .unwrap();

        let config = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(config.start_index, 2);
        assert_eq!(config.num_scans, Some(3));
        assert_eq!(config.threads, None);
        assert_eq!(config.mode, RunMode::Redo);
        assert_eq!(config.fusion.point_budget, 1000);
        assert_eq!(config.fusion.initial_scale, 0.02);
        assert_eq!(config.registration.fitness_ceiling, 5.0);
        assert_eq!(config.registration.inner_iterations, 2);
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let config = RunConfig {
            preview: true,
            ..RunConfig::default()
        };
        config.to_json_file(&path).unwrap();
        let loaded = RunConfig::from_json_file(&path).unwrap();
        assert!(loaded.preview);
        assert_eq!(loaded.preprocess, config.preprocess);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"fusion": {"point_budget": 0}}"#).unwrap();
        assert!(matches!(
            RunConfig::from_json_file(&path),
            Err(Error::InvalidConfig(_))
        ));

        fs::write(&path, r#"{"threads": 0}"#).unwrap();
        assert!(matches!(
            RunConfig::from_json_file(&path),
            Err(Error::InvalidConfig(_))
        ));

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(RunConfig::from_json_file(&path), Err(Error::Json(_))));

        assert!(matches!(
            RunConfig::from_json_file(dir.path().join("absent.json")),
            Err(Error::MissingFile(_))
        ));
    }
}
