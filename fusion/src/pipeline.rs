//! Scan-by-scan registration and fusion run.

use std::fs;

use tracing::{info, warn};

use sj_core::runtime::{current_cpu_threads, init_global_thread_pool};
use sj_core::{Error, PointCloud, PosePrior, Result, RigidTransform};
use sj_io::{read_ply_file, write_ply_file, ScanSource, TransformLog};
use sj_point_cloud::uniform_down_sample;
use sj_registration::{RegistrationEngine, SessionState};

use crate::accumulator::FusionAccumulator;
use crate::cleanup::CleanupFilter;
use crate::config::{RunConfig, RunMode};
use crate::preprocess::FramePreprocessor;

/// What happened to one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanDisposition {
    /// First scan of the run; fused without registration.
    Seeded,
    /// Registered against the model, then fused.
    Registered(SessionState),
    /// The pose prior marks the scan as unplaced.
    Unplaced,
    /// Too few points survived preprocessing.
    Degenerate,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub index: usize,
    pub name: String,
    pub disposition: ScanDisposition,
    pub rounds: usize,
    pub fitness: Option<f64>,
    pub initial_transform: Option<RigidTransform>,
    pub final_transform: Option<RigidTransform>,
    pub model_points: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// The model came from `model_path` rather than from the scans.
    pub resumed: bool,
    pub scans: Vec<ScanReport>,
    pub final_scale: Option<f64>,
    pub model_points: usize,
    pub preview: Option<PointCloud>,
    /// Size of the worker pool the run executed on.
    pub worker_threads: usize,
}

impl RunReport {
    pub fn count(&self, disposition: ScanDisposition) -> usize {
        self.scans
            .iter()
            .filter(|s| s.disposition == disposition)
            .count()
    }
}

/// Drives preprocessing, registration, fusion and cleanup over a range of
/// scans.
pub struct Joiner {
    config: RunConfig,
    preprocessor: FramePreprocessor,
    engine: RegistrationEngine,
    cleanup: CleanupFilter,
}

impl Joiner {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        if let Some(threads) = config.threads {
            match init_global_thread_pool(Some(threads)) {
                Ok(workers) => info!("Worker pool sized to {} threads", workers),
                Err(e) => warn!(
                    "Worker pool not resized ({}), running on {} threads",
                    e,
                    current_cpu_threads()
                ),
            }
        }
        Ok(Self {
            preprocessor: FramePreprocessor::new(config.preprocess.clone())?,
            engine: RegistrationEngine::new(config.registration.clone())?,
            cleanup: CleanupFilter::new(config.cleanup.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Scans `start..end` of the run. The end is clamped to the scans that
    /// have both a record and a pose prior.
    fn scan_range<S: ScanSource>(&self, source: &S, poses: &[PosePrior]) -> Result<(usize, usize)> {
        let start = self.config.start_index;
        let requested = match self.config.num_scans {
            Some(n) => start.saturating_add(n),
            None => usize::MAX,
        };
        if start >= source.len() || requested <= start {
            return Err(Error::InvalidInput(format!(
                "Scan range starting at {} selects none of the {} available scans",
                start,
                source.len()
            )));
        }
        if start >= poses.len() {
            return Err(Error::MissingPosePrior {
                index: start,
                available: poses.len(),
            });
        }
        let end = requested.min(source.len()).min(poses.len());
        if end < requested.min(source.len()) {
            info!(
                "Only {} pose priors available, stopping after scan {}",
                poses.len(),
                end - 1
            );
        }
        Ok((start, end))
    }

    /// Fuse the configured scan range and write the cleaned model.
    ///
    /// In [`RunMode::Resume`] an existing model at `model_path` is loaded
    /// and returned without touching the scans.
    pub fn run<S: ScanSource>(&self, source: &S, poses: &[PosePrior]) -> Result<(PointCloud, RunReport)> {
        let model_path = &self.config.model_path;
        if self.config.mode == RunMode::Resume && model_path.exists() {
            info!("Loading existing model from {}", model_path.display());
            let model = read_ply_file(model_path)?;
            let report = RunReport {
                resumed: true,
                model_points: model.len(),
                preview: self.preview(&model),
                worker_threads: current_cpu_threads(),
                ..RunReport::default()
            };
            return Ok((model, report));
        }

        let (start, end) = self.scan_range(source, poses)?;
        let log = TransformLog::create(&self.config.transform_dir)?;
        log.reset()?;

        let mut accumulator = FusionAccumulator::new(&self.config.fusion)?;
        let mut report = RunReport {
            worker_threads: current_cpu_threads(),
            ..RunReport::default()
        };

        for index in start..end {
            let record = source.scan(index)?;
            info!("Scan {} ({}): {} raw points", index, record.name, record.raw.len());

            let prior = &poses[index];
            let mut scan_report = ScanReport {
                index,
                name: record.name.clone(),
                disposition: ScanDisposition::Unplaced,
                rounds: 0,
                fitness: None,
                initial_transform: None,
                final_transform: None,
                model_points: accumulator.len(),
            };

            if prior.is_unplaced() {
                warn!("Scan {} has no placement, skipping", record.name);
                log.record_skipped(&record.name, "no placement")?;
                report.scans.push(scan_report);
                continue;
            }

            let prepared = match self.preprocessor.prepare(record.raw, prior) {
                Ok(p) => p,
                Err(Error::DegenerateCloud { points, .. }) => {
                    warn!("Scan {} degenerate ({} points), skipping", record.name, points);
                    log.record_skipped(&record.name, "degenerate cloud")?;
                    scan_report.disposition = ScanDisposition::Degenerate;
                    report.scans.push(scan_report);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let initial = prepared.initial_transform;

            let (cloud, transform) = if accumulator.is_empty() {
                scan_report.disposition = ScanDisposition::Seeded;
                (prepared.cloud, initial)
            } else {
                let registered = self.engine.register(
                    prepared.cloud,
                    &initial,
                    accumulator.model(),
                    &prepared.window,
                );
                let outcome = &registered.outcome;
                if outcome.state == SessionState::Diverged {
                    warn!(
                        "Registration of {} diverged, keeping the pose prior",
                        record.name
                    );
                }
                scan_report.disposition = ScanDisposition::Registered(outcome.state);
                scan_report.rounds = outcome.rounds;
                scan_report.fitness = outcome.fitness;
                (registered.cloud, registered.transform)
            };

            log.record(&record.name, &initial, &transform)?;
            accumulator.fuse(cloud);

            scan_report.initial_transform = Some(initial);
            scan_report.final_transform = Some(transform);
            scan_report.model_points = accumulator.len();
            report.scans.push(scan_report);
        }

        report.final_scale = Some(accumulator.scale());
        let model = self.cleanup.apply(&accumulator.into_model());

        if let Some(parent) = model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_ply_file(model_path, &model)?;
        info!(
            "Wrote {} points to {}",
            model.len(),
            model_path.display()
        );

        report.model_points = model.len();
        report.preview = self.preview(&model);
        Ok((model, report))
    }

    fn preview(&self, model: &PointCloud) -> Option<PointCloud> {
        self.config
            .preview
            .then(|| uniform_down_sample(model, self.config.preview_cell))
    }
}
