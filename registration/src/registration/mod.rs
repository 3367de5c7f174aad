//! Incremental scan registration against the fused model.
//!
//! A registration session refines the pose of one scan against the part of
//! the model that falls inside the scan's bounding window:
//!
//! 1. Gate: skip when the cropped model is too small relative to the scan
//! 2. Run rounds of feature-space ICP, each with a few inner iterations
//! 3. After every round, stop on an implausible transform or poor fitness,
//!    shrink the correspondence distance when the step stalls, and declare
//!    convergence once the recent accumulated transforms agree
//!
//! Sessions are single-threaded state machines; the per-sample
//! correspondence search inside each iteration runs on the Rayon pool.

pub mod convergence;
pub mod estimation;
pub mod features;

use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sj_core::transform::abs_difference_sum;
use sj_core::{Error, PointCloud, Result, RigidTransform};
use sj_point_cloud::BoundingWindow;

pub use convergence::{SanityBounds, TransformHistory};
pub use estimation::{estimate_step, Estimator, MIN_CORRESPONDENCES};
pub use features::{
    position_normal_curvature, FeatureCloud, FeatureIndex, FeatureRepresentation, FeatureVector,
    SurfacePoint, FEATURE_DIM,
};

/// Tuning of a registration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationParams {
    /// Upper bound on outer rounds.
    pub max_rounds: usize,
    /// Estimation steps per round.
    pub inner_iterations: usize,
    /// Starting correspondence distance, in feature-space units.
    pub max_correspondence_distance: f64,
    /// Decrement applied when consecutive rounds produce the same step.
    pub correspondence_shrink_step: f64,
    /// Threshold for both the stall test and the convergence test.
    pub transformation_epsilon: f64,
    /// Number of accumulated transforms compared for convergence.
    pub history_len: usize,
    /// Rounds whose fitness exceeds this end the session as diverged.
    pub fitness_ceiling: f64,
    /// Skip when `target < overlap_ratio * source`.
    pub overlap_ratio: f64,
    /// Grid cell for the registration samples.
    pub feature_cell: f64,
    /// Neighbors for normal and curvature estimation.
    pub normal_neighbors: usize,
    /// Normals are oriented toward this point.
    pub viewpoint: [f64; 3],
    pub sanity: SanityBounds,
    pub estimator: Estimator,
    pub representation: FeatureRepresentation,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            max_rounds: 30,
            inner_iterations: 2,
            max_correspondence_distance: 0.1,
            correspondence_shrink_step: 0.001,
            transformation_epsilon: 1e-6,
            history_len: 4,
            fitness_ceiling: 20.0,
            overlap_ratio: 0.25,
            feature_cell: 0.04,
            normal_neighbors: 30,
            viewpoint: [0.0, 0.0, 0.0],
            sanity: SanityBounds::default(),
            estimator: Estimator::default(),
            representation: FeatureRepresentation::default(),
        }
    }
}

impl RegistrationParams {
    pub fn validate(&self) -> Result<()> {
        if self.inner_iterations == 0 {
            return Err(Error::InvalidConfig(
                "inner_iterations must be at least 1".to_string(),
            ));
        }
        if self.history_len == 0 {
            return Err(Error::InvalidConfig(
                "history_len must be at least 1".to_string(),
            ));
        }
        if !(self.max_correspondence_distance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_correspondence_distance must be positive, got {}",
                self.max_correspondence_distance
            )));
        }
        if self.correspondence_shrink_step < 0.0 || self.transformation_epsilon < 0.0 {
            return Err(Error::InvalidConfig(
                "shrink step and epsilon must be non-negative".to_string(),
            ));
        }
        if !(self.feature_cell > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "feature_cell must be positive, got {}",
                self.feature_cell
            )));
        }
        if self.normal_neighbors < 3 {
            return Err(Error::InvalidConfig(
                "normal_neighbors must be at least 3".to_string(),
            ));
        }
        if self.representation.weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidConfig(
                "feature weights must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a session is, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Gated,
    Iterating,
    Converged,
    Exhausted,
    Diverged,
    Skipped,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Converged
                | SessionState::Exhausted
                | SessionState::Diverged
                | SessionState::Skipped
        )
    }

    /// Whether the refinement is applied to the scan.
    pub fn is_accepted(self) -> bool {
        matches!(self, SessionState::Converged | SessionState::Exhausted)
    }
}

/// Result of one registration session.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub state: SessionState,
    /// Correction composed on top of the initial transform. Identity unless
    /// the session was accepted.
    pub refinement: RigidTransform,
    pub rounds: usize,
    /// Fitness after the last completed round.
    pub fitness: Option<f64>,
    pub source_samples: usize,
    pub target_samples: usize,
    pub final_correspondence_distance: f64,
}

impl RegistrationOutcome {
    fn skipped(params: &RegistrationParams) -> Self {
        Self {
            state: SessionState::Skipped,
            refinement: Matrix4::identity(),
            rounds: 0,
            fitness: None,
            source_samples: 0,
            target_samples: 0,
            final_correspondence_distance: params.max_correspondence_distance,
        }
    }
}

/// A scan after registration, ready to be merged.
#[derive(Debug, Clone)]
pub struct RegisteredScan {
    pub cloud: PointCloud,
    /// `refinement * initial`.
    pub transform: RigidTransform,
    pub outcome: RegistrationOutcome,
}

/// Runs registration sessions with a fixed parameter set.
#[derive(Debug, Clone)]
pub struct RegistrationEngine {
    params: RegistrationParams,
}

struct Session<'a> {
    params: &'a RegistrationParams,
    state: SessionState,
    accumulated: Matrix4<f64>,
    previous_step: Option<Matrix4<f64>>,
    history: TransformHistory,
    max_distance: f64,
    rounds: usize,
    fitness: Option<f64>,
}

impl<'a> Session<'a> {
    fn new(params: &'a RegistrationParams) -> Self {
        Self {
            params,
            state: SessionState::Idle,
            accumulated: Matrix4::identity(),
            previous_step: None,
            history: TransformHistory::new(params.history_len),
            max_distance: params.max_correspondence_distance,
            rounds: 0,
            fitness: None,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Registration session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// One outer round. Returns once the round's bookkeeping is done.
    fn round(&mut self, source: &FeatureCloud, target: &FeatureCloud, index: &FeatureIndex) {
        self.rounds += 1;

        let mut step = Matrix4::identity();
        for _ in 0..self.params.inner_iterations {
            let current = step * self.accumulated;
            let aligned = source.transformed(&current);
            let pairs = correspondences(
                &aligned,
                index,
                &self.params.representation,
                self.max_distance,
            );
            match estimate_step(
                self.params.estimator,
                &aligned.samples,
                &target.samples,
                &pairs,
            ) {
                Some(update) => step = update * step,
                None => {
                    debug!(
                        "Only {} correspondences within {:.4}, ending round early",
                        pairs.len(),
                        self.max_distance
                    );
                    break;
                }
            }
        }
        self.accumulated = step * self.accumulated;

        let fitness = fitness_score(
            &source.transformed(&self.accumulated),
            index,
            &self.params.representation,
        );
        self.fitness = Some(fitness);

        if !self.params.sanity.admits(&self.accumulated) || fitness > self.params.fitness_ceiling {
            debug!(
                "Round {} rejected: fitness {:.4}, translation ({:.3}, {:.3}, {:.3})",
                self.rounds,
                fitness,
                self.accumulated[(0, 3)],
                self.accumulated[(1, 3)],
                self.accumulated[(2, 3)]
            );
            self.transition(SessionState::Diverged);
            return;
        }

        if let Some(previous) = &self.previous_step {
            if abs_difference_sum(&step, previous) < self.params.transformation_epsilon {
                self.max_distance -= self.params.correspondence_shrink_step;
            }
        }
        self.previous_step = Some(step);

        if self
            .history
            .has_settled(&self.accumulated, self.params.transformation_epsilon)
        {
            self.transition(SessionState::Converged);
            return;
        }
        self.history.push(self.accumulated);
    }

    fn finish(self, source_samples: usize, target_samples: usize) -> RegistrationOutcome {
        let refinement = if self.state.is_accepted() {
            self.accumulated
        } else {
            Matrix4::identity()
        };
        RegistrationOutcome {
            state: self.state,
            refinement,
            rounds: self.rounds,
            fitness: self.fitness,
            source_samples,
            target_samples,
            final_correspondence_distance: self.max_distance,
        }
    }
}

/// Pairs `(source, target)` whose feature distance is within `max_distance`.
fn correspondences(
    aligned: &FeatureCloud,
    index: &FeatureIndex,
    representation: &FeatureRepresentation,
    max_distance: f64,
) -> Vec<(usize, usize)> {
    let limit = max_distance.max(0.0).powi(2);
    aligned
        .samples
        .par_iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let (j, d2) = index.nearest(&representation.feature(s))?;
            (d2 <= limit).then_some((i, j))
        })
        .collect()
}

/// Mean squared feature distance from every aligned source sample to its
/// nearest target sample.
fn fitness_score(
    aligned: &FeatureCloud,
    index: &FeatureIndex,
    representation: &FeatureRepresentation,
) -> f64 {
    if aligned.is_empty() {
        return f64::MAX;
    }
    let total: f64 = aligned
        .samples
        .par_iter()
        .filter_map(|s| index.nearest(&representation.feature(s)).map(|(_, d2)| d2))
        .sum();
    total / aligned.len() as f64
}

impl RegistrationEngine {
    pub fn new(params: RegistrationParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &RegistrationParams {
        &self.params
    }

    /// Register `source` (already placed by `initial`) against the part of
    /// `model` inside `window`, and return it re-expressed under the final
    /// transform.
    ///
    /// A skipped or diverged session returns the cloud untouched and
    /// `initial` as the final transform.
    pub fn register(
        &self,
        source: PointCloud,
        initial: &RigidTransform,
        model: &PointCloud,
        window: &BoundingWindow,
    ) -> RegisteredScan {
        let target = window.crop(model);
        let outcome = self.align(&source, &target);

        if !outcome.state.is_accepted() {
            return RegisteredScan {
                cloud: source,
                transform: *initial,
                outcome,
            };
        }

        let cloud = source.into_transformed(&outcome.refinement);
        RegisteredScan {
            cloud,
            transform: outcome.refinement * initial,
            outcome,
        }
    }

    /// Estimate the refinement carrying `source` onto `target`.
    pub fn align(&self, source: &PointCloud, target: &PointCloud) -> RegistrationOutcome {
        let params = &self.params;
        let mut session = Session::new(params);

        if (target.len() as f64) < params.overlap_ratio * source.len() as f64 {
            info!(
                "Skipping registration: {} model points in window for {} scan points",
                target.len(),
                source.len()
            );
            return RegistrationOutcome::skipped(params);
        }
        session.transition(SessionState::Gated);

        let viewpoint = Point3::from(params.viewpoint);
        let source_features = FeatureCloud::from_cloud(
            source,
            params.feature_cell,
            params.normal_neighbors,
            &viewpoint,
        );
        let target_features = FeatureCloud::from_cloud(
            target,
            params.feature_cell,
            params.normal_neighbors,
            &viewpoint,
        );
        if source_features.len() < MIN_CORRESPONDENCES
            || target_features.len() < MIN_CORRESPONDENCES
        {
            warn!(
                "Skipping registration: too few samples ({} source, {} target)",
                source_features.len(),
                target_features.len()
            );
            return RegistrationOutcome {
                source_samples: source_features.len(),
                target_samples: target_features.len(),
                ..RegistrationOutcome::skipped(params)
            };
        }

        let index = FeatureIndex::build(&params.representation.features(&target_features.samples));

        session.transition(SessionState::Iterating);
        while session.rounds < params.max_rounds && !session.state.is_terminal() {
            session.round(&source_features, &target_features, &index);
        }
        if !session.state.is_terminal() {
            session.transition(SessionState::Exhausted);
        }

        let outcome = session.finish(source_features.len(), target_features.len());
        match outcome.state {
            SessionState::Diverged => warn!(
                "Registration diverged after {} rounds (fitness {:.4})",
                outcome.rounds,
                outcome.fitness.unwrap_or(f64::NAN)
            ),
            state => info!(
                "Registration {:?} after {} rounds, fitness {:.6}, correspondence distance {:.4}",
                state,
                outcome.rounds,
                outcome.fitness.unwrap_or(f64::NAN),
                outcome.final_correspondence_distance
            ),
        }
        outcome
    }
}
