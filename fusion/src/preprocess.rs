//! Bring a raw scan into the world frame and trim it to its dense core.

use nalgebra::{Matrix3, Matrix4, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sj_core::transform::{handedness_correction, transform_point};
use sj_core::{Error, PointCloud, PosePrior, RawScan, Result, RigidTransform};
use sj_point_cloud::{uniform_down_sample, BoundingWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// Final sampling cell of a prepared scan.
    pub base_cell: f64,
    /// The first pass samples at `coarse_factor * base_cell`.
    pub coarse_factor: f64,
    /// Window used to discard stray points.
    pub wide_window_scale: [f64; 3],
    /// Window used to crop the model for registration.
    pub tight_window_scale: [f64; 3],
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            base_cell: 0.02,
            coarse_factor: 0.85,
            wide_window_scale: [3.5, 3.5, 4.0],
            tight_window_scale: [3.0, 3.0, 3.0],
        }
    }
}

impl PreprocessParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_cell > 0.0) || !(self.coarse_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sampling cells must be positive (base {}, factor {})",
                self.base_cell, self.coarse_factor
            )));
        }
        let mut scales = self.wide_window_scale.iter().chain(&self.tight_window_scale);
        if scales.any(|s| !(*s >= 0.0) || !s.is_finite()) {
            return Err(Error::InvalidConfig(
                "window scales must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// A scan ready for registration.
#[derive(Debug, Clone)]
pub struct PreparedScan {
    /// World-frame points.
    pub cloud: PointCloud,
    pub initial_transform: RigidTransform,
    /// Tight window around the scan's dense core.
    pub window: BoundingWindow,
}

/// World transform of a scan from its pose prior.
///
/// The prior's horizontal basis vectors are projected onto the floor plane
/// and renormalized, the vertical axis is forced to world +Z, and the
/// translation's vertical component is dropped. The result is conjugated
/// by the handedness correction.
pub fn leveled_transform(prior: &PosePrior) -> Result<RigidTransform> {
    let flat = |r: usize| Vector3::new(prior.rotation[(r, 0)], prior.rotation[(r, 1)], 0.0);
    let unit = |v: Vector3<f64>, r: usize| {
        let norm = v.norm();
        if norm > f64::EPSILON {
            Ok(v / norm)
        } else {
            Err(Error::DegeneratePose(format!(
                "rotation row {} is vertical or zero",
                r
            )))
        }
    };

    let x = unit(flat(0), 0)?;
    // Projection can skew the two rows; keep them orthogonal.
    let y = unit(flat(1) - x * flat(1).dot(&x), 1)?;

    let mut leveled = Matrix3::<f64>::zeros();
    leveled.set_row(0, &x.transpose());
    leveled.set_row(1, &y.transpose());
    leveled[(2, 2)] = 1.0;

    let inverse = leveled
        .try_inverse()
        .ok_or_else(|| Error::DegeneratePose("leveled rotation is singular".to_string()))?;

    let mut t = Matrix4::identity();
    t.fixed_view_mut::<3, 3>(0, 0).copy_from(&inverse);
    t[(0, 3)] = prior.translation.x;
    t[(1, 3)] = prior.translation.y;

    let c = handedness_correction();
    Ok(c * t * c)
}

pub struct FramePreprocessor {
    params: PreprocessParams,
}

impl FramePreprocessor {
    pub fn new(params: PreprocessParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &PreprocessParams {
        &self.params
    }

    /// Consumes the raw scan. Fails with [`Error::DegenerateCloud`] when
    /// fewer than two points survive any stage.
    pub fn prepare(&self, raw: RawScan, prior: &PosePrior) -> Result<PreparedScan> {
        if raw.len() < 2 {
            return Err(Error::degenerate(raw.len(), 2));
        }
        let transform = leveled_transform(prior)?;

        let raw_len = raw.len();
        let (points, colors): (Vec<_>, Vec<_>) = raw
            .points
            .into_par_iter()
            .map(|p| (transform_point(&transform, &p.position), p.color))
            .unzip();
        let world = PointCloud::from_parts(points, colors)?;

        let coarse = uniform_down_sample(&world, self.params.coarse_factor * self.params.base_cell);
        let wide = BoundingWindow::estimate(&coarse, self.params.wide_window_scale)?;
        let cropped = wide.crop(&coarse);
        if cropped.len() < 2 {
            return Err(Error::degenerate(cropped.len(), 2));
        }

        let cloud = uniform_down_sample(&cropped, self.params.base_cell);
        let window = BoundingWindow::estimate(&cloud, self.params.tight_window_scale)?;

        debug!(
            "Prepared scan: {} raw, {} coarse, {} in window, {} final",
            raw_len,
            coarse.len(),
            cropped.len(),
            cloud.len()
        );

        Ok(PreparedScan {
            cloud,
            initial_transform: transform,
            window,
        })
    }
}
