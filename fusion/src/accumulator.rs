//! The global model and its memory budget.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sj_core::{Error, PointCloud, Result};
use sj_point_cloud::uniform_down_sample;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    /// Largest model size kept between scans.
    pub point_budget: usize,
    /// Sampling cell the model starts with.
    pub initial_scale: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            point_budget: 100_000_000,
            initial_scale: 0.02,
        }
    }
}

impl FusionParams {
    pub fn validate(&self) -> Result<()> {
        if self.point_budget == 0 {
            return Err(Error::InvalidConfig(
                "point_budget must be at least 1".to_string(),
            ));
        }
        if !(self.initial_scale > 0.0) || !self.initial_scale.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "initial_scale must be positive, got {}",
                self.initial_scale
            )));
        }
        Ok(())
    }
}

/// Owns the fused model and the sampling scale.
///
/// The scale only grows: whenever the model exceeds the budget it is
/// multiplied by `sqrt(count / budget)` and the model resampled.
#[derive(Debug, Clone)]
pub struct FusionAccumulator {
    model: PointCloud,
    scale: f64,
    budget: usize,
}

impl FusionAccumulator {
    pub fn new(params: &FusionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            model: PointCloud::new(),
            scale: params.initial_scale,
            budget: params.point_budget,
        })
    }

    pub fn model(&self) -> &PointCloud {
        &self.model
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn len(&self) -> usize {
        self.model.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    /// Merge an aligned scan into the model.
    pub fn fuse(&mut self, scan: PointCloud) {
        let added = scan.len();
        let mut model = std::mem::take(&mut self.model);
        model.append(scan);
        model = uniform_down_sample(&model, self.scale);

        while model.len() > self.budget {
            let growth = (model.len() as f64 / self.budget as f64).sqrt();
            self.scale *= growth;
            info!(
                "Model has {} points over budget {}, sampling at {:.4}",
                model.len(),
                self.budget,
                self.scale
            );
            model = uniform_down_sample(&model, self.scale);
        }

        debug!(
            "Fused {} points, model now {} at scale {:.4}",
            added,
            model.len(),
            self.scale
        );
        self.model = model;
    }

    pub fn into_model(self) -> PointCloud {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn slab(offset: f32, n: usize) -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..n {
            for j in 0..n {
                cloud.push(
                    Point3::new(offset + i as f32 * 0.013, j as f32 * 0.013, 0.3),
                    [i as u8, j as u8, 0],
                );
            }
        }
        cloud
    }

    #[test]
    fn first_scan_is_sampled_at_initial_scale() {
        let mut acc = FusionAccumulator::new(&FusionParams::default()).unwrap();
        assert!(acc.is_empty());
        let scan = slab(0.0, 40);
        let expected = uniform_down_sample(&scan, 0.02).len();
        acc.fuse(scan);
        assert_eq!(acc.len(), expected);
        assert_eq!(acc.scale(), 0.02);
    }

    #[test]
    fn budget_holds_and_scale_never_shrinks() {
        let params = FusionParams {
            point_budget: 500,
            initial_scale: 0.01,
        };
        let mut acc = FusionAccumulator::new(&params).unwrap();
        let mut last_scale = acc.scale();
        for k in 0..6 {
            acc.fuse(slab(k as f32 * 0.3, 50));
            assert!(acc.len() <= params.point_budget, "len {}", acc.len());
            assert!(acc.scale() >= last_scale);
            last_scale = acc.scale();
        }
        assert!(last_scale > 0.01);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let params = FusionParams {
            point_budget: 0,
            ..FusionParams::default()
        };
        assert!(FusionAccumulator::new(&params).is_err());
    }
}
