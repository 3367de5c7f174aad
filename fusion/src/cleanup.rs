//! Final statistical outlier pass over the fused model.

use serde::{Deserialize, Serialize};
use tracing::info;

use sj_core::{Error, PointCloud, Result};
use sj_point_cloud::remove_statistical_outliers;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupParams {
    /// Neighbors averaged per point, self excluded.
    pub neighbors: usize,
    /// Points further than `mean + std_ratio * sigma` are dropped.
    pub std_ratio: f64,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self {
            neighbors: 50,
            std_ratio: 2.0,
        }
    }
}

impl CleanupParams {
    pub fn validate(&self) -> Result<()> {
        if self.neighbors == 0 {
            return Err(Error::InvalidConfig(
                "cleanup neighbors must be at least 1".to_string(),
            ));
        }
        if !self.std_ratio.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "cleanup std_ratio must be finite, got {}",
                self.std_ratio
            )));
        }
        Ok(())
    }
}

pub struct CleanupFilter {
    params: CleanupParams,
}

impl CleanupFilter {
    pub fn new(params: CleanupParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn apply(&self, model: &PointCloud) -> PointCloud {
        let (cleaned, _) =
            remove_statistical_outliers(model, self.params.neighbors, self.params.std_ratio);
        info!(
            "Cleanup kept {} of {} points",
            cleaned.len(),
            model.len()
        );
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn drops_isolated_points_only() {
        let mut cloud = PointCloud::new();
        for i in 0..20 {
            for j in 0..20 {
                cloud.push(Point3::new(i as f32 * 0.02, j as f32 * 0.02, 0.0), [1, 1, 1]);
            }
        }
        cloud.push(Point3::new(5.0, 5.0, 5.0), [255, 0, 0]);
        cloud.push(Point3::new(-4.0, 3.0, 1.0), [255, 0, 0]);

        let filter = CleanupFilter::new(CleanupParams::default()).unwrap();
        let cleaned = filter.apply(&cloud);

        assert!(cleaned.colors.iter().all(|c| *c == [1, 1, 1]));
        assert!(cleaned.len() >= 380);
    }
}
