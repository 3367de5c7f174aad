//! Statistically derived axis-aligned crop windows.

use nalgebra::{Point3, Vector3};
use sj_core::{Error, PointCloud, Result};

/// Per-axis `[min, max]` region. `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingWindow {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl BoundingWindow {
    /// Window centered on the per-axis mean, `scale * sigma` wide.
    ///
    /// Sigma is the Bessel-corrected sample standard deviation, so at least
    /// two points are required.
    pub fn estimate(cloud: &PointCloud, scale: [f64; 3]) -> Result<Self> {
        let n = cloud.len();
        if n < 2 {
            return Err(Error::degenerate(n, 2));
        }

        let mut mean = Vector3::<f64>::zeros();
        for p in &cloud.points {
            mean += p.coords.cast::<f64>();
        }
        mean /= n as f64;

        let mut sigma = Vector3::<f64>::zeros();
        for p in &cloud.points {
            let d = p.coords.cast::<f64>() - mean;
            sigma += d.component_mul(&d);
        }
        sigma /= (n - 1) as f64;
        sigma = sigma.map(f64::sqrt);

        let half = Vector3::from(scale).component_mul(&sigma) / 2.0;
        Ok(Self {
            min: mean - half,
            max: mean + half,
        })
    }

    pub fn center(&self) -> Point3<f64> {
        Point3::from((self.min + self.max) / 2.0)
    }

    /// Inclusive on both ends.
    #[inline]
    pub fn contains(&self, p: &Point3<f32>) -> bool {
        (0..3).all(|i| {
            let v = p[i] as f64;
            v >= self.min[i] && v <= self.max[i]
        })
    }

    #[inline]
    pub fn contains_f64(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// New cloud with the points of `cloud` inside the window.
    pub fn crop(&self, cloud: &PointCloud) -> PointCloud {
        cloud.filter(|p| self.contains(p))
    }
}
