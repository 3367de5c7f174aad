//! Surface normal and curvature estimation by PCA on k-nearest neighbors.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;

use crate::spatial::KnnIndex;

/// Per-sample local surface description.
#[derive(Debug, Clone, Default)]
pub struct SurfaceFeatures {
    pub normals: Vec<Vector3<f32>>,
    /// Surface variation `l0 / (l0 + l1 + l2)`, `l0` the smallest eigenvalue.
    pub curvatures: Vec<f32>,
}

impl SurfaceFeatures {
    pub fn len(&self) -> usize {
        self.normals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normals.is_empty()
    }
}

/// Estimate a normal and curvature for every point of `samples`, using its
/// `k` nearest neighbors in `surface`.
///
/// Normals are flipped to face `viewpoint`. Samples with fewer than three
/// neighbors get the vertical axis and zero curvature.
pub fn estimate_normals(
    samples: &[Point3<f32>],
    surface: &[Point3<f32>],
    k: usize,
    viewpoint: &Point3<f32>,
) -> SurfaceFeatures {
    if samples.is_empty() {
        return SurfaceFeatures::default();
    }

    let index = KnnIndex::build(surface);

    let (normals, curvatures): (Vec<Vector3<f32>>, Vec<f32>) = samples
        .par_iter()
        .map(|p| {
            let neighbors = index.k_nearest(p, k);
            if neighbors.len() < 3 {
                return (Vector3::new(0.0, 0.0, 1.0), 0.0);
            }

            let mut centroid = Vector3::<f64>::zeros();
            for n in &neighbors {
                centroid += n.point.coords.cast::<f64>();
            }
            centroid /= neighbors.len() as f64;

            let mut cov = Matrix3::<f64>::zeros();
            for n in &neighbors {
                let d = n.point.coords.cast::<f64>() - centroid;
                cov += d * d.transpose();
            }
            cov /= neighbors.len() as f64;

            let eigen = SymmetricEigen::new(cov);

            let mut min_idx = 0;
            for i in 1..3 {
                if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
                    min_idx = i;
                }
            }

            let total = eigen.eigenvalues.sum();
            let curvature = if total > 0.0 {
                (eigen.eigenvalues[min_idx] / total).max(0.0)
            } else {
                0.0
            };

            let mut normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
            let to_view = viewpoint.coords.cast::<f64>() - p.coords.cast::<f64>();
            if normal.dot(&to_view) < 0.0 {
                normal = -normal;
            }

            (normal.cast::<f32>(), curvature as f32)
        })
        .unzip();

    SurfaceFeatures {
        normals,
        curvatures,
    }
}
