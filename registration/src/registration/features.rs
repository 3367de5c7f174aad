//! Feature vectors for correspondence search.
//!
//! Each registration sample carries a position, a surface normal and a
//! curvature value. A [`FeatureRepresentation`] turns these into a
//! weighted 7D vector, and correspondences are nearest neighbors in that
//! space.

use nalgebra::{Matrix4, Point3, Vector3};
use rayon::prelude::*;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use sj_core::PointCloud;
use sj_point_cloud::{estimate_normals, uniform_down_sample};

pub const FEATURE_DIM: usize = 7;

pub type FeatureVector = [f64; FEATURE_DIM];

/// A registration sample with its local surface description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
    pub curvature: f64,
}

impl SurfacePoint {
    /// Re-express under a rigid transform. Curvature is invariant.
    pub fn transformed(&self, t: &Matrix4<f64>) -> SurfacePoint {
        let rotation = t.fixed_view::<3, 3>(0, 0);
        let translation = t.fixed_view::<3, 1>(0, 3);
        SurfacePoint {
            position: Point3::from(rotation * self.position.coords + translation),
            normal: rotation * self.normal,
            curvature: self.curvature,
        }
    }
}

/// `[x, y, z, nx, ny, nz, curvature]`.
pub fn position_normal_curvature(p: &SurfacePoint) -> FeatureVector {
    [
        p.position.x,
        p.position.y,
        p.position.z,
        p.normal.x,
        p.normal.y,
        p.normal.z,
        p.curvature,
    ]
}

fn default_extractor() -> fn(&SurfacePoint) -> FeatureVector {
    position_normal_curvature
}

/// Maps samples into the space where correspondences are searched.
///
/// The extractor is fixed at construction and each output dimension is
/// scaled by its weight before distances are taken.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureRepresentation {
    #[serde(skip, default = "default_extractor")]
    extract: fn(&SurfacePoint) -> FeatureVector,
    pub weights: FeatureVector,
}

impl Default for FeatureRepresentation {
    fn default() -> Self {
        Self {
            extract: position_normal_curvature,
            weights: [1.0; FEATURE_DIM],
        }
    }
}

impl FeatureRepresentation {
    pub fn new(extract: fn(&SurfacePoint) -> FeatureVector, weights: FeatureVector) -> Self {
        Self { extract, weights }
    }

    pub fn with_weights(weights: FeatureVector) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    pub fn feature(&self, p: &SurfacePoint) -> FeatureVector {
        let mut f = (self.extract)(p);
        for (v, w) in f.iter_mut().zip(self.weights.iter()) {
            *v *= w;
        }
        f
    }

    pub fn features(&self, samples: &[SurfacePoint]) -> Vec<FeatureVector> {
        samples.par_iter().map(|p| self.feature(p)).collect()
    }
}

/// Samples of a cloud with normals and curvature attached.
#[derive(Debug, Clone, Default)]
pub struct FeatureCloud {
    pub samples: Vec<SurfacePoint>,
}

impl FeatureCloud {
    /// Subsample `cloud` on a `cell` grid and describe each sample by its `k`
    /// nearest neighbors in the full cloud.
    pub fn from_cloud(cloud: &PointCloud, cell: f64, k: usize, viewpoint: &Point3<f64>) -> Self {
        let sampled = uniform_down_sample(cloud, cell);
        let surface = estimate_normals(
            &sampled.points,
            &cloud.points,
            k,
            &viewpoint.cast::<f32>(),
        );

        let samples = sampled
            .points
            .iter()
            .zip(surface.normals.iter().zip(&surface.curvatures))
            .map(|(p, (n, c))| SurfacePoint {
                position: p.cast::<f64>(),
                normal: n.cast::<f64>(),
                curvature: *c as f64,
            })
            .collect();

        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn transformed(&self, t: &Matrix4<f64>) -> FeatureCloud {
        FeatureCloud {
            samples: self.samples.par_iter().map(|s| s.transformed(t)).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct FeatureWrapper(usize, FeatureVector);

impl RTreeObject for FeatureWrapper {
    type Envelope = AABB<FeatureVector>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.1)
    }
}

impl PointDistance for FeatureWrapper {
    fn distance_2(&self, point: &FeatureVector) -> f64 {
        self.1
            .iter()
            .zip(point.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Nearest-neighbor index over feature vectors.
pub struct FeatureIndex {
    tree: RTree<FeatureWrapper>,
    len: usize,
}

impl FeatureIndex {
    pub fn build(features: &[FeatureVector]) -> Self {
        let wrapped: Vec<FeatureWrapper> = features
            .iter()
            .enumerate()
            .map(|(i, f)| FeatureWrapper(i, *f))
            .collect();
        Self {
            tree: RTree::bulk_load(wrapped),
            len: features.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index and squared distance of the closest stored feature.
    pub fn nearest(&self, query: &FeatureVector) -> Option<(usize, f64)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(query)
            .next()
            .map(|(w, d2)| (w.0, d2))
    }
}
