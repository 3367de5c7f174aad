//! R-tree backed nearest-neighbor index over 3D positions.

use nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

struct PointWrapper(usize, [f32; 3]);

impl RTreeObject for PointWrapper {
    type Envelope = AABB<[f32; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.1)
    }
}

impl PointDistance for PointWrapper {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let dx = self.1[0] - point[0];
        let dy = self.1[1] - point[1];
        let dz = self.1[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Neighbor returned by [`KnnIndex`] queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub point: Point3<f32>,
    pub distance_sq: f32,
}

/// Static KNN index over a slice of points. Indices refer to that slice.
pub struct KnnIndex {
    tree: RTree<PointWrapper>,
}

impl KnnIndex {
    pub fn build(points: &[Point3<f32>]) -> Self {
        let wrappers: Vec<PointWrapper> = points
            .iter()
            .enumerate()
            .map(|(i, p)| PointWrapper(i, [p.x, p.y, p.z]))
            .collect();
        Self {
            tree: RTree::bulk_load(wrappers),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The `k` nearest points to `query`, closest first.
    pub fn k_nearest(&self, query: &Point3<f32>, k: usize) -> Vec<Neighbor> {
        let q = [query.x, query.y, query.z];
        self.tree
            .nearest_neighbor_iter(&q)
            .take(k)
            .map(|w| Neighbor {
                index: w.0,
                point: Point3::new(w.1[0], w.1[1], w.1[2]),
                distance_sq: w.distance_2(&q),
            })
            .collect()
    }

    pub fn nearest(&self, query: &Point3<f32>) -> Option<Neighbor> {
        let q = [query.x, query.y, query.z];
        self.tree.nearest_neighbor(&q).map(|w| Neighbor {
            index: w.0,
            point: Point3::new(w.1[0], w.1[1], w.1[2]),
            distance_sq: w.distance_2(&q),
        })
    }
}
