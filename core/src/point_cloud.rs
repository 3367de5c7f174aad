use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;

use crate::transform::transform_point;

/// 8-bit RGB color.
pub type Rgb = [u8; 3];

/// Colored point cloud.
///
/// `points` and `colors` are parallel vectors; every constructor keeps
/// their lengths equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point3<f32>>,
    pub colors: Vec<Rgb>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
        }
    }

    /// Build a cloud from parallel position / color vectors.
    pub fn from_parts(points: Vec<Point3<f32>>, colors: Vec<Rgb>) -> crate::Result<Self> {
        if colors.len() == points.len() {
            Ok(Self { points, colors })
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Color count {} does not match point count {}",
                colors.len(),
                points.len()
            )))
        }
    }

    /// Cloud with every point painted the same color.
    pub fn uniform(points: Vec<Point3<f32>>, color: Rgb) -> Self {
        let colors = vec![color; points.len()];
        Self { points, colors }
    }

    pub fn push(&mut self, point: Point3<f32>, color: Rgb) {
        self.points.push(point);
        self.colors.push(color);
    }

    /// Move every point of `other` to the end of this cloud.
    pub fn append(&mut self, mut other: PointCloud) {
        self.points.append(&mut other.points);
        self.colors.append(&mut other.colors);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point3<f32>, &Rgb)> {
        self.points.iter().zip(self.colors.iter())
    }

    /// New cloud holding the points at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> PointCloud {
        PointCloud {
            points: indices.iter().map(|&i| self.points[i]).collect(),
            colors: indices.iter().map(|&i| self.colors[i]).collect(),
        }
    }

    /// New cloud holding the points for which `keep` returns true.
    pub fn filter<F>(&self, keep: F) -> PointCloud
    where
        F: Fn(&Point3<f32>) -> bool + Sync,
    {
        let mask: Vec<bool> = self.points.par_iter().map(|p| keep(p)).collect();
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        self.select(&indices)
    }

    /// Apply a rigid transform, producing a new cloud. Colors are carried over.
    pub fn transformed(&self, transform: &Matrix4<f64>) -> PointCloud {
        let points = self
            .points
            .par_iter()
            .map(|p| transform_point(transform, p))
            .collect();
        PointCloud {
            points,
            colors: self.colors.clone(),
        }
    }

    /// Consuming variant of [`PointCloud::transformed`].
    pub fn into_transformed(self, transform: &Matrix4<f64>) -> PointCloud {
        let PointCloud { points, colors } = self;
        let points = points
            .into_par_iter()
            .map(|p| transform_point(transform, &p))
            .collect();
        PointCloud { points, colors }
    }

    /// Arithmetic mean of the positions, accumulated in f64.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector3::<f64>::zeros(), |acc, p| {
                acc + p.coords.cast::<f64>()
            });
        Some(Point3::from(sum / self.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_rejects_length_mismatch() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)];
        let err = PointCloud::from_parts(points.clone(), vec![[255, 0, 0]]).unwrap_err();
        assert!(err.to_string().contains("Color count"));

        let cloud = PointCloud::from_parts(points, vec![[255, 0, 0], [0, 255, 0]]).unwrap();
        assert_eq!(cloud.len(), 2);
    }

    #[test]
    fn append_moves_points_and_colors() {
        let mut a = PointCloud::uniform(vec![Point3::new(0.0, 0.0, 0.0)], [1, 2, 3]);
        let b = PointCloud::uniform(
            vec![Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)],
            [4, 5, 6],
        );
        a.append(b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.colors[2], [4, 5, 6]);
    }

    #[test]
    fn transformed_keeps_colors_and_moves_points() {
        let cloud = PointCloud::uniform(vec![Point3::new(1.0, 2.0, 3.0)], [9, 9, 9]);
        let mut t = Matrix4::identity();
        t[(0, 3)] = 0.5;
        let moved = cloud.transformed(&t);
        assert!((moved.points[0].x - 1.5).abs() < 1e-6);
        assert_eq!(moved.colors, cloud.colors);
    }

    #[test]
    fn filter_preserves_order() {
        let cloud = PointCloud::uniform(
            (0..10).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect(),
            [0, 0, 0],
        );
        let even = cloud.filter(|p| (p.x as i32) % 2 == 0);
        let xs: Vec<f32> = even.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }
}
