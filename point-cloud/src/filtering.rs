//! Point cloud filtering
//!
//! - Uniform (occupied-cell) downsampling
//! - Statistical outlier removal

use nalgebra::Point3;
use rayon::prelude::*;
use sj_core::PointCloud;

use crate::spatial::KnnIndex;

type CellKey = (i64, i64, i64);

#[inline]
fn cell_of(p: &Point3<f32>, cell_size: f64) -> CellKey {
    (
        (p.x as f64 / cell_size).floor() as i64,
        (p.y as f64 / cell_size).floor() as i64,
        (p.z as f64 / cell_size).floor() as i64,
    )
}

#[inline]
fn distance_to_cell_center_sq(p: &Point3<f32>, key: CellKey, cell_size: f64) -> f64 {
    let cx = (key.0 as f64 + 0.5) * cell_size;
    let cy = (key.1 as f64 + 0.5) * cell_size;
    let cz = (key.2 as f64 + 0.5) * cell_size;
    let dx = p.x as f64 - cx;
    let dy = p.y as f64 - cy;
    let dz = p.z as f64 - cz;
    dx * dx + dy * dy + dz * dz
}

/// Keep one point per occupied cell of an axis-aligned grid with side `cell_size`.
///
/// The kept point is the input point closest to its cell center, so colors
/// are never blended. Points with a NaN or infinite coordinate are dropped. The output is ordered by cell, which makes the result
/// independent of the input order up to ties.
pub fn uniform_down_sample(pc: &PointCloud, cell_size: f64) -> PointCloud {
    if cell_size <= 0.0 || pc.is_empty() {
        return pc.clone();
    }

    let n = pc.len();
    // Non-finite coordinates would all land in cell (0, 0, 0).
    let mut keyed: Vec<(CellKey, usize)> = pc
        .points
        .par_iter()
        .enumerate()
        .filter(|(_, p)| p.coords.iter().all(|v| v.is_finite()))
        .map(|(i, p)| (cell_of(p, cell_size), i))
        .collect();

    if n > 10000 {
        keyed.par_sort_unstable();
    } else {
        keyed.sort_unstable();
    }

    let mut selected = Vec::new();
    let mut start = 0;
    while start < keyed.len() {
        let key = keyed[start].0;
        let mut end = start;
        let mut best = keyed[start].1;
        let mut best_dist = f64::MAX;
        while end < keyed.len() && keyed[end].0 == key {
            let idx = keyed[end].1;
            let d = distance_to_cell_center_sq(&pc.points[idx], key, cell_size);
            if d < best_dist {
                best_dist = d;
                best = idx;
            }
            end += 1;
        }
        selected.push(best);
        start = end;
    }

    pc.select(&selected)
}

/// Remove statistical outliers.
///
/// Computes the mean distance from each point to its `k` nearest neighbors
/// (itself excluded). Points whose mean distance exceeds
/// `mean + std_ratio * std_dev` over the whole cloud are removed; the
/// standard deviation is Bessel-corrected.
///
/// Returns the filtered cloud and the indices of the kept points.
pub fn remove_statistical_outliers(
    pc: &PointCloud,
    k: usize,
    std_ratio: f64,
) -> (PointCloud, Vec<usize>) {
    if pc.len() < 2 || k == 0 {
        return (pc.clone(), (0..pc.len()).collect());
    }

    let index = KnnIndex::build(&pc.points);

    let distances: Vec<f64> = pc
        .points
        .par_iter()
        .map(|p| {
            // The first hit is the query point itself.
            let neighbors = index.k_nearest(p, k + 1);
            let mut sum_dist = 0.0;
            let mut count = 0;
            for n in neighbors.iter().skip(1) {
                sum_dist += (n.distance_sq as f64).sqrt();
                count += 1;
            }
            if count > 0 {
                sum_dist / count as f64
            } else {
                0.0
            }
        })
        .collect();

    let mean_dist = distances.iter().sum::<f64>() / distances.len() as f64;
    let variance = distances
        .iter()
        .map(|d| {
            let diff = d - mean_dist;
            diff * diff
        })
        .sum::<f64>()
        / (distances.len() - 1) as f64;
    let std_dev = variance.sqrt();

    let threshold = mean_dist + std_ratio * std_dev;

    let inliers: Vec<usize> = distances
        .iter()
        .enumerate()
        .filter_map(|(i, &d)| (d <= threshold).then_some(i))
        .collect();

    tracing::debug!(
        "statistical outlier removal: mean {:.5}, std {:.5}, kept {}/{}",
        mean_dist,
        std_dev,
        inliers.len(),
        pc.len()
    );

    (pc.select(&inliers), inliers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_cloud(n: usize, spacing: f32) -> PointCloud {
        let mut points = Vec::new();
        for x in 0..n {
            for y in 0..n {
                points.push(Point3::new(
                    (x as f32 + 0.5) * spacing,
                    (y as f32 + 0.5) * spacing,
                    0.25,
                ));
            }
        }
        PointCloud::uniform(points, [200, 100, 50])
    }

    #[test]
    fn down_sample_keeps_one_point_per_cell() {
        // 20x20 points, 0.01 apart, sampled with 0.1 cells -> 2x2 blocks of 10x10.
        let cloud = grid_cloud(20, 0.01);
        let sampled = uniform_down_sample(&cloud, 0.1);
        assert_eq!(sampled.len(), 4);
        assert!(sampled.colors.iter().all(|c| *c == [200, 100, 50]));
    }

    #[test]
    fn down_sample_picks_point_nearest_cell_center() {
        let cloud = PointCloud::from_parts(
            vec![
                Point3::new(0.01, 0.01, 0.01),
                Point3::new(0.49, 0.51, 0.5),
                Point3::new(0.9, 0.9, 0.9),
            ],
            vec![[1, 0, 0], [2, 0, 0], [3, 0, 0]],
        )
        .unwrap();
        let sampled = uniform_down_sample(&cloud, 1.0);
        assert_eq!(sampled.len(), 1);
        assert_eq!(sampled.colors[0], [2, 0, 0]);
    }

    #[test]
    fn down_sample_drops_non_finite_points() {
        let mut cloud = grid_cloud(4, 0.5);
        cloud.push(Point3::new(f32::NAN, 5.0, 5.0), [9, 9, 9]);
        cloud.push(Point3::new(0.1, f32::INFINITY, 0.1), [9, 9, 9]);
        let sampled = uniform_down_sample(&cloud, 0.5);
        assert_eq!(sampled.len(), 16);
        assert!(sampled
            .points
            .iter()
            .all(|p| p.coords.iter().all(|v| v.is_finite())));
        assert!(!sampled.colors.contains(&[9, 9, 9]));
    }

    #[test]
    fn down_sample_count_can_grow_with_non_nested_cells() {
        let cloud = PointCloud::uniform(
            vec![Point3::new(1.05, 0.1, 0.1), Point3::new(1.15, 0.1, 0.1)],
            [0, 0, 0],
        );
        assert_eq!(uniform_down_sample(&cloud, 0.6).len(), 1);
        assert_eq!(uniform_down_sample(&cloud, 1.1).len(), 2);
        assert_eq!(uniform_down_sample(&cloud, 1.2).len(), 1);
    }

    #[test]
    fn non_positive_cell_returns_input() {
        let cloud = grid_cloud(3, 0.5);
        assert_eq!(uniform_down_sample(&cloud, 0.0), cloud);
        assert_eq!(uniform_down_sample(&cloud, -1.0), cloud);
    }

    #[test]
    fn outlier_far_from_plane_is_removed() {
        let mut cloud = grid_cloud(15, 0.05);
        cloud.push(Point3::new(0.35, 0.35, 5.0), [255, 0, 0]);
        let (filtered, kept) = remove_statistical_outliers(&cloud, 10, 2.0);
        assert_eq!(filtered.len(), cloud.len() - 1);
        assert!(!kept.contains(&(cloud.len() - 1)));
        assert!(filtered.points.iter().all(|p| p.z < 1.0));
    }

    #[test]
    fn outlier_removal_handles_tiny_clouds() {
        let cloud = PointCloud::uniform(vec![Point3::origin()], [0, 0, 0]);
        let (filtered, kept) = remove_statistical_outliers(&cloud, 50, 2.0);
        assert_eq!(filtered.len(), 1);
        assert_eq!(kept, vec![0]);
    }
}
