//! Properties of the sampling and window routines on random clouds.

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sj_point_cloud::{uniform_down_sample, BoundingWindow, PointCloud};

fn random_cloud(seed: u64, n: usize) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let points = (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(0.0..2.5),
            )
        })
        .collect();
    let mut cloud = PointCloud::uniform(points, [0, 0, 0]);
    for (i, c) in cloud.colors.iter_mut().enumerate() {
        *c = [(i % 251) as u8, (i % 127) as u8, (i % 61) as u8];
    }
    cloud
}

#[test]
fn test_down_sample_is_monotone_for_nested_cells() {
    let cloud = random_cloud(1, 20_000);
    let radii = [0.02, 0.04, 0.08, 0.16, 0.32];
    let counts: Vec<usize> = radii
        .iter()
        .map(|&r| uniform_down_sample(&cloud, r).len())
        .collect();
    for w in counts.windows(2) {
        assert!(w[1] <= w[0], "counts not monotone: {:?}", counts);
    }
    assert!(counts[0] <= cloud.len());
}

#[test]
fn test_down_sample_is_idempotent() {
    let cloud = random_cloud(2, 15_000);
    for r in [0.017, 0.02, 0.05, 0.3] {
        let once = uniform_down_sample(&cloud, r);
        let twice = uniform_down_sample(&once, r);
        assert_eq!(once.len(), twice.len(), "radius {}", r);
        assert_eq!(once, twice);
    }
}

#[test]
fn test_down_sample_is_deterministic() {
    let cloud = random_cloud(3, 12_000);
    let a = uniform_down_sample(&cloud, 0.05);
    let b = uniform_down_sample(&cloud, 0.05);
    assert_eq!(a, b);
}

#[test]
fn test_window_contains_mean() {
    for seed in 0..5 {
        let cloud = random_cloud(10 + seed, 200 + seed as usize * 37);
        let mean = cloud.centroid().unwrap();
        for scale in [[3.5, 3.5, 4.0], [3.0, 3.0, 3.0], [0.01, 0.5, 1e-6]] {
            let window = BoundingWindow::estimate(&cloud, scale).unwrap();
            assert!(window.contains_f64(&mean));
            for i in 0..3 {
                assert!(window.min[i] <= window.max[i]);
            }
        }
    }
}

#[test]
fn test_wider_window_keeps_more_points() {
    let cloud = random_cloud(4, 5_000);
    let tight = BoundingWindow::estimate(&cloud, [3.0, 3.0, 3.0]).unwrap();
    let wide = BoundingWindow::estimate(&cloud, [3.5, 3.5, 4.0]).unwrap();
    assert!(wide.crop(&cloud).len() >= tight.crop(&cloud).len());
}
