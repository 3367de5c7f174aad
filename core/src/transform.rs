//! Rigid transform helpers on homogeneous 4×4 matrices.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Homogeneous rigid transform mapping a scan frame into the world frame.
pub type RigidTransform = Matrix4<f64>;

/// Apply `transform` to an f32 point, computing in f64.
#[inline]
pub fn transform_point(transform: &RigidTransform, point: &Point3<f32>) -> Point3<f32> {
    let p = transform.transform_point(&point.cast::<f64>());
    Point3::new(p.x as f32, p.y as f32, p.z as f32)
}

pub fn from_rotation_translation(
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
) -> RigidTransform {
    let mut t = Matrix4::identity();
    t.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    t
}

pub fn rotation(transform: &RigidTransform) -> Matrix3<f64> {
    transform.fixed_view::<3, 3>(0, 0).into_owned()
}

pub fn translation(transform: &RigidTransform) -> Vector3<f64> {
    transform.fixed_view::<3, 1>(0, 3).into_owned()
}

/// Mirror of the Y axis. Converts between the scanner's and the world's handedness.
pub fn handedness_correction() -> RigidTransform {
    Matrix4::from_diagonal(&nalgebra::Vector4::new(1.0, -1.0, 1.0, 1.0))
}

/// Orthonormal rotation block, bottom row `[0, 0, 0, 1]`, within `tolerance`.
pub fn is_rigid(transform: &RigidTransform, tolerance: f64) -> bool {
    let r = rotation(transform);
    let orthonormal = (r.transpose() * r - Matrix3::identity()).abs().max() < tolerance;
    let bottom = transform.fixed_view::<1, 4>(3, 0);
    let bottom_ok = bottom[0].abs() < tolerance
        && bottom[1].abs() < tolerance
        && bottom[2].abs() < tolerance
        && (bottom[3] - 1.0).abs() < tolerance;
    orthonormal && bottom_ok
}

/// Frobenius norm of `a - b`.
pub fn frobenius_distance(a: &RigidTransform, b: &RigidTransform) -> f64 {
    (a - b).norm()
}

/// Sum of absolute element differences.
pub fn abs_difference_sum(a: &RigidTransform, b: &RigidTransform) -> f64 {
    (a - b).abs().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handedness_correction_is_an_involution() {
        let c = handedness_correction();
        assert_eq!(c * c, Matrix4::identity());
        assert!(is_rigid(&c, 1e-12));
    }

    #[test]
    fn rotation_translation_round_trip() {
        let r = nalgebra::Rotation3::from_axis_angle(&Vector3::z_axis(), 0.3).into_inner();
        let t = Vector3::new(1.0, -2.0, 0.5);
        let m = from_rotation_translation(&r, &t);
        assert!(is_rigid(&m, 1e-9));
        assert_eq!(translation(&m), t);
        assert!((rotation(&m) - r).norm() < 1e-12);
    }

    #[test]
    fn non_orthonormal_block_is_not_rigid() {
        let mut m = Matrix4::identity();
        m[(0, 0)] = 2.0;
        assert!(!is_rigid(&m, 1e-6));
    }

    #[test]
    fn distance_measures() {
        let a = Matrix4::identity();
        let mut b = Matrix4::identity();
        b[(0, 3)] = -0.3;
        b[(1, 3)] = 0.4;
        assert!((frobenius_distance(&a, &b) - 0.5).abs() < 1e-12);
        assert!((abs_difference_sum(&a, &b) - 0.7).abs() < 1e-12);
    }
}
