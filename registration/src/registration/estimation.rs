//! Rigid transform estimation from matched sample pairs.

use nalgebra::{Matrix3, Matrix4, Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use super::features::SurfacePoint;

/// Error metric minimized in each inner iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// Closed-form least squares over point pairs (Kabsch/SVD).
    #[default]
    PointToPoint,
    /// One Gauss-Newton step on distances to target tangent planes.
    PointToPlane,
}

pub const MIN_CORRESPONDENCES: usize = 3;

/// Estimate the transform moving `source` samples onto their matched
/// `target` samples. Returns `None` for fewer than three pairs or a
/// degenerate configuration.
pub fn estimate_step(
    estimator: Estimator,
    source: &[SurfacePoint],
    target: &[SurfacePoint],
    pairs: &[(usize, usize)],
) -> Option<Matrix4<f64>> {
    if pairs.len() < MIN_CORRESPONDENCES {
        return None;
    }
    match estimator {
        Estimator::PointToPoint => point_to_point(source, target, pairs),
        Estimator::PointToPlane => point_to_plane(source, target, pairs),
    }
}

fn point_to_point(
    source: &[SurfacePoint],
    target: &[SurfacePoint],
    pairs: &[(usize, usize)],
) -> Option<Matrix4<f64>> {
    let n = pairs.len() as f64;

    let mut source_centroid = Vector3::zeros();
    let mut target_centroid = Vector3::zeros();
    for &(s, t) in pairs {
        source_centroid += source[s].position.coords;
        target_centroid += target[t].position.coords;
    }
    source_centroid /= n;
    target_centroid /= n;

    // Cross-covariance H = sum (s - cs)(t - ct)^T
    let mut h = Matrix3::zeros();
    for &(s, t) in pairs {
        let ds = source[s].position.coords - source_centroid;
        let dt = target[t].position.coords - target_centroid;
        h += ds * dt.transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let v = v_t.transpose();

    let mut rotation = v * u.transpose();
    if rotation.determinant() < 0.0 {
        let mut v_fixed = v;
        v_fixed.column_mut(2).neg_mut();
        rotation = v_fixed * u.transpose();
    }

    let translation = target_centroid - rotation * source_centroid;
    if !translation.iter().all(|x| x.is_finite()) {
        return None;
    }

    Some(compose(&rotation, &translation))
}

fn point_to_plane(
    source: &[SurfacePoint],
    target: &[SurfacePoint],
    pairs: &[(usize, usize)],
) -> Option<Matrix4<f64>> {
    let mut ata = Matrix6::<f64>::zeros();
    let mut atb = Vector6::<f64>::zeros();

    for &(s, t) in pairs {
        let p = source[s].position.coords;
        let q = target[t].position.coords;
        let n = target[t].normal;

        let residual = (p - q).dot(&n);
        let cross = p.cross(&n);
        let jacobian = Vector6::new(n.x, n.y, n.z, cross.x, cross.y, cross.z);

        ata += jacobian * jacobian.transpose();
        atb += jacobian * residual;
    }

    let delta = -(ata.try_inverse()? * atb);
    if !delta.iter().all(|x| x.is_finite()) {
        return None;
    }
    Some(exponential_map(&delta))
}

/// `[v, omega]` to a rigid transform: Rodrigues rotation, direct translation.
pub(crate) fn exponential_map(delta: &Vector6<f64>) -> Matrix4<f64> {
    let omega = Vector3::new(delta[3], delta[4], delta[5]);
    let v = Vector3::new(delta[0], delta[1], delta[2]);

    let theta = omega.norm();
    let rotation = if theta < 1e-12 {
        Matrix3::identity()
    } else {
        let k = omega / theta;
        let k_cross = Matrix3::new(0.0, -k.z, k.y, k.z, 0.0, -k.x, -k.y, k.x, 0.0);
        Matrix3::identity() + k_cross * theta.sin() + k_cross * k_cross * (1.0 - theta.cos())
    };

    compose(&rotation, &v)
}

fn compose(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Matrix4<f64> {
    let mut transform = Matrix4::identity();
    transform.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    transform
        .fixed_view_mut::<3, 1>(0, 3)
        .copy_from(translation);
    transform
}
