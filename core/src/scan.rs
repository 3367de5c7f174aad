use nalgebra::{Matrix3, Point3, Vector3};

use crate::point_cloud::Rgb;

/// A point as delivered by the scanner, in the sensor frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub position: Point3<f32>,
    pub color: Rgb,
}

/// One capture from a single sensor position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawScan {
    pub points: Vec<RawPoint>,
}

impl RawScan {
    pub fn new(points: Vec<RawPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Approximate placement of a scan, supplied by the floor-plan placement stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosePrior {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl PosePrior {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// The placement stage writes an all-zero rotation for scans it could not place.
    pub fn is_unplaced(&self) -> bool {
        self.rotation == Matrix3::zeros()
    }
}
