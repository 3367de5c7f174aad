//! Divergence and convergence tests on accumulated transforms.

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use sj_core::transform::frobenius_distance;
use std::collections::VecDeque;

/// Largest refinement the registration may apply on top of the pose prior.
///
/// Defaults are tuned for meter-scale indoor scans whose priors come from
/// floor-plan placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityBounds {
    /// Bound on `|t_x|` and `|t_y|`.
    pub max_horizontal_translation: f64,
    /// Bound on `|t_z|`.
    pub max_vertical_translation: f64,
    /// Bound, in radians, on `acos(|R_ii|)` for each axis.
    pub max_axis_deviation: f64,
}

impl Default for SanityBounds {
    fn default() -> Self {
        Self {
            max_horizontal_translation: 0.2,
            max_vertical_translation: 0.1,
            max_axis_deviation: 0.05,
        }
    }
}

impl SanityBounds {
    /// True when `t` is a plausible refinement. All bounds are strict.
    pub fn admits(&self, t: &Matrix4<f64>) -> bool {
        for i in 0..2 {
            if t[(i, 3)].abs() >= self.max_horizontal_translation {
                return false;
            }
        }
        if t[(2, 3)].abs() >= self.max_vertical_translation {
            return false;
        }

        // Row i of the rotation dotted with world axis i is R_ii.
        for i in 0..3 {
            let deviation = t[(i, i)].abs().min(1.0).acos();
            if deviation.is_nan() || deviation >= self.max_axis_deviation {
                return false;
            }
        }
        true
    }
}

/// Fixed-capacity window over the most recent accumulated transforms.
///
/// Pushing into a full history evicts the oldest entry first.
#[derive(Debug, Clone)]
pub struct TransformHistory {
    entries: VecDeque<Matrix4<f64>>,
    capacity: usize,
}

impl TransformHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append `t`, returning the evicted oldest entry when the history was full.
    pub fn push(&mut self, t: Matrix4<f64>) -> Option<Matrix4<f64>> {
        if self.capacity == 0 {
            return Some(t);
        }
        let evicted = if self.is_full() {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(t);
        evicted
    }

    pub fn oldest(&self) -> Option<&Matrix4<f64>> {
        self.entries.front()
    }

    pub fn newest(&self) -> Option<&Matrix4<f64>> {
        self.entries.back()
    }

    /// Mean Frobenius distance from `current` to every stored transform.
    pub fn mean_distance(&self, current: &Matrix4<f64>) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let total: f64 = self
            .entries
            .iter()
            .map(|m| frobenius_distance(current, m))
            .sum();
        Some(total / self.entries.len() as f64)
    }

    /// Full and every stored transform within `epsilon` of `current` on average.
    pub fn has_settled(&self, current: &Matrix4<f64>, epsilon: f64) -> bool {
        self.is_full()
            && self
                .mean_distance(current)
                .map(|d| d < epsilon)
                .unwrap_or(false)
    }
}
