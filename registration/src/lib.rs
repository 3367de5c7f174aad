//! Scan-to-model registration
//!
//! This crate refines the pose of an incoming scan against the fused model:
//! - Feature-space ICP over `[position, normal, curvature]` samples
//! - Point-to-point (Kabsch) or point-to-plane estimation
//! - Overlap gating, sanity bounds, fitness ceiling and convergence history

pub mod registration;

pub use registration::{
    estimate_step, Estimator, FeatureCloud, FeatureIndex, FeatureRepresentation, FeatureVector,
    RegisteredScan, RegistrationEngine, RegistrationOutcome, RegistrationParams, SanityBounds,
    SessionState, SurfacePoint, TransformHistory,
};

pub use sj_core::{Error, Result};
