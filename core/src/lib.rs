//! Shared types for the scanjoin crates: colored point clouds, raw scans,
//! pose priors, rigid transform helpers, the error type and the global
//! worker pool.

pub mod error;
pub mod point_cloud;
pub mod runtime;
pub mod scan;
pub mod transform;

pub use error::{Error, Result};
pub use point_cloud::{PointCloud, Rgb};
pub use runtime::{current_cpu_threads, init_global_thread_pool};
pub use scan::{PosePrior, RawPoint, RawScan};
pub use transform::RigidTransform;
