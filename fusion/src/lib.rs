//! Incremental fusion of scans into one model.
//!
//! - [`preprocess`]: leveling, world transform, two-pass sampling and windows
//! - [`accumulator`]: the global model under a point budget
//! - [`cleanup`]: final statistical outlier removal
//! - [`config`]: serde run configuration
//! - [`pipeline`]: the scan loop tying the stages together

pub mod accumulator;
pub mod cleanup;
pub mod config;
pub mod pipeline;
pub mod preprocess;

pub use accumulator::{FusionAccumulator, FusionParams};
pub use cleanup::{CleanupFilter, CleanupParams};
pub use config::{RunConfig, RunMode};
pub use pipeline::{Joiner, RunReport, ScanDisposition, ScanReport};
pub use preprocess::{leveled_transform, FramePreprocessor, PreparedScan, PreprocessParams};

pub use sj_core::{Error, Result};
