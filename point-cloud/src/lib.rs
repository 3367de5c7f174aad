//! Point cloud operations used by the fusion pipeline.
//!
//! - [`filtering`]: occupied-cell downsampling and statistical outlier removal
//! - [`window`]: mean/sigma bounding windows and cropping
//! - [`normals`]: PCA normals and curvature from k-nearest neighbors
//! - [`spatial`]: R-tree nearest-neighbor index
//!
//! All per-point work runs on the global Rayon pool.

pub mod filtering;
pub mod normals;
pub mod spatial;
pub mod window;

pub use filtering::{remove_statistical_outliers, uniform_down_sample};
pub use normals::{estimate_normals, SurfaceFeatures};
pub use spatial::{KnnIndex, Neighbor};
pub use window::BoundingWindow;

pub use sj_core::{Error, PointCloud, Result};
