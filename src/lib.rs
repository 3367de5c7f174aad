pub use sj_core as core;
pub use sj_fusion as fusion;
pub use sj_io as io;
pub use sj_point_cloud as point_cloud;
pub use sj_registration as registration;

pub use sj_core::{Error, PointCloud, PosePrior, Result, RigidTransform};
pub use sj_fusion::{Joiner, RunConfig, RunMode, RunReport};

/// Size the worker pool for all per-point stages and return its thread count.
///
/// Call this once at startup, before any join runs. Repeated calls return the
/// first outcome. `num_threads` wins over `SCANJOIN_CPU_THREADS`.
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<usize> {
    sj_core::init_global_thread_pool(num_threads)
}

/// Run a join over a directory of sensor-frame PLY scans and a pose prior
/// file, as configured by `config`.
pub fn join_directory<P, Q>(scans: P, poses: Q, config: RunConfig) -> Result<(PointCloud, RunReport)>
where
    P: AsRef<std::path::Path>,
    Q: AsRef<std::path::Path>,
{
    let source = sj_io::PlyScanDirectory::open(scans)?;
    let poses = sj_io::read_pose_file(poses)?;
    Joiner::new(config)?.run(&source, &poses)
}
