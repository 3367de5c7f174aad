//! File I/O for scanjoin
//!
//! - PLY point clouds (fused models and raw scans)
//! - Binary pose prior files
//! - Per-scan and cumulative transform logs
//! - Scan sources over memory or a directory of PLY files

pub mod ply;
pub mod pose;
pub mod scan;
pub mod transform_log;

pub use ply::{read_ply, read_ply_file, write_ply, write_ply_file};
pub use pose::{read_pose_file, read_poses, write_pose_file, write_poses};
pub use scan::{raw_scan_from_cloud, MemoryScanSource, PlyScanDirectory, ScanRecord, ScanSource};
pub use transform_log::{TransformLog, CUMULATIVE_LOG};

pub use sj_core::{Error, Result};
