use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scanjoin::io::{read_ply_file, write_ply_file, write_pose_file};
use scanjoin::{join_directory, Error, PointCloud, PosePrior, RunConfig, RunMode};

/// Box-shaped room seen from its center, in the sensor frame.
fn room_scan(seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cloud = PointCloud::new();
    for _ in 0..6000 {
        let u: f32 = rng.gen_range(-2.0..2.0);
        let v: f32 = rng.gen_range(-2.0..2.0);
        let h: f32 = rng.gen_range(0.0..2.5);
        let p = match rng.gen_range(0..5) {
            0 => Point3::new(u, v, 0.0),
            1 => Point3::new(-2.0, u, h),
            2 => Point3::new(2.0, u, h),
            3 => Point3::new(u, -2.0, h),
            _ => Point3::new(u, 2.0, h),
        };
        cloud.push(p, [100, 150, 200]);
    }
    cloud
}

#[test]
fn test_join_directory_writes_model() {
    let dir = tempfile::tempdir().unwrap();
    let scans = dir.path().join("scans");
    std::fs::create_dir_all(&scans).unwrap();
    for k in 0..3 {
        write_ply_file(scans.join(format!("scan_{:03}.ply", k)), &room_scan(k)).unwrap();
    }

    let yaw = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.01).into_inner();
    let poses = vec![
        PosePrior::identity(),
        PosePrior::new(yaw, Vector3::new(0.02, 0.0, 0.0)),
        PosePrior::new(Matrix3::zeros(), Vector3::zeros()),
    ];
    let pose_path = dir.path().join("final_0.dat");
    write_pose_file(&pose_path, &poses).unwrap();

    let config = RunConfig {
        mode: RunMode::Redo,
        transform_dir: dir.path().join("transforms"),
        model_path: dir.path().join("model.ply"),
        ..RunConfig::default()
    };

    let (model, report) = join_directory(&scans, &pose_path, config).unwrap();

    assert_eq!(report.scans.len(), 3);
    assert!(report.worker_threads >= 1);
    assert_eq!(report.scans[0].name, "scan_000");
    assert!(!model.is_empty());
    let written = read_ply_file(dir.path().join("model.ply")).unwrap();
    assert_eq!(written.len(), model.len());
    assert!(written.colors.iter().all(|c| *c == [100, 150, 200]));
}

#[test]
fn test_missing_inputs_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let result = join_directory(
        dir.path().join("no_scans"),
        dir.path().join("no_poses.dat"),
        RunConfig::default(),
    );
    assert!(matches!(result, Err(Error::MissingFile(_))));

    std::fs::create_dir_all(dir.path().join("scans")).unwrap();
    let result = join_directory(
        dir.path().join("scans"),
        dir.path().join("no_poses.dat"),
        RunConfig::default(),
    );
    assert!(matches!(result, Err(Error::MissingFile(_))));
}

#[test]
fn test_thread_pool_init_is_idempotent() {
    let first = scanjoin::init_thread_pool(Some(2)).ok();
    assert_eq!(scanjoin::init_thread_pool(Some(3)).ok(), first);
}
