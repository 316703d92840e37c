//! GPU end-to-end tests. Each test returns early when no adapter is available.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use randomart_gpu::{
    ComputeBackend, KernelSource, RandomartError, RunConfig, render_frame, run,
};

fn gpu_test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("gpu_pipeline").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn constant_kernel(rgba: [f32; 4]) -> String {
    format!(
        r#"
override group_w: u32 = 8u;
override group_h: u32 = 8u;

@group(0) @binding(0) var out_tex: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(group_w, group_h, 1)
fn art_gen(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let dims = textureDimensions(out_tex);
    if (gid.x >= dims.x || gid.y >= dims.y) {{
        return;
    }}
    textureStore(out_tex, vec2<i32>(gid.xy), vec4<f32>({:?}, {:?}, {:?}, {:?}));
}}
"#,
        rgba[0], rgba[1], rgba[2], rgba[3]
    )
}

fn write_kernel(dir: &Path, wgsl: &str) -> PathBuf {
    let path = dir.join("kernel.wgsl");
    std::fs::write(&path, wgsl).unwrap();
    path
}

fn backend_or_skip() -> Option<ComputeBackend> {
    match ComputeBackend::acquire() {
        Ok(b) => Some(b),
        Err(RandomartError::NoDevice(msg)) => {
            eprintln!("skipping gpu test: {msg}");
            None
        }
        Err(e) => panic!("unexpected gpu init error: {e}"),
    }
}

fn run_or_skip(cfg: &RunConfig) -> Option<randomart_gpu::RunReport> {
    match run(cfg) {
        Ok(r) => Some(r),
        Err(RandomartError::NoDevice(msg)) => {
            eprintln!("skipping gpu test: {msg}");
            None
        }
        Err(e) => panic!("unexpected pipeline error: {e}"),
    }
}

#[test]
fn constant_red_kernel_writes_red_png() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("red");
    let kernel = write_kernel(&dir, &constant_kernel([1.0, 0.0, 0.0, 1.0]));

    let cfg = RunConfig::explicit("t.png", 4, 4)
        .with_output_dir(&dir)
        .with_kernel(&kernel, "art_gen");
    let Some(report) = run_or_skip(&cfg) else {
        return;
    };

    assert_eq!((report.width, report.height), (4, 4));
    assert!(report.geometry.threads() >= 1);

    let img = image::open(dir.join("t.png")).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (4, 4));
    assert!(img.pixels().all(|p| p.0 == [255, 0, 0, 255]));
}

#[test]
fn half_intensity_kernel_truncates_to_127() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("half");
    let kernel = write_kernel(&dir, &constant_kernel([0.5, 0.5, 0.5, 0.5]));

    let cfg = RunConfig::explicit("half.png", 4, 4)
        .with_output_dir(&dir)
        .with_kernel(&kernel, "art_gen");
    if run_or_skip(&cfg).is_none() {
        return;
    }

    let img = image::open(dir.join("half.png")).unwrap().to_rgba8();
    assert!(img.pixels().all(|p| p.0 == [127, 127, 127, 127]));
}

#[test]
fn odd_sizes_are_fully_covered() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("odd");
    let kernel = write_kernel(&dir, &constant_kernel([0.0, 1.0, 0.0, 1.0]));
    let Some(backend) = backend_or_skip() else {
        return;
    };

    let source = KernelSource::load(&kernel, "art_gen").unwrap();
    let pipeline = backend.load_pipeline(&source, 8).unwrap();

    for (w, h) in [(1u32, 1u32), (513, 3), (7, 33)] {
        let (frame, stats) = render_frame(&backend, &pipeline, w, h).unwrap();
        assert_eq!(frame.data.len(), (w * h * 4) as usize);
        assert!(stats.grid.x * pipeline.geometry.width >= w);
        assert!(stats.grid.y * pipeline.geometry.height >= h);
        assert!(frame.data.chunks_exact(4).all(|px| px == [0, 255, 0, 255]));
    }
}

#[test]
fn missing_entry_point_is_a_kernel_error() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("no_entry");
    let kernel = write_kernel(&dir, &constant_kernel([1.0, 1.0, 1.0, 1.0]));
    let Some(backend) = backend_or_skip() else {
        return;
    };

    let source = KernelSource::load(&kernel, "does_not_exist").unwrap();
    let err = backend.load_pipeline(&source, 32).err().unwrap();
    assert!(matches!(err, RandomartError::Kernel(_)), "{err}");
}

#[test]
fn malformed_module_is_a_kernel_error() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("malformed");
    let kernel = write_kernel(&dir, "fn art_gen( {");
    let Some(backend) = backend_or_skip() else {
        return;
    };

    let source = KernelSource::load(&kernel, "art_gen").unwrap();
    let err = backend.load_pipeline(&source, 32).err().unwrap();
    assert!(matches!(err, RandomartError::Kernel(_)), "{err}");
}

#[test]
fn bundled_kernel_renders_opaque_image() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("bundled");

    let cfg = RunConfig::explicit("art.png", 33, 17).with_output_dir(&dir);
    let Some(report) = run_or_skip(&cfg) else {
        return;
    };

    let img = image::open(&report.output_path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (33, 17));
    assert!(img.pixels().all(|p| p.0[3] == 255));
}

#[test]
fn missing_output_directory_leaves_nothing_behind() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("no_out_dir");
    let kernel = write_kernel(&dir, &constant_kernel([1.0, 0.0, 0.0, 1.0]));
    let out_dir = dir.join("absent");

    let cfg = RunConfig::explicit("t.png", 4, 4)
        .with_output_dir(&out_dir)
        .with_kernel(&kernel, "art_gen");
    match run(&cfg) {
        Err(RandomartError::NoDevice(_)) => {}
        Err(RandomartError::Encode(_)) => assert!(!out_dir.exists()),
        other => panic!("expected encode error, got {other:?}"),
    }
}

#[test]
fn backend_recovers_after_kernel_error() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let dir = scratch_dir("recover_after_error");
    let broken = write_kernel(&dir, "fn art_gen( {");
    let Some(backend) = backend_or_skip() else {
        return;
    };

    let source = KernelSource::load(&broken, "art_gen").unwrap();
    assert!(backend.load_pipeline(&source, 32).is_err());

    let good = dir.join("good.wgsl");
    std::fs::write(&good, constant_kernel([0.0, 1.0, 0.0, 1.0])).unwrap();
    let source = KernelSource::load(&good, "art_gen").unwrap();
    let kernel = backend.load_pipeline(&source, 32).unwrap();
    assert_eq!(kernel.entry_point, "art_gen");

    let (frame, _) = render_frame(&backend, &kernel, 3, 2).unwrap();
    assert!(frame.data.chunks_exact(4).all(|px| px == [0, 255, 0, 255]));
}
