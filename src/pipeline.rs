use std::path::PathBuf;

use tracing::{debug, info};

use crate::{
    backend::{ComputeBackend, KernelPipeline, KernelSource},
    config::RunConfig,
    convert::{Rgba8Frame, to_rgba8},
    dispatch::{DispatchStats, OutputSurface, dispatch},
    error::RandomartResult,
    readback::readback,
    sink::write_png,
    workgroup::WorkgroupGeometry,
};

#[derive(Clone, Debug)]
pub struct RunReport {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub adapter: String,
    pub geometry: WorkgroupGeometry,
    pub stats: DispatchStats,
}

/// Dispatch `kernel` over a `width` x `height` surface and return the
/// converted RGBA8 pixels. Nothing is written to disk.
pub fn render_frame(
    backend: &ComputeBackend,
    kernel: &KernelPipeline,
    width: u32,
    height: u32,
) -> RandomartResult<(Rgba8Frame, DispatchStats)> {
    let surface = OutputSurface::create(backend, width, height)?;
    let stats = dispatch(backend, kernel, &surface)?;
    let floats = readback(backend, &surface)?;
    let frame = to_rgba8(floats)?;
    Ok((frame, stats))
}

/// Run the whole pipeline once: kernel load, device acquisition, dispatch,
/// readback, conversion and PNG export. Either a complete PNG is written or
/// the output path is left untouched.
#[tracing::instrument(skip(config), fields(output = %config.output_path().display()))]
pub fn run(config: &RunConfig) -> RandomartResult<RunReport> {
    config.validate()?;
    debug!(source = ?config.source, width = config.width, height = config.height, "run configuration");

    let source = KernelSource::load(&config.kernel_path, &config.entry_point)?;
    let backend = ComputeBackend::acquire()?;
    info!(adapter = backend.adapter_name(), "gpu device acquired");

    let kernel = backend.load_pipeline(&source, config.execution_width)?;
    debug!(entry = %kernel.entry_point, "kernel pipeline ready");
    let (frame, stats) = render_frame(&backend, &kernel, config.width, config.height)?;
    debug!(bytes = frame.data.len(), "frame converted");

    let output_path = config.output_path();
    write_png(&frame, &output_path)?;

    Ok(RunReport {
        output_path,
        width: frame.width,
        height: frame.height,
        adapter: backend.adapter_name().to_string(),
        geometry: kernel.geometry,
        stats,
    })
}
