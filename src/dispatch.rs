use std::time::{Duration, Instant};

use tracing::debug;

use crate::{
    backend::{ComputeBackend, KernelPipeline},
    error::{RandomartError, RandomartResult},
    workgroup::GridSize,
};

pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Four `f32` channels.
pub const SURFACE_BYTES_PER_PIXEL: u32 = 16;

/// Device-resident RGBA32F image written by the kernel and read back once.
pub struct OutputSurface {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct DispatchStats {
    pub grid: GridSize,
    pub elapsed: Duration,
}

impl DispatchStats {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

impl OutputSurface {
    pub fn create(backend: &ComputeBackend, width: u32, height: u32) -> RandomartResult<Self> {
        if width == 0 || height == 0 {
            return Err(RandomartError::validation(
                "output surface width/height must be non-zero",
            ));
        }
        let max_dim = backend.device().limits().max_texture_dimension_2d;
        if width > max_dim || height > max_dim {
            return Err(RandomartError::gpu(format!(
                "output surface {width}x{height} exceeds device limit of {max_dim}"
            )));
        }

        let texture = backend.with_error_scope(
            |e| RandomartError::gpu(format!("output surface allocation failed: {e}")),
            || {
                backend.device().create_texture(&wgpu::TextureDescriptor {
                    label: Some("randomart_output_surface"),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: SURFACE_FORMAT,
                    usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                })
            },
        )?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }
}

/// Encode one dispatch covering the whole surface, submit it and block until
/// the device reports completion. There is no timeout: a device that never
/// finishes hangs the caller.
///
/// The returned time brackets the dispatch, submission and wait. It is for
/// reporting only.
#[tracing::instrument(skip_all, fields(width = surface.width, height = surface.height))]
pub fn dispatch(
    backend: &ComputeBackend,
    kernel: &KernelPipeline,
    surface: &OutputSurface,
) -> RandomartResult<DispatchStats> {
    let device = backend.device();
    let grid = kernel.geometry.checked_grid_for(
        surface.width,
        surface.height,
        backend.group_limits(),
    )?;
    debug!(grid_x = grid.x, grid_y = grid.y, "dispatch grid");

    let bind_group = backend.with_error_scope(
        |e| {
            RandomartError::kernel(format!(
                "output surface does not match the kernel's binding 0: {e}"
            ))
        },
        || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("randomart_output_bg"),
                layout: &kernel.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&surface.view),
                }],
            })
        },
    )?;

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("randomart_dispatch_encoder"),
    });

    let start = Instant::now();
    backend.with_error_scope(
        |e| RandomartError::gpu(format!("kernel dispatch failed: {e}")),
        || {
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("randomart_dispatch"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&kernel.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(grid.x, grid.y, grid.z);
            }
            backend.queue().submit(Some(encoder.finish()));
        },
    )?;
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| RandomartError::gpu(format!("wgpu poll failed: {e:?}")))?;
    let elapsed = start.elapsed();

    debug!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "dispatch complete");
    Ok(DispatchStats { grid, elapsed })
}
