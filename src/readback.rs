//! GPU-to-host copy of the output surface.

use crate::{
    backend::ComputeBackend,
    dispatch::{OutputSurface, SURFACE_BYTES_PER_PIXEL},
    error::{RandomartError, RandomartResult},
};

/// Host copy of the surface: `width * height * 4` floats, RGBA, row-major,
/// row stride `width * 16` bytes with no trailing padding.
#[derive(Clone, Debug, PartialEq)]
pub struct HostFloatBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl HostFloatBuffer {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> RandomartResult<Self> {
        let expected = float_len(width, height)?;
        if data.len() != expected {
            return Err(RandomartError::validation(format!(
                "float buffer holds {} values, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn row_stride_bytes(&self) -> usize {
        self.width as usize * SURFACE_BYTES_PER_PIXEL as usize
    }
}

pub(crate) fn float_len(width: u32, height: u32) -> RandomartResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| RandomartError::validation("pixel buffer size overflow"))
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Mappable copy target. Unmapped on drop, whether or not the read succeeded.
struct StagingBuffer {
    buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    mapped: bool,
}

impl StagingBuffer {
    fn new(backend: &ComputeBackend, width: u32, height: u32) -> RandomartResult<Self> {
        let bytes_per_row = width
            .checked_mul(SURFACE_BYTES_PER_PIXEL)
            .ok_or_else(|| RandomartError::gpu("readback row size overflow"))?;
        let padded_bytes_per_row = align_to(bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let size = u64::from(padded_bytes_per_row)
            .checked_mul(u64::from(height))
            .ok_or_else(|| RandomartError::gpu("readback buffer size overflow"))?;
        let max = backend.device().limits().max_buffer_size;
        if size > max {
            return Err(RandomartError::gpu(format!(
                "readback buffer of {size} bytes exceeds device limit of {max}"
            )));
        }

        let buffer = backend.with_error_scope(
            |e| RandomartError::gpu(format!("readback buffer allocation failed: {e}")),
            || {
                backend.device().create_buffer(&wgpu::BufferDescriptor {
                    label: Some("randomart_readback"),
                    size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            },
        )?;

        Ok(Self {
            buffer,
            padded_bytes_per_row,
            mapped: false,
        })
    }

    fn map_blocking(&mut self, backend: &ComputeBackend) -> RandomartResult<()> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |res| {
                let _ = tx.send(res);
            });
        backend
            .device()
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RandomartError::gpu(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| RandomartError::gpu("readback channel closed"))?
            .map_err(|e| RandomartError::gpu(format!("readback map failed: {e:?}")))?;
        self.mapped = true;
        Ok(())
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if self.mapped {
            self.buffer.unmap();
        }
        self.buffer.destroy();
    }
}

/// Copy the full surface into host memory and strip the row padding the copy
/// alignment forces on the staging buffer.
#[tracing::instrument(skip_all, fields(width = surface.width, height = surface.height))]
pub fn readback(
    backend: &ComputeBackend,
    surface: &OutputSurface,
) -> RandomartResult<HostFloatBuffer> {
    let (width, height) = (surface.width, surface.height);
    let mut staging = StagingBuffer::new(backend, width, height)?;

    let mut encoder = backend
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("randomart_readback_encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &surface.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging.buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(staging.padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    backend.with_error_scope(
        |e| RandomartError::gpu(format!("readback copy failed: {e}")),
        || backend.queue().submit(Some(encoder.finish())),
    )?;

    staging.map_blocking(backend)?;

    let mut data = Vec::with_capacity(float_len(width, height)?);
    {
        let mapped = staging.buffer.slice(..).get_mapped_range();
        let row_bytes = width as usize * SURFACE_BYTES_PER_PIXEL as usize;
        let padded = staging.padded_bytes_per_row as usize;
        for row in 0..height as usize {
            let start = row * padded;
            data.extend_from_slice(bytemuck::cast_slice::<u8, f32>(
                &mapped[start..start + row_bytes],
            ));
        }
    }

    HostFloatBuffer::new(width, height, data)
}
