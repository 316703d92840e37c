use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::debug;

use crate::{
    error::{RandomartError, RandomartResult},
    workgroup::{GroupLimits, WorkgroupGeometry},
};

/// Device and queue for the lifetime of one run.
pub struct ComputeBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
}

/// Kernel module text read from disk, not yet bound to a device.
#[derive(Clone, Debug)]
pub struct KernelSource {
    pub path: PathBuf,
    pub entry_point: String,
    pub wgsl: String,
}

pub struct KernelPipeline {
    pub(crate) pipeline: wgpu::ComputePipeline,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    pub geometry: WorkgroupGeometry,
    pub entry_point: String,
}

impl KernelSource {
    pub fn load(path: impl AsRef<Path>, entry_point: &str) -> RandomartResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RandomartError::kernel(format!(
                "kernel module '{}' not found",
                path.display()
            )));
        }
        let wgsl = std::fs::read_to_string(path)
            .with_context(|| format!("read kernel module '{}'", path.display()))
            .map_err(|e| RandomartError::kernel(format!("{e:#}")))?;
        if wgsl.trim().is_empty() {
            return Err(RandomartError::kernel(format!(
                "kernel module '{}' is empty",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            entry_point: entry_point.to_string(),
            wgsl,
        })
    }
}

impl ComputeBackend {
    #[tracing::instrument]
    pub fn acquire() -> RandomartResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                RandomartError::no_device("no gpu adapter available")
            }
            other => RandomartError::no_device(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let info = adapter.get_info();
        debug!(adapter = %info.name, backend = ?info.backend, "selected gpu adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("randomart_device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RandomartError::no_device(format!("wgpu request_device failed: {e:?}")))?;

        Ok(Self {
            device,
            queue,
            adapter_name: info.name,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn group_limits(&self) -> GroupLimits {
        GroupLimits::from_limits(&self.device.limits())
    }

    /// Compile `source` and resolve its entry point, specialised to the
    /// workgroup geometry derived from `execution_width` and the device limits.
    #[tracing::instrument(skip(self, source), fields(kernel = %source.path.display(), entry = %source.entry_point))]
    pub fn load_pipeline(
        &self,
        source: &KernelSource,
        execution_width: u32,
    ) -> RandomartResult<KernelPipeline> {
        let geometry = WorkgroupGeometry::derive(execution_width, self.group_limits())?;
        debug!(
            group_w = geometry.width,
            group_h = geometry.height,
            "derived workgroup geometry"
        );

        let module = self.with_error_scope(
            |e| {
                RandomartError::kernel(format!(
                    "kernel module '{}' failed to compile: {e}",
                    source.path.display()
                ))
            },
            || {
                self.device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some("randomart_kernel"),
                        source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
                    })
            },
        )?;

        let constants = geometry.pipeline_constants();
        let pipeline = self.with_error_scope(
            |e| {
                RandomartError::kernel(format!(
                    "pipeline for entry point '{}' could not be created: {e}",
                    source.entry_point
                ))
            },
            || {
                self.device
                    .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some("randomart_kernel_pipeline"),
                        layout: None,
                        module: &module,
                        entry_point: Some(source.entry_point.as_str()),
                        compilation_options: wgpu::PipelineCompilationOptions {
                            constants: &constants,
                            zero_initialize_workgroup_memory: true,
                        },
                        cache: None,
                    })
            },
        )?;

        let bind_group_layout = self.with_error_scope(
            |e| {
                RandomartError::kernel(format!(
                    "entry point '{}' does not bind an output surface at @group(0) @binding(0): {e}",
                    source.entry_point
                ))
            },
            || pipeline.get_bind_group_layout(0),
        )?;

        Ok(KernelPipeline {
            pipeline,
            bind_group_layout,
            geometry,
            entry_point: source.entry_point.clone(),
        })
    }

    /// Run `work` inside validation, out-of-memory and internal error scopes so wgpu
    /// errors come back as values instead of hitting the uncaptured handler.
    pub(crate) fn with_error_scope<T>(
        &self,
        to_error: impl FnOnce(wgpu::Error) -> RandomartError,
        work: impl FnOnce() -> T,
    ) -> RandomartResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Internal);

        let out = work();

        let internal = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory).or(internal) {
            Some(err) => Err(to_error(err)),
            None => Ok(out),
        }
    }
}
