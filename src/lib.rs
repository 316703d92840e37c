#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod readback;
pub mod sink;
pub mod workgroup;

pub use backend::{ComputeBackend, KernelPipeline, KernelSource};
pub use config::{ConfigSource, RunConfig};
pub use convert::{Rgba8Frame, channel_to_u8, to_rgba8};
pub use dispatch::{DispatchStats, OutputSurface, dispatch};
pub use error::{RandomartError, RandomartResult};
pub use pipeline::{RunReport, render_frame, run};
pub use readback::{HostFloatBuffer, readback};
pub use sink::{encode_png, write_png};
pub use workgroup::{GridSize, GroupLimits, WorkgroupGeometry};
