use std::path::{Path, PathBuf};

use crate::error::{RandomartError, RandomartResult};

pub const DEFAULT_OUTPUT_DIR: &str = "data/images";
pub const DEFAULT_OUTPUT_NAME: &str = "randomart.png";
pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 1024;
pub const DEFAULT_KERNEL_PATH: &str = "kernels/art_gen.wgsl";
pub const DEFAULT_ENTRY_POINT: &str = "art_gen";
/// SIMD width of most desktop GPUs; wgpu does not report one per pipeline.
pub const DEFAULT_EXECUTION_WIDTH: u32 = 32;

/// Where a [`RunConfig`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    ExplicitArgs,
    HardcodedDefaults,
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub source: ConfigSource,
    /// Directory the output is written into. Must already exist.
    pub output_dir: PathBuf,
    /// Output file name relative to `output_dir`, used exactly as given.
    pub output_name: PathBuf,
    pub width: u32,
    pub height: u32,
    pub kernel_path: PathBuf,
    pub entry_point: String,
    pub execution_width: u32,
}

impl RunConfig {
    /// Output name and dimensions supplied by the caller; the name is placed
    /// under [`DEFAULT_OUTPUT_DIR`] unless [`RunConfig::with_output_dir`] says otherwise.
    pub fn explicit(output_name: impl AsRef<Path>, width: u32, height: u32) -> Self {
        Self {
            source: ConfigSource::ExplicitArgs,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_name: output_name.as_ref().to_path_buf(),
            width,
            height,
            kernel_path: PathBuf::from(DEFAULT_KERNEL_PATH),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            execution_width: DEFAULT_EXECUTION_WIDTH,
        }
    }

    pub fn hardcoded() -> Self {
        Self {
            source: ConfigSource::HardcodedDefaults,
            ..Self::explicit(DEFAULT_OUTPUT_NAME, DEFAULT_WIDTH, DEFAULT_HEIGHT)
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }

    pub fn with_kernel(mut self, path: impl Into<PathBuf>, entry_point: impl Into<String>) -> Self {
        self.kernel_path = path.into();
        self.entry_point = entry_point.into();
        self
    }

    pub fn with_execution_width(mut self, execution_width: u32) -> Self {
        self.execution_width = execution_width;
        self
    }

    pub fn validate(&self) -> RandomartResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RandomartError::validation(
                "image width/height must be non-zero",
            ));
        }
        if self.execution_width == 0 {
            return Err(RandomartError::validation(
                "execution width must be non-zero",
            ));
        }
        if self.entry_point.trim().is_empty() {
            return Err(RandomartError::validation(
                "kernel entry point must not be empty",
            ));
        }
        if self.output_name.is_absolute() || self.output_name.has_root() {
            return Err(RandomartError::validation(format!(
                "output name '{}' must be relative to the output directory",
                self.output_name.display()
            )));
        }
        if self.output_name.file_name().is_none() {
            return Err(RandomartError::validation(format!(
                "output name '{}' has no file name",
                self.output_name.display()
            )));
        }
        Ok(())
    }
}
