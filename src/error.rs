pub type RandomartResult<T> = Result<T, RandomartError>;

#[derive(thiserror::Error, Debug)]
pub enum RandomartError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no gpu device: {0}")]
    NoDevice(String),

    #[error("kernel error: {0}")]
    Kernel(String),

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RandomartError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn no_device(msg: impl Into<String>) -> Self {
        Self::NoDevice(msg.into())
    }

    pub fn kernel(msg: impl Into<String>) -> Self {
        Self::Kernel(msg.into())
    }

    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Environment or deployment defects: no device, unloadable kernel, failed submission.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoDevice(_) | Self::Kernel(_) | Self::Gpu(_))
    }
}
