use thiserror::Error;

use crate::utils::image::ColorModel;

/// Failures a caller may want to tell apart when deciding whether to skip an
/// input or abort. Carried inside `anyhow::Error`; recover it with
/// `err.downcast_ref::<SwapError>()`.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("cannot decode input: {0}")]
    Decode(String),

    #[error("cannot encode output: {0}")]
    Encode(String),

    #[error("animation contains no frames")]
    EmptyAnimation,

    #[error("frame {index} is {found:?}, expected {expected:?}")]
    FrameSizeMismatch {
        index: usize,
        expected: (i32, i32),
        found: (i32, i32),
    },

    #[error("buffer is in {found:?}, expected {expected:?}")]
    ColorModelMismatch {
        expected: ColorModel,
        found: ColorModel,
    },

    #[error("failed to load artwork from {path}: {reason}")]
    ArtworkLoad { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unexpected model output: {0}")]
    ModelOutput(String),

    #[error("blocking detector call on a current-thread async runtime; run it through spawn_blocking")]
    BlockingInAsyncContext,
}
