use std::path::PathBuf;
use thiserror::Error;

/// Pipeline failures a caller may want to tell apart.
/// They travel inside `anyhow::Error` and can be recovered with `downcast_ref`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no frames could be decoded from {0:?}")]
    NoFramesDecoded(PathBuf),

    #[error("failed to open video sink at {0:?}")]
    SinkUnavailable(PathBuf),

    #[error("annotated frame is {actual_width}x{actual_height}, sink expects {expected_width}x{expected_height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("invalid fourcc {0:?}: expected exactly four ASCII characters")]
    InvalidFourcc(String),

    #[error("video sink already finished")]
    SinkFinished,
}
