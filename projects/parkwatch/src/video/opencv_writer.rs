use super::{StreamGeometry, VideoSink};
use crate::pipeline::error::PipelineError;
use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::VideoWriter,
};
use std::path::{Path, PathBuf};

/// Parses a fourcc string such as "mp4v" into its four characters.
pub fn parse_fourcc(code: &str) -> Result<[char; 4], PipelineError> {
    let chars: Vec<char> = code.chars().collect();
    match chars.as_slice() {
        [a, b, c, d] if chars.iter().all(|ch| ch.is_ascii() && !ch.is_ascii_control()) => {
            Ok([*a, *b, *c, *d])
        }
        _ => Err(PipelineError::InvalidFourcc(code.to_string())),
    }
}

/// Encodes frames into a video file through OpenCV's `VideoWriter`.
pub struct OpencvWriter {
    writer: VideoWriter,
    path: PathBuf,
    geometry: StreamGeometry,
    frames_written: u64,
    finished: bool,
}

impl OpencvWriter {
    pub fn create(path: &Path, geometry: StreamGeometry, fourcc: [char; 4]) -> Result<Self> {
        let [a, b, c, d] = fourcc;
        let code = VideoWriter::fourcc(a, b, c, d)?;
        let path_str = path
            .to_str()
            .ok_or_else(|| PipelineError::SinkUnavailable(path.to_path_buf()))?;

        let size = Size::new(geometry.width as i32, geometry.height as i32);
        let writer = VideoWriter::new(path_str, code, geometry.fps, size, true)
            .with_context(|| format!("Failed to create video writer at {:?}", path))?;
        if !writer.is_opened()? {
            return Err(PipelineError::SinkUnavailable(path.to_path_buf()).into());
        }

        tracing::info!(
            "OpencvWriter: writing {:?}, {}x{}, fps={:.2}, fourcc={}{}{}{}",
            path,
            geometry.width,
            geometry.height,
            geometry.fps,
            a,
            b,
            c,
            d
        );

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            geometry,
            frames_written: 0,
            finished: false,
        })
    }
}

impl VideoSink for OpencvWriter {
    fn geometry(&self) -> StreamGeometry {
        self.geometry
    }

    fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        if self.finished {
            return Err(PipelineError::SinkFinished.into());
        }
        let size = frame.size()?;
        if size.width as u32 != self.geometry.width || size.height as u32 != self.geometry.height {
            return Err(PipelineError::FrameSizeMismatch {
                expected_width: self.geometry.width,
                expected_height: self.geometry.height,
                actual_width: size.width as u32,
                actual_height: size.height as u32,
            }
            .into());
        }

        self.writer.write(frame)?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer
            .release()
            .with_context(|| format!("Failed to finalize video at {:?}", self.path))?;
        tracing::debug!(
            "OpencvWriter: closed {:?} after {} frames",
            self.path,
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for OpencvWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.writer.release() {
                tracing::warn!("OpencvWriter: failed to release {:?}: {}", self.path, e);
            }
        }
    }
}
