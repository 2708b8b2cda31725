use super::{StreamGeometry, VideoReader};
use anyhow::{anyhow, Result};
use opencv::{
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH, CAP_PROP_HW_ACCELERATION, VIDEO_ACCELERATION_ANY,
    },
};

const FALLBACK_FPS: f64 = 30.0;

pub struct OpencvReader {
    capture: VideoCapture,
    geometry: StreamGeometry,
    total_frames: Option<u64>,
}

impl OpencvReader {
    pub fn new(path: &str) -> Result<Self> {
        let mut capture = VideoCapture::from_file(path, CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open video file: {}", path));
        }

        // Hardware decoding when the backend offers it; ignored otherwise
        if let Ok(enabled) = capture.set(CAP_PROP_HW_ACCELERATION, VIDEO_ACCELERATION_ANY as f64)
        {
            tracing::debug!("OpencvReader: hardware acceleration enabled={}", enabled);
        }

        let mut fps = capture.get(CAP_PROP_FPS)?;
        if !fps.is_finite() || fps <= 0.0 {
            tracing::warn!(
                "OpencvReader: Failed to get FPS from metadata, falling back to {}",
                FALLBACK_FPS
            );
            fps = FALLBACK_FPS;
        }
        let width = capture.get(CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(CAP_PROP_FRAME_HEIGHT)? as u32;
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?;
        let total_frames = (raw_count > 0.0).then_some(raw_count as u64);

        tracing::info!(
            "OpencvReader: opened {}, {}x{}, fps={:.2}, stream_frames={:?}",
            path,
            width,
            height,
            fps,
            total_frames
        );

        Ok(Self {
            capture,
            geometry: StreamGeometry { width, height, fps },
            total_frames,
        })
    }
}

impl VideoReader for OpencvReader {
    fn geometry(&self) -> StreamGeometry {
        self.geometry
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.total_frames
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Ok(None);
        }

        Ok(Some(frame))
    }
}

impl Drop for OpencvReader {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvReader: failed to release capture: {}", e);
        }
    }
}
