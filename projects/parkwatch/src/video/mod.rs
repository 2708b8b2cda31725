pub mod opencv_reader;
pub mod opencv_writer;

use anyhow::Result;
use opencv::core::Mat;

/// Frame size and nominal rate of a stream, fixed when the stream is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

pub trait VideoReader: Send {
    fn geometry(&self) -> StreamGeometry;
    /// Frame count reported by the container, if any. Only used for progress.
    fn frame_count_hint(&self) -> Option<u64>;
    /// Returns `Ok(None)` once the stream is exhausted.
    fn read_frame(&mut self) -> Result<Option<Mat>>;
}

pub trait VideoSink: Send {
    fn geometry(&self) -> StreamGeometry;
    fn write_frame(&mut self, frame: &Mat) -> Result<()>;
    /// Flush and release the underlying encoder. Further writes are errors.
    fn finish(&mut self) -> Result<()>;
}
