use crate::pipeline::error::PipelineError;
use crate::pipeline::parking::{OccupancyDetector, ParkingManager};
use crate::pipeline::stats::{OccupancyAccumulator, OccupancyStats};
use crate::pipeline::types::{PipelineConfig, ProcessedVideo};
use crate::video::opencv_reader::OpencvReader;
use crate::video::opencv_writer::OpencvWriter;
use crate::video::{VideoReader, VideoSink};
use anyhow::{anyhow, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct SessionSummary {
    pub frames: u64,
    pub stats: OccupancyStats,
    pub duration: Duration,
}

/// Owns the decoder and encoder of one run. Dropping the session releases both.
pub struct VideoSession<R: VideoReader, S: VideoSink> {
    pub reader: R,
    pub sink: S,
    pub pb: ProgressBar,
    pub start_time: Instant,
}

impl<R: VideoReader, S: VideoSink> VideoSession<R, S> {
    pub fn new(reader: R, sink: S, progress: &MultiProgress) -> Result<Self> {
        let input = reader.geometry();
        let output = sink.geometry();
        if input.width != output.width || input.height != output.height {
            return Err(PipelineError::FrameSizeMismatch {
                expected_width: input.width,
                expected_height: input.height,
                actual_width: output.width,
                actual_height: output.height,
            }
            .into());
        }

        let pb = match reader.frame_count_hint() {
            Some(total) => {
                let pb = ProgressBar::new(total);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} fps, {eta})")?
                        .progress_chars("#>-"),
                );
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        let pb = progress.add(pb);

        Ok(Self {
            reader,
            sink,
            pb,
            start_time: Instant::now(),
        })
    }

    /// Runs every remaining frame through `detector` and into the sink.
    ///
    /// A decode error ends the stream like end-of-file does. A detector or
    /// sink error aborts the run; both handles are released either way.
    pub fn run<D>(mut self, detector: &mut D) -> Result<SessionSummary>
    where
        D: OccupancyDetector + ?Sized,
    {
        let mut acc = OccupancyAccumulator::new();

        loop {
            let frame = match self.reader.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        "Decode failed after {} frames, ending stream: {}",
                        acc.frames(),
                        e
                    );
                    break;
                }
            };

            let result = detector.process(&frame)?;
            acc.record(result.counts);
            self.sink.write_frame(&result.image)?;
            self.pb.inc(1);
        }

        self.sink.finish()?;
        self.pb.finish_and_clear();

        Ok(SessionSummary {
            frames: acc.frames(),
            stats: acc.finish(),
            duration: self.start_time.elapsed(),
        })
    }
}

/// `<output_dir>/output_<input file name>`
pub fn derive_output_path(input_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = input_path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid input video path: {:?}", input_path))?;
    Ok(output_dir.join(format!("output_{}", name)))
}

/// Annotates `input_path` with parking occupancy and reports averaged stats.
pub fn process_video(input_path: &Path, config: &PipelineConfig) -> Result<ProcessedVideo> {
    process_video_with(input_path, config, || ParkingManager::new(&config.occupancy))
}

/// `process_video` with the occupancy collaborator built by `init_detector`.
///
/// The collaborator is built even when the input cannot be opened, so a
/// broken model or layout is always reported.
pub fn process_video_with<D, F>(
    input_path: &Path,
    config: &PipelineConfig,
    init_detector: F,
) -> Result<ProcessedVideo>
where
    D: OccupancyDetector,
    F: FnOnce() -> Result<D>,
{
    let output_path = derive_output_path(input_path, &config.output_dir)?;
    let path_str = input_path
        .to_str()
        .ok_or_else(|| anyhow!("Invalid input video path: {:?}", input_path))?;

    let reader = match OpencvReader::new(path_str) {
        Ok(reader) => reader,
        Err(e) => {
            init_detector()?;
            if config.reject_empty_input {
                tracing::error!("Cannot open {:?}: {}", input_path, e);
                return Err(PipelineError::NoFramesDecoded(input_path.to_path_buf()).into());
            }
            tracing::warn!(
                "Cannot open {:?}, returning empty stats: {}",
                input_path,
                e
            );
            return Ok(ProcessedVideo {
                output_path,
                frames: 0,
                stats: OccupancyStats::default(),
            });
        }
    };

    let sink = OpencvWriter::create(&output_path, reader.geometry(), config.fourcc)?;
    let session = VideoSession::new(reader, sink, &config.progress)?;
    let mut detector = init_detector()?;

    let summary = session.run(&mut detector)?;
    finish_run(input_path, output_path, summary, config.reject_empty_input)
}

fn finish_run(
    input_path: &Path,
    output_path: PathBuf,
    summary: SessionSummary,
    reject_empty_input: bool,
) -> Result<ProcessedVideo> {
    if summary.frames == 0 {
        if reject_empty_input {
            return Err(PipelineError::NoFramesDecoded(input_path.to_path_buf()).into());
        }
        tracing::warn!("No frames decoded from {:?}", input_path);
    }

    tracing::info!(
        "Processed {:?} -> {:?}: {} frames in {:.2}s, total={} available={} occupied={}",
        input_path,
        output_path,
        summary.frames,
        summary.duration.as_secs_f64(),
        summary.stats.total_slots,
        summary.stats.available_slots,
        summary.stats.occupied_slots
    );

    Ok(ProcessedVideo {
        output_path,
        frames: summary.frames,
        stats: summary.stats,
    })
}
