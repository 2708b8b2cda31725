use crate::cli::Args;
use crate::pipeline::stats::OccupancyStats;
use crate::video::opencv_writer::parse_fourcc;
use anyhow::Result;
use indicatif::MultiProgress;
use opencv::core::Mat;
use serde::Serialize;
use std::path::PathBuf;

/// Slot counts reported for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotCounts {
    pub free: u32,
    pub total: u32,
}

/// What the occupancy collaborator hands back for one frame
pub struct FrameResult {
    /// Annotated copy of the frame, same size as the input
    pub image: Mat,
    pub counts: Option<SlotCounts>,
}

/// Settings for the occupancy collaborator, built once at startup
#[derive(Debug, Clone)]
pub struct OccupancyConfig {
    pub model_path: PathBuf,
    pub layout_path: PathBuf,
    pub min_conf: f32,
    /// Class names that may occupy a slot. Empty accepts every class.
    pub classes: Vec<String>,
    /// Labels of the model outputs in order. Empty means COCO-80.
    pub class_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub fourcc: [char; 4],
    pub reject_empty_input: bool,
    pub occupancy: OccupancyConfig,
    /// Draw target every run adds its progress bar to
    pub progress: MultiProgress,
}

impl PipelineConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        Ok(Self {
            output_dir: args.resolved_upload_dir(),
            fourcc: parse_fourcc(&args.fourcc)?,
            reject_empty_input: args.reject_empty_input,
            progress: MultiProgress::new(),
            occupancy: OccupancyConfig {
                model_path: args.model_path.clone(),
                layout_path: args.layout_path.clone(),
                min_conf: args.min_conf,
                classes: args.classes.clone(),
                class_names: args.class_names.clone(),
            },
        })
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedVideo {
    pub output_path: PathBuf,
    pub frames: u64,
    pub stats: OccupancyStats,
}
