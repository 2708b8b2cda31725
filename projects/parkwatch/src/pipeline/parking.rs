use crate::layout::{ParkingLayout, Point};
use crate::pipeline::detection::{
    filter_detections, label_set, unknown_classes, Detection, ObjectDetector,
};
use crate::pipeline::geometry::{occupied_regions, SlotRegion};
use crate::pipeline::types::{FrameResult, OccupancyConfig, SlotCounts};
use anyhow::{Context, Result};
use opencv::core::{Mat, Point as CvPoint, Rect, Scalar, Vector};
use opencv::imgproc::{
    circle, get_text_size, polylines, put_text, rectangle, FILLED, FONT_HERSHEY_SIMPLEX, LINE_8,
    LINE_AA,
};
use opencv::prelude::*;

const OCCUPIED_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0); // Red
const AVAILABLE_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0); // Green
const CENTER_COLOR: (f64, f64, f64) = (255.0, 0.0, 255.0); // Magenta

fn bgr((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// Turns a raw frame into an annotated frame plus slot counts.
pub trait OccupancyDetector {
    fn process(&mut self, frame: &Mat) -> Result<FrameResult>;
}

/// Blanket implementation so any closure with the right signature
/// automatically implements OccupancyDetector.
impl<F> OccupancyDetector for F
where
    F: FnMut(&Mat) -> Result<FrameResult>,
{
    fn process(&mut self, frame: &Mat) -> Result<FrameResult> {
        self(frame)
    }
}

/// Decides per-slot occupancy from model detections and a slot layout.
pub struct ParkingManager {
    detector: ObjectDetector,
    layout: ParkingLayout,
    regions: Vec<SlotRegion>,
    min_conf: f32,
    classes: Vec<String>,
}

impl ParkingManager {
    pub fn new(config: &OccupancyConfig) -> Result<Self> {
        let layout = ParkingLayout::load(&config.layout_path)?;
        if layout.is_empty() {
            tracing::warn!(
                "Layout {:?} has no slots, frames will carry no counts",
                config.layout_path
            );
        }

        let labels = label_set(&config.class_names);
        let unknown = unknown_classes(&config.classes, &labels);
        if !unknown.is_empty() {
            tracing::warn!("Classes {:?} are not reported by the model", unknown);
        }

        let detector = ObjectDetector::new(&config.model_path, &config.class_names)
            .with_context(|| format!("Failed to load model {:?}", config.model_path))?;
        let regions = layout
            .slots
            .iter()
            .map(|slot| SlotRegion::new(&slot.polygon))
            .collect();

        Ok(Self {
            detector,
            layout,
            regions,
            min_conf: config.min_conf,
            classes: config.classes.clone(),
        })
    }
}

impl OccupancyDetector for ParkingManager {
    fn process(&mut self, frame: &Mat) -> Result<FrameResult> {
        let detections = filter_detections(
            self.detector.detect(frame)?,
            self.min_conf,
            &self.classes,
        );
        let assessment = assess_slots(&self.regions, &detections);
        let image = annotate_frame(frame, &self.layout, &detections, &assessment)?;

        Ok(FrameResult {
            image,
            counts: assessment.counts(),
        })
    }
}

/// Slot occupancy for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SlotAssessment {
    pub occupied: Vec<bool>,
    /// Indices of detections whose centre lies in some slot
    pub parked: Vec<usize>,
}

impl SlotAssessment {
    pub fn counts(&self) -> Option<SlotCounts> {
        if self.occupied.is_empty() {
            return None;
        }
        let total = self.occupied.len() as u32;
        let filled = self.occupied.iter().filter(|o| **o).count() as u32;
        Some(SlotCounts {
            free: total - filled,
            total,
        })
    }
}

pub fn assess_slots(regions: &[SlotRegion], detections: &[Detection]) -> SlotAssessment {
    let centers: Vec<Point> = detections.iter().map(|d| d.bbox.center()).collect();
    let occupied = occupied_regions(regions, &centers);
    let parked = centers
        .iter()
        .enumerate()
        .filter(|(_, c)| regions.iter().any(|r| r.contains_point(**c)))
        .map(|(i, _)| i)
        .collect();

    SlotAssessment { occupied, parked }
}

/// Draws slot polygons, parked vehicles and the occupancy banner on a copy of `frame`.
pub fn annotate_frame(
    frame: &Mat,
    layout: &ParkingLayout,
    detections: &[Detection],
    assessment: &SlotAssessment,
) -> Result<Mat> {
    let mut draw_img = frame.clone();

    // 1. Slot polygons
    for (slot, occupied) in layout.slots.iter().zip(&assessment.occupied) {
        let mut pts_vec = Vector::<CvPoint>::new();
        for p in &slot.polygon {
            pts_vec.push(CvPoint::new(p.x as i32, p.y as i32));
        }
        let mut contours = Vector::<Vector<CvPoint>>::new();
        contours.push(pts_vec);
        let color = if *occupied {
            bgr(OCCUPIED_COLOR)
        } else {
            bgr(AVAILABLE_COLOR)
        };
        polylines(&mut draw_img, &contours, true, color, 2, LINE_8, 0)?;
    }

    // 2. Vehicles that sit in a slot
    for &idx in &assessment.parked {
        let d = &detections[idx];
        let rect = Rect::new(
            d.bbox.x as i32,
            d.bbox.y as i32,
            d.bbox.w as i32,
            d.bbox.h as i32,
        );
        rectangle(&mut draw_img, rect, bgr(OCCUPIED_COLOR), 2, LINE_8, 0)?;

        let c = d.bbox.center();
        circle(
            &mut draw_img,
            CvPoint::new(c.x as i32, c.y as i32),
            4,
            bgr(CENTER_COLOR),
            FILLED,
            LINE_8,
            0,
        )?;
    }

    // 3. Banner
    if let Some(counts) = assessment.counts() {
        let text = format!(
            "Occupancy: {}  Available: {}",
            counts.total - counts.free,
            counts.free
        );
        draw_banner(&mut draw_img, &text)?;
    }

    Ok(draw_img)
}

fn draw_banner(img: &mut Mat, text: &str) -> Result<()> {
    let scale = 0.7;
    let thickness = 2;
    let mut baseline = 0;
    let size = get_text_size(text, FONT_HERSHEY_SIMPLEX, scale, thickness, &mut baseline)?;

    let pad = 8;
    let frame_size = img.size()?;
    let w = (size.width + 2 * pad).min(frame_size.width);
    let h = (size.height + baseline + 2 * pad).min(frame_size.height);
    rectangle(
        img,
        Rect::new(0, 0, w, h),
        Scalar::new(255.0, 255.0, 255.0, 0.0),
        FILLED,
        LINE_8,
        0,
    )?;
    put_text(
        img,
        text,
        CvPoint::new(pad, pad + size.height),
        FONT_HERSHEY_SIMPLEX,
        scale,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
        thickness,
        LINE_AA,
        false,
    )?;
    Ok(())
}
