use crate::layout::BBox;
use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageBuffer, Rgb};
use opencv::core::Mat;
use opencv::prelude::*;
use std::path::Path;
use usls::models::RTDETR;
use usls::{Config, Image};

/// A single model detection in frame pixel coordinates
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_name: Option<String>,
}

/// A wrapper around the USLS RT-DETR model that handles BGR-to-RGB conversion
/// and corrects for aspect-ratio padding bugs in the underlying model library.
pub struct ObjectDetector {
    model: RTDETR,
}

impl ObjectDetector {
    /// Create a new detector with the given model path.
    ///
    /// `class_names` are the labels the model was trained with, in output order.
    /// An empty list means the model uses the COCO-80 labels.
    pub fn new(model_path: &Path, class_names: &[String]) -> Result<Self> {
        let model_file = model_path
            .to_str()
            .ok_or_else(|| anyhow!("Model path is not valid UTF-8: {:?}", model_path))?;
        if !model_path.exists() {
            return Err(anyhow!("Model file not found: {}", model_file));
        }

        let names = label_set(class_names);
        let config = Config::default()
            .with_model_file(model_file)
            .with_class_names(&names);

        #[cfg(target_os = "macos")]
        let config = config.with_model_device(usls::Device::CoreMl);

        let config = config.commit()?;
        let model = RTDETR::new(config)?;
        tracing::info!(
            "Loaded detection model from {} ({} classes)",
            model_file,
            names.len()
        );
        Ok(Self { model })
    }

    /// Run detection on an OpenCV Mat (BGR).
    pub fn detect(&mut self, image: &Mat) -> Result<Vec<Detection>> {
        let dynamic_image = mat_to_dynamic_image(image)?;

        // USLS RT-DETR reports boxes squeezed along the longer side
        let size = image.size()?;
        let img_w = size.width as f32;
        let img_h = size.height as f32;
        let (x_corr, y_corr) = if img_w > img_h {
            (img_w / img_h, 1.0)
        } else if img_h > img_w {
            (1.0, img_h / img_w)
        } else {
            (1.0, 1.0)
        };

        let results = self.model.forward(&[Image::from(dynamic_image)])?;
        let hbbs = results.into_iter().next().map(|y| y.hbbs).unwrap_or_default();

        Ok(hbbs
            .into_iter()
            .map(|hbb| Detection {
                bbox: BBox {
                    x: hbb.xmin() * x_corr,
                    y: hbb.ymin() * y_corr,
                    w: hbb.width() * x_corr,
                    h: hbb.height() * y_corr,
                },
                confidence: hbb.confidence().unwrap_or(0.0),
                class_name: hbb.name().map(|s| s.to_string()),
            })
            .collect())
    }
}

/// Convert an OpenCV Mat (BGR) to an image::DynamicImage (RGB)
fn mat_to_dynamic_image(mat: &Mat) -> Result<DynamicImage> {
    let mut rgb_mat = Mat::default();
    opencv::imgproc::cvt_color_def(mat, &mut rgb_mat, opencv::imgproc::COLOR_BGR2RGB)?;

    let size = rgb_mat.size()?;
    let width = size.width as u32;
    let height = size.height as u32;

    if !rgb_mat.is_continuous() {
        return Err(anyhow!("Mat is not continuous"));
    }

    let buffer = rgb_mat.data_bytes()?.to_vec();

    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_vec(width, height, buffer)
        .ok_or_else(|| anyhow!("Failed to create ImageBuffer from Mat data"))?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}

/// Labels of the model outputs, falling back to COCO-80.
pub fn label_set(class_names: &[String]) -> Vec<&str> {
    if class_names.is_empty() {
        usls::NAMES_COCO_80.to_vec()
    } else {
        class_names.iter().map(String::as_str).collect()
    }
}

/// Entries of `classes` the model can never report.
pub fn unknown_classes<'a>(classes: &'a [String], labels: &[&str]) -> Vec<&'a str> {
    classes
        .iter()
        .map(String::as_str)
        .filter(|c| !labels.contains(c))
        .collect()
}

/// Keep detections above `min_conf`, restricted to `classes` when non-empty.
pub fn filter_detections(
    detections: Vec<Detection>,
    min_conf: f32,
    classes: &[String],
) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= min_conf)
        .filter(|d| {
            classes.is_empty()
                || d
                    .class_name
                    .as_deref()
                    .map(|name| classes.iter().any(|c| c == name))
                    .unwrap_or(false)
        })
        .collect()
}
