use anyhow::{Context, Result, anyhow, bail};
use image::{DynamicImage, RgbImage};
use log::debug;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;

use crate::detection::Detector;
use crate::detection::labels::ClassNames;
use crate::detection::nms::NonMaxSuppression;
use crate::detection::preprocessing::{self, Letterbox};
use crate::models::{BoundingBox, RawDetection};

/// Thresholds applied when decoding raw YOLO output
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    pub confidence: f32,
    pub iou: f32,
    pub max_detections: usize,
    /// Class names to keep, empty keeps every class
    pub classes: Vec<String>,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: NonMaxSuppression::DEFAULT_IOU_THRESH,
            max_detections: 300,
            classes: Vec::new(),
        }
    }
}

/// Decode a YOLOv8 head of shape `[1, 4 + nc, anchors]` stored row-major in `data`.
///
/// Each anchor column holds `cx, cy, w, h` in model-input pixels followed by one score per class.
pub fn decode_predictions(
    data: &[f32],
    attrs: usize,
    anchors: usize,
    names: &ClassNames,
    params: &DecodeParams,
    letterbox: &Letterbox,
    image_size: (u32, u32),
) -> Result<Vec<RawDetection>> {
    if attrs <= 4 {
        bail!("model output has {} attributes per box, expected more than 4", attrs);
    }
    if data.len() != attrs * anchors {
        bail!(
            "model output holds {} values, expected {} x {}",
            data.len(),
            attrs,
            anchors
        );
    }

    let at = |attr: usize, anchor: usize| data[attr * anchors + anchor];
    let mut candidates = Vec::new();

    for anchor in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::NEG_INFINITY;
        for class_id in 0..attrs - 4 {
            let score = at(4 + class_id, anchor);
            if score > best_score {
                best_score = score;
                best_class = class_id;
            }
        }

        if best_score < params.confidence {
            continue;
        }

        let class_name = names.name(best_class);
        if !params.classes.is_empty() && !params.classes.iter().any(|c| c == &class_name) {
            continue;
        }

        let model_box =
            BoundingBox::from_center(at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let bbox = letterbox.unmap(&model_box).clamp(image_size.0, image_size.1);

        candidates.push(RawDetection {
            class_id: best_class,
            class_name,
            confidence: best_score,
            bbox,
        });
    }

    Ok(NonMaxSuppression::new(params.iou, params.max_detections).process(candidates))
}

/// YOLOv8 detector backed by an rten model
pub struct YoloDetector {
    name: String,
    model: Model,
    names: ClassNames,
    input_size: u32,
    params: DecodeParams,
}

impl YoloDetector {
    pub fn load(
        path: &Path,
        names: ClassNames,
        input_size: u32,
        params: DecodeParams,
    ) -> Result<Self> {
        let model = Model::load_file(path)
            .with_context(|| format!("failed to load detection model {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo".to_string());

        debug!(
            "Loaded model {} ({} classes, input {}x{})",
            path.display(),
            names.len(),
            input_size,
            input_size
        );

        Ok(Self {
            name,
            model,
            names,
            input_size,
            params,
        })
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.names
    }
}

impl Detector for YoloDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let (canvas, lb) = preprocessing::letterbox(image, self.input_size);
        let size = self.input_size as usize;
        let input = NdTensor::from_data([1, 3, size, size], preprocessing::to_input_tensor(&canvas));

        let output: NdTensor<f32, 3> = self
            .model
            .run_one(input.view().into(), None)
            .context("inference failed")?
            .try_into()
            .map_err(|e| anyhow!("unexpected model output: {:?}", e))?;

        let [_batch, attrs, anchors] = output.shape();
        let data = output.to_vec();

        decode_predictions(
            &data,
            attrs,
            anchors,
            &self.names,
            &self.params,
            &lb,
            (image.width(), image.height()),
        )
    }

    fn model_input(&self, image: &DynamicImage) -> Option<RgbImage> {
        Some(preprocessing::letterbox(image, self.input_size).0)
    }
}
