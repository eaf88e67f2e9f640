//! Non-maximum suppression.
//!
//! YOLO heads emit many overlapping boxes per object. Boxes are processed from the most confident
//! down; every remaining box of the same class whose IoU with the kept box reaches the threshold
//! is dropped.

use crate::models::RawDetection;

pub struct NonMaxSuppression {
    iou_thresh: f32,
    max_detections: usize,
    class_agnostic: bool,
}

impl NonMaxSuppression {
    pub const DEFAULT_IOU_THRESH: f32 = 0.7;

    pub fn new(iou_thresh: f32, max_detections: usize) -> Self {
        Self {
            iou_thresh,
            max_detections,
            class_agnostic: false,
        }
    }

    /// Suppress across classes instead of per class.
    pub fn class_agnostic(mut self, agnostic: bool) -> Self {
        self.class_agnostic = agnostic;
        self
    }

    /// Returns the surviving detections, most confident first.
    pub fn process(&self, mut detections: Vec<RawDetection>) -> Vec<RawDetection> {
        // Ascending, so the most confident box is popped first.
        detections.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

        let mut kept = Vec::new();
        while let Some(seed) = detections.pop() {
            if kept.len() >= self.max_detections {
                break;
            }
            detections.retain(|other| {
                let same_group = self.class_agnostic || other.class_id == seed.class_id;
                !(same_group && seed.bbox.iou(&other.bbox) >= self.iou_thresh)
            });
            kept.push(seed);
        }
        kept
    }
}
