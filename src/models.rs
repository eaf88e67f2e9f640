use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use time::OffsetDateTime;
use uuid::Uuid;

/// Axis-aligned box in source-image pixels, stored as corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from YOLO's centre/size encoding
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Intersection over union, 0.0 for degenerate boxes
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Fraction of `other` that lies inside `self`
    pub fn coverage_of(&self, other: &BoundingBox) -> f32 {
        let area = other.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection(other) / area
    }

    /// Clamp to `[0, width] x [0, height]`, keeping x1 <= x2 and y1 <= y2
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let x1 = self.x1.clamp(0.0, w);
        let y1 = self.y1.clamp(0.0, h);
        Self {
            x1,
            y1,
            x2: self.x2.clamp(x1, w),
            y2: self.y2.clamp(y1, h),
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// A box as it comes out of a detector, before any glove/bare decision
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandLabel {
    Gloved_Hand,
    Bare_Hand,
}

impl HandLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandLabel::Gloved_Hand => "Gloved_Hand",
            HandLabel::Bare_Hand => "Bare_Hand",
        }
    }

    pub fn is_gloved(&self) -> bool {
        matches!(self, HandLabel::Gloved_Hand)
    }
}

impl fmt::Display for HandLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labelled box as written to the per-image log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: HandLabel,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

impl Detection {
    /// Confidence and coordinates are rounded to 2 decimals
    pub fn new(label: HandLabel, confidence: f32, bbox: &BoundingBox) -> Self {
        Self {
            label,
            confidence: round2(confidence),
            bbox: bbox.to_array().map(round2),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let [x1, y1, x2, y2] = self.bbox;
        BoundingBox::new(x1, y1, x2, y2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLog {
    pub filename: String,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFailure {
    pub filename: String,
    pub error: String,
}

/// Totals for a whole batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    pub input_dir: PathBuf,
    pub images_processed: usize,
    pub images_failed: usize,
    pub gloved: usize,
    pub bare: usize,
    pub failures: Vec<ImageFailure>,
}

impl RunSummary {
    pub fn start(input_dir: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: now(),
            finished_at: None,
            input_dir,
            images_processed: 0,
            images_failed: 0,
            gloved: 0,
            bare: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, log: &ImageLog) {
        self.images_processed += 1;
        for det in &log.detections {
            match det.label {
                HandLabel::Gloved_Hand => self.gloved += 1,
                HandLabel::Bare_Hand => self.bare += 1,
            }
        }
    }

    pub fn record_failure(&mut self, filename: impl Into<String>, error: &anyhow::Error) {
        self.images_failed += 1;
        self.failures.push(ImageFailure {
            filename: filename.into(),
            error: format!("{:#}", error),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(now());
    }

    /// Error when any image failed, so the process exits non-zero
    pub fn ensure_success(&self) -> anyhow::Result<()> {
        if self.images_failed > 0 {
            anyhow::bail!(
                "{} of {} images failed",
                self.images_failed,
                self.images_failed + self.images_processed
            );
        }
        Ok(())
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox::new(10.0, 10.0, 50.0, 30.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn coverage_measures_contained_fraction() {
        let hand = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let glove = BoundingBox::new(50.0, 50.0, 150.0, 100.0);
        assert!((hand.coverage_of(&glove) - 0.5).abs() < 1e-6);
        assert_eq!(hand.coverage_of(&BoundingBox::new(5.0, 5.0, 5.0, 9.0)), 0.0);
    }

    #[test]
    fn clamp_keeps_corners_ordered() {
        let b = BoundingBox::new(-20.0, -5.0, 700.0, 500.0).clamp(640, 480);
        assert_eq!(b.to_array(), [0.0, 0.0, 640.0, 480.0]);

        let outside = BoundingBox::new(700.0, 10.0, 800.0, 20.0).clamp(640, 480);
        assert!(outside.x1 <= outside.x2);
        assert_eq!(outside.width(), 0.0);
    }

    #[test]
    fn detection_rounds_to_two_decimals() {
        let det = Detection::new(
            HandLabel::Bare_Hand,
            0.87654,
            &BoundingBox::new(1.234, 5.678, 9.999, 10.001),
        );
        assert_eq!(det.confidence, 0.88);
        assert_eq!(det.bbox, [1.23, 5.68, 10.0, 10.0]);
    }

    #[test]
    fn labels_serialize_by_name() {
        let det = Detection::new(
            HandLabel::Gloved_Hand,
            0.5,
            &BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        );
        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(json["label"], "Gloved_Hand");
        assert_eq!(json["bbox"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn summary_counts_labels() {
        let mut summary = RunSummary::start(PathBuf::from("in"));
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        summary.record(&ImageLog {
            filename: "a.jpg".into(),
            detections: vec![
                Detection::new(HandLabel::Gloved_Hand, 0.9, &b),
                Detection::new(HandLabel::Bare_Hand, 0.4, &b),
                Detection::new(HandLabel::Bare_Hand, 0.3, &b),
            ],
        });
        summary.record_failure("b.png", &anyhow::anyhow!("corrupt"));
        summary.finish();

        assert_eq!(summary.images_processed, 1);
        assert_eq!(summary.images_failed, 1);
        assert_eq!((summary.gloved, summary.bare), (1, 2));
        assert_eq!(summary.failures[0].error, "corrupt");
        assert!(summary.finished_at.is_some());
        assert!(summary.ensure_success().is_err());
    }

    #[test]
    fn clean_run_succeeds() {
        let mut summary = RunSummary::start(PathBuf::from("in"));
        summary.record(&ImageLog {
            filename: "a.jpg".into(),
            detections: Vec::new(),
        });
        summary.finish();
        assert!(summary.ensure_success().is_ok());
    }
}
