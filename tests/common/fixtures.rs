use glovecheck::detection::annotate::AnnotationStyle;
use glovecheck::detection::classify::HandClassifier;
use glovecheck::detection::steps::{
    AnnotationStep, ClassificationStep, DetectionStep, PpeDetectionStep,
};
use glovecheck::{BoundingBox, Detector, ImageLog, LabelRule, Pipeline, RawDetection};
use image::{DynamicImage, ImageBuffer, Rgb};
use std::path::Path;
use std::sync::Arc;

/// Detector that returns the same boxes for every image
pub struct StubDetector {
    pub detections: Vec<RawDetection>,
}

impl Detector for StubDetector {
    fn name(&self) -> &str {
        "stub"
    }

    fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }
}

pub fn raw(class_name: &str, confidence: f32, bbox: BoundingBox) -> RawDetection {
    RawDetection {
        class_id: 0,
        class_name: class_name.to_string(),
        confidence,
        bbox,
    }
}

/// Writes a 100x100 dark gray image in a format chosen by the extension
pub fn write_test_image(dir: &Path, name: &str) {
    let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([40u8, 40u8, 40u8]));
    img.save(dir.join(name)).expect("Failed to save test image");
}

/// Detect → (PPE) → classify → annotate, backed by stub detectors
pub fn stub_pipeline(
    base: Vec<RawDetection>,
    ppe: Option<Vec<RawDetection>>,
    rule: LabelRule,
) -> Pipeline {
    let mut pipeline = Pipeline::new().add_step(Arc::new(DetectionStep {
        detector: Arc::new(StubDetector { detections: base }),
    }));
    if let Some(ppe) = ppe {
        pipeline = pipeline.add_step(Arc::new(PpeDetectionStep {
            detector: Arc::new(StubDetector { detections: ppe }),
        }));
    }
    pipeline
        .add_step(Arc::new(ClassificationStep {
            classifier: HandClassifier::new(rule, 0.5),
        }))
        .add_step(Arc::new(AnnotationStep {
            style: AnnotationStyle::default(),
        }))
}

pub fn read_log(path: &Path) -> ImageLog {
    let text = std::fs::read_to_string(path).expect("Failed to read log");
    serde_json::from_str(&text).expect("Failed to parse log")
}
