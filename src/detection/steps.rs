use crate::detection::Detector;
use crate::detection::annotate::{self, AnnotationStyle};
use crate::detection::classify::HandClassifier;
use crate::pipeline::{PipelineContext, PipelineData, PipelineStep};
use anyhow::{Context, Result};
use image::RgbImage;
use log::debug;
use std::sync::Arc;

/// Run the base model and store its boxes as candidates
pub struct DetectionStep {
    pub detector: Arc<dyn Detector>,
}

impl PipelineStep for DetectionStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        data.candidates = self
            .detector
            .detect(&data.image)
            .with_context(|| format!("{} failed on {}", self.detector.name(), data.filename))?;
        debug!(
            "{}: {} candidate boxes from {}",
            data.filename,
            data.candidates.len(),
            self.detector.name()
        );
        Ok(data)
    }

    fn name(&self) -> &str {
        "Detection"
    }

    fn debug_image(&self, data: &PipelineData) -> Option<RgbImage> {
        self.detector.model_input(&data.image)
    }
}

/// Run the secondary PPE model
pub struct PpeDetectionStep {
    pub detector: Arc<dyn Detector>,
}

impl PipelineStep for PpeDetectionStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        data.ppe = self
            .detector
            .detect(&data.image)
            .with_context(|| format!("{} failed on {}", self.detector.name(), data.filename))?;
        debug!("{}: {} PPE boxes", data.filename, data.ppe.len());
        Ok(data)
    }

    fn name(&self) -> &str {
        "PPE Detection"
    }
}

/// Turn candidates into gloved/bare detections
pub struct ClassificationStep {
    pub classifier: HandClassifier,
}

impl PipelineStep for ClassificationStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        data.detections = self
            .classifier
            .classify(&data.filename, &data.candidates, &data.ppe);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Classification"
    }
}

/// Draw labelled boxes onto a copy of the image
pub struct AnnotationStep {
    pub style: AnnotationStyle,
}

impl PipelineStep for AnnotationStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        data.annotated = Some(annotate::annotate(&data.image, &data.detections, &self.style));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Annotation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::classify::LabelRule;
    use crate::models::{BoundingBox, HandLabel, RawDetection};
    use crate::pipeline::Pipeline;
    use image::DynamicImage;

    struct Fixed(Vec<RawDetection>);

    impl Detector for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
            Ok(self.0.clone())
        }
    }

    fn raw(name: &str, bbox: BoundingBox) -> RawDetection {
        RawDetection {
            class_id: 0,
            class_name: name.into(),
            confidence: 0.8,
            bbox,
        }
    }

    #[test]
    fn full_chain_labels_and_draws() {
        let base = Fixed(vec![raw("person", BoundingBox::new(2.0, 2.0, 30.0, 30.0))]);
        let ppe = Fixed(vec![raw("glove", BoundingBox::new(10.0, 10.0, 20.0, 20.0))]);

        let pipeline = Pipeline::new()
            .add_step(Arc::new(DetectionStep {
                detector: Arc::new(base),
            }))
            .add_step(Arc::new(PpeDetectionStep {
                detector: Arc::new(ppe),
            }))
            .add_step(Arc::new(ClassificationStep {
                classifier: HandClassifier::new(LabelRule::Hybrid, 0.5),
            }))
            .add_step(Arc::new(AnnotationStep {
                style: AnnotationStyle::default(),
            }));

        let out = pipeline.run("site.png", DynamicImage::new_rgb8(40, 40)).unwrap();
        assert_eq!(out.detections.len(), 1);
        assert_eq!(out.detections[0].label, HandLabel::Gloved_Hand);

        let annotated = out.annotated.unwrap();
        assert_eq!(annotated.get_pixel(2, 15), &annotate::GLOVED_COLOR);
    }
}
