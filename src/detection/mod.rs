pub mod annotate;
pub mod classify;
pub mod labels;
pub mod nms;
pub mod preprocessing;
pub mod steps;
pub mod yolo;

use anyhow::Result;
use image::{DynamicImage, RgbImage};
use log::{info, warn};
use std::sync::Arc;

use crate::config::{Config, ModelSettings};
use crate::models::RawDetection;
use crate::pipeline::Pipeline;
use annotate::AnnotationStyle;
use classify::{HandClassifier, LabelRule};
use labels::ClassNames;
use steps::*;
use yolo::{DecodeParams, YoloDetector};

/// An object detector that turns an image into boxes in source-image pixels.
pub trait Detector: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>>;

    /// The exact image fed to the model, for debug output.
    fn model_input(&self, _image: &DynamicImage) -> Option<RgbImage> {
        None
    }
}

/// The detectors a run works with; the PPE model is optional
pub struct Detectors {
    pub base: Arc<dyn Detector>,
    pub ppe: Option<Arc<dyn Detector>>,
}

impl Detectors {
    /// Load the base model (required) and the PPE model (best effort)
    pub fn load(config: &Config) -> Result<Self> {
        let base_params = DecodeParams {
            confidence: config.confidence,
            iou: config.iou,
            max_detections: config.max_detections,
            classes: config.classes.clone(),
        };
        let base = load_yolo(&config.model, ClassNames::coco(), config, base_params)?;
        info!("Loaded base model {}", config.model.path.display());

        let ppe = load_optional_ppe(config.ppe_model.as_ref(), config.rule, |settings| {
            let params = DecodeParams {
                confidence: config.confidence,
                iou: config.iou,
                max_detections: config.max_detections,
                classes: Vec::new(),
            };
            let detector = load_yolo(settings, ClassNames::ppe(), config, params)?;
            Ok(Arc::new(detector) as Arc<dyn Detector>)
        });

        Ok(Self {
            base: Arc::new(base),
            ppe,
        })
    }
}

/// The PPE detector, or None when the rule ignores it or it fails to load
pub fn load_optional_ppe<F>(
    settings: Option<&ModelSettings>,
    rule: LabelRule,
    load: F,
) -> Option<Arc<dyn Detector>>
where
    F: FnOnce(&ModelSettings) -> Result<Arc<dyn Detector>>,
{
    let settings = settings?;
    if !rule.uses_ppe() {
        info!(
            "Skipping PPE model {}: not used by the {} rule",
            settings.path.display(),
            rule
        );
        return None;
    }
    match load(settings) {
        Ok(detector) => {
            info!("Loaded PPE model {}", settings.path.display());
            Some(detector)
        }
        Err(e) => {
            warn!("PPE model unavailable, continuing without it: {:#}", e);
            None
        }
    }
}

fn load_yolo(
    settings: &ModelSettings,
    default_names: ClassNames,
    config: &Config,
    params: DecodeParams,
) -> Result<YoloDetector> {
    let names = match &settings.labels {
        Some(path) => ClassNames::load(path)?,
        None => default_names,
    };
    YoloDetector::load(&settings.path, names, config.input_size, params)
}

/// Build the standard detect → classify → annotate pipeline
pub fn build_standard_pipeline(
    detectors: Detectors,
    config: &Config,
    style: AnnotationStyle,
) -> Pipeline {
    let mut pipeline = Pipeline::new().add_step(Arc::new(DetectionStep {
        detector: detectors.base,
    }));

    if let Some(ppe) = detectors.ppe {
        pipeline = pipeline.add_step(Arc::new(PpeDetectionStep { detector: ppe }));
    } else if config.rule.uses_ppe() {
        info!("No PPE model loaded, hybrid rule falls back to file names");
    }

    pipeline
        .add_step(Arc::new(ClassificationStep {
            classifier: HandClassifier::new(config.rule, config.ppe_coverage),
        }))
        .add_step(Arc::new(AnnotationStep { style }))
}

/// Annotation style from the config: explicit font, else a system font
pub fn annotation_style(config: &Config) -> Result<AnnotationStyle> {
    let style = AnnotationStyle::default()
        .with_font_size(config.font_size)
        .with_thickness(config.box_thickness);
    match &config.font {
        Some(path) => style.with_font_path(path),
        None => Ok(style.with_system_font()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_base_model_is_fatal() {
        let mut config = Config::default();
        config.model.path = "/nonexistent/yolov8n.rten".into();
        assert!(Detectors::load(&config).is_err());
    }

    fn ppe_settings() -> ModelSettings {
        ModelSettings {
            path: "/nonexistent/ppe.rten".into(),
            labels: None,
        }
    }

    #[test]
    fn ppe_load_failure_is_not_fatal() {
        let settings = ppe_settings();
        let ppe = load_optional_ppe(Some(&settings), LabelRule::Hybrid, |s| {
            let config = Config::default();
            let detector = load_yolo(s, ClassNames::ppe(), &config, DecodeParams::default())?;
            Ok(Arc::new(detector) as Arc<dyn Detector>)
        });
        assert!(ppe.is_none());
    }

    #[test]
    fn ppe_model_is_loaded_for_hybrid_rule() {
        let settings = ppe_settings();
        let ppe = load_optional_ppe(Some(&settings), LabelRule::Hybrid, |_| {
            Ok(Arc::new(Nothing) as Arc<dyn Detector>)
        });
        assert_eq!(ppe.map(|d| d.name().to_string()), Some("nothing".to_string()));
    }

    #[test]
    fn ppe_model_is_skipped_when_rule_ignores_it() {
        let settings = ppe_settings();
        for rule in [LabelRule::Filename, LabelRule::Label] {
            let ppe = load_optional_ppe(Some(&settings), rule, |_| {
                panic!("PPE model must not be loaded for the {} rule", rule)
            });
            assert!(ppe.is_none());
        }
        assert!(load_optional_ppe(None, LabelRule::Hybrid, |_| unreachable!()).is_none());
    }

    struct Nothing;

    impl Detector for Nothing {
        fn name(&self) -> &str {
            "nothing"
        }

        fn detect(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn ppe_step_only_when_model_loaded() {
        let config = Config::default();
        let without = build_standard_pipeline(
            Detectors {
                base: Arc::new(Nothing),
                ppe: None,
            },
            &config,
            AnnotationStyle::default(),
        );
        assert_eq!(without.step_names(), vec!["Detection", "Classification", "Annotation"]);

        let with = build_standard_pipeline(
            Detectors {
                base: Arc::new(Nothing),
                ppe: Some(Arc::new(Nothing)),
            },
            &config,
            AnnotationStyle::default(),
        );
        assert_eq!(with.step_names().len(), 4);
        assert_eq!(with.step_names()[1], "PPE Detection");
    }
}
