use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detection::classify::LabelRule;

pub const DEFAULT_INPUT_DIR: &str = "input_images";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_MODEL_PATH: &str = "models/yolov8n.rten";
pub const DEFAULT_CONFIDENCE: f32 = 0.1;
pub const DEFAULT_IOU: f32 = 0.7;
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;
pub const DEFAULT_PPE_COVERAGE: f32 = 0.5;
pub const DEFAULT_BOX_THICKNESS: u32 = 3;
pub const DEFAULT_FONT_SIZE: f32 = 24.0;

/// Settings for one detection model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub path: PathBuf,
    /// Optional labels file replacing the built-in class names
    pub labels: Option<PathBuf>,
}

/// Fully resolved run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub model: ModelSettings,
    pub ppe_model: Option<ModelSettings>,
    pub confidence: f32,
    pub iou: f32,
    pub input_size: u32,
    pub max_detections: usize,
    /// Class names to keep from the base model, empty keeps everything
    pub classes: Vec<String>,
    pub rule: LabelRule,
    pub ppe_coverage: f32,
    pub box_thickness: u32,
    pub font_size: f32,
    pub font: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            model: ModelSettings {
                path: PathBuf::from(DEFAULT_MODEL_PATH),
                labels: None,
            },
            ppe_model: None,
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
            input_size: DEFAULT_INPUT_SIZE,
            max_detections: DEFAULT_MAX_DETECTIONS,
            classes: Vec::new(),
            rule: LabelRule::Hybrid,
            ppe_coverage: DEFAULT_PPE_COVERAGE,
            box_thickness: DEFAULT_BOX_THICKNESS,
            font_size: DEFAULT_FONT_SIZE,
            font: None,
            summary: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub logs: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    pub model: Option<ModelFile>,
    pub ppe_model: Option<ModelFile>,
    pub detection: Option<DetectionFile>,
    pub annotate: Option<AnnotateFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    pub path: Option<PathBuf>,
    pub labels: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DetectionFile {
    pub confidence: Option<f32>,
    pub iou: Option<f32>,
    pub input_size: Option<u32>,
    pub max_detections: Option<usize>,
    pub classes: Option<Vec<String>>,
    pub rule: Option<String>,
    pub ppe_coverage: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AnnotateFile {
    pub box_thickness: Option<u32>,
    pub font_size: Option<f32>,
    pub font: Option<PathBuf>,
}

/// Command-line overrides; `None` leaves the lower layer untouched
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub logs: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub ppe_model: Option<PathBuf>,
    pub ppe_labels: Option<PathBuf>,
    pub confidence: Option<f32>,
    pub iou: Option<f32>,
    pub input_size: Option<u32>,
    pub max_detections: Option<usize>,
    pub classes: Option<Vec<String>>,
    pub rule: Option<LabelRule>,
    pub font: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

impl Config {
    /// Defaults, then the optional TOML file, then command-line overrides
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        let mut config = Self::from_file(file)?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(input) = file.input {
            config.input_dir = input;
        }
        if let Some(output) = file.output {
            config.output_dir = output;
        }
        if let Some(logs) = file.logs {
            config.log_dir = logs;
        }
        config.summary = file.summary;

        if let Some(model) = file.model {
            if let Some(path) = model.path {
                config.model.path = path;
            }
            config.model.labels = model.labels;
        }
        if let Some(ppe) = file.ppe_model {
            let path = ppe
                .path
                .ok_or_else(|| anyhow::anyhow!("[ppe_model] section requires a `path`"))?;
            config.ppe_model = Some(ModelSettings {
                path,
                labels: ppe.labels,
            });
        }

        if let Some(det) = file.detection {
            if let Some(v) = det.confidence {
                config.confidence = v;
            }
            if let Some(v) = det.iou {
                config.iou = v;
            }
            if let Some(v) = det.input_size {
                config.input_size = v;
            }
            if let Some(v) = det.max_detections {
                config.max_detections = v;
            }
            if let Some(v) = det.classes {
                config.classes = v;
            }
            if let Some(v) = det.rule {
                config.rule = v.parse()?;
            }
            if let Some(v) = det.ppe_coverage {
                config.ppe_coverage = v;
            }
        }

        if let Some(annotate) = file.annotate {
            if let Some(v) = annotate.box_thickness {
                config.box_thickness = v;
            }
            if let Some(v) = annotate.font_size {
                config.font_size = v;
            }
            config.font = annotate.font;
        }

        Ok(config)
    }

    pub fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.input {
            self.input_dir = v;
        }
        if let Some(v) = o.output {
            self.output_dir = v;
        }
        if let Some(v) = o.logs {
            self.log_dir = v;
        }
        if let Some(v) = o.model {
            self.model.path = v;
        }
        if let Some(v) = o.labels {
            self.model.labels = Some(v);
        }
        if let Some(path) = o.ppe_model {
            let labels = self.ppe_model.take().and_then(|m| m.labels);
            self.ppe_model = Some(ModelSettings { path, labels });
        }
        if let (Some(v), Some(ppe)) = (o.ppe_labels, self.ppe_model.as_mut()) {
            ppe.labels = Some(v);
        }
        if let Some(v) = o.confidence {
            self.confidence = v;
        }
        if let Some(v) = o.iou {
            self.iou = v;
        }
        if let Some(v) = o.input_size {
            self.input_size = v;
        }
        if let Some(v) = o.max_detections {
            self.max_detections = v;
        }
        if let Some(v) = o.classes {
            self.classes = v;
        }
        if let Some(v) = o.rule {
            self.rule = v;
        }
        if let Some(v) = o.font {
            self.font = Some(v);
        }
        if let Some(v) = o.summary {
            self.summary = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence", self.confidence),
            ("iou", self.iou),
            ("ppe_coverage", self.ppe_coverage),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if self.input_size == 0 {
            bail!("input_size must be greater than zero");
        }
        if self.max_detections == 0 {
            bail!("max_detections must be greater than zero");
        }
        if self.box_thickness == 0 {
            bail!("box_thickness must be greater than zero");
        }
        if self.font_size < 1.0 {
            bail!("font_size must be at least 1, got {}", self.font_size);
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.input_dir, PathBuf::from("input_images"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.confidence, 0.1);
        assert_eq!(config.input_size, 640);
        assert_eq!(config.rule, LabelRule::Hybrid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_then_overrides() {
        let file: ConfigFile = toml::from_str(
            r#"
            input = "photos"
            [ppe_model]
            path = "models/ppe.rten"
            labels = "ppe.txt"
            [detection]
            confidence = 0.25
            classes = ["person"]
            rule = "label"
            [annotate]
            box_thickness = 5
            "#,
        )
        .unwrap();
        let mut config = Config::from_file(file).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("photos"));
        assert_eq!(config.confidence, 0.25);
        assert_eq!(config.classes, vec!["person".to_string()]);
        assert_eq!(config.rule, LabelRule::Label);
        assert_eq!(config.box_thickness, 5);

        config.apply(Overrides {
            confidence: Some(0.4),
            ppe_model: Some(PathBuf::from("other.rten")),
            ..Default::default()
        });
        assert_eq!(config.confidence, 0.4);
        assert_eq!(config.input_dir, PathBuf::from("photos"));
        let ppe = config.ppe_model.unwrap();
        assert_eq!(ppe.path, PathBuf::from("other.rten"));
        assert_eq!(ppe.labels, Some(PathBuf::from("ppe.txt")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<ConfigFile, _> = toml::from_str("imgsz = 320");
        assert!(parsed.is_err());
    }

    #[test]
    fn ppe_section_without_path_is_an_error() {
        let file: ConfigFile = toml::from_str("[ppe_model]\nlabels = \"x.txt\"").unwrap();
        assert!(Config::from_file(file).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.iou = -0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.font_size = 0.4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_toml_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("glovecheck.toml");
        std::fs::write(&path, "logs = \"out/logs\"\n[detection]\niou = 0.5\n").unwrap();

        let config = Config::load(Some(&path), Overrides::default()).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("out/logs"));
        assert_eq!(config.iou, 0.5);

        assert!(Config::load(Some(&dir.path().join("missing.toml")), Overrides::default()).is_err());
    }
}
