use anyhow::{Result, bail};
use image::{DynamicImage, RgbImage};
use log::{Level, debug, log};
use std::path::PathBuf;
use std::sync::Arc;

use crate::models::{Detection, ImageLog, RawDetection};

/// Everything known about one image as it moves through the pipeline
#[derive(Clone)]
pub struct PipelineData {
    /// File name (no directory) the image was read from
    pub filename: String,

    /// Decoded source image, shared between steps
    pub image: Arc<DynamicImage>,

    /// Boxes from the base model
    pub candidates: Vec<RawDetection>,

    /// Boxes from the PPE model, empty when it is not loaded
    pub ppe: Vec<RawDetection>,

    /// Labelled detections, filled by classification
    pub detections: Vec<Detection>,

    /// Annotated copy, filled by the annotation step
    pub annotated: Option<RgbImage>,
}

impl PipelineData {
    pub fn from_image(filename: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            filename: filename.into(),
            image: Arc::new(image),
            candidates: Vec::new(),
            ppe: Vec::new(),
            detections: Vec::new(),
            annotated: None,
        }
    }

    pub fn to_log(&self) -> ImageLog {
        ImageLog {
            filename: self.filename.clone(),
            detections: self.detections.clone(),
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// `<output_dir>/<NN>_<step name>/<filename>.png`; the full name keeps `a.png` and `a.jpg` apart
    pub fn step_path(&self, step_index: usize, step_name: &str, filename: &str) -> PathBuf {
        let step_dir = format!(
            "{:02}_{}",
            step_index + 1,
            step_name.to_lowercase().replace(' ', "_")
        );
        self.output_dir.join(step_dir).join(format!("{}.png", filename))
    }
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    /// Log every step at debug level instead of trace
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

/// One stage of per-image processing
pub trait PipelineStep: Send + Sync {
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData>;

    /// Human-readable name for this step (used in logs and debug directories)
    fn name(&self) -> &str;

    /// Image to keep in debug mode after this step ran, if any
    fn debug_image(&self, _data: &PipelineData) -> Option<RgbImage> {
        None
    }
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.context.verbose
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                bail!("Debug directory is not empty: {}", output_dir.display());
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step, in order, on one image
    pub fn run(&self, filename: &str, image: DynamicImage) -> Result<PipelineData> {
        let mut data = PipelineData::from_image(filename, image);

        for (step_idx, step) in self.steps.iter().enumerate() {
            let level = if self.context.verbose {
                Level::Debug
            } else {
                Level::Trace
            };
            log!(level, "{}: running step {}", filename, step.name());
            data = step.process(data, &self.context)?;

            if let Some(debug_config) = &self.context.debug
                && let Some(img) = step.debug_image(&data)
            {
                let path = debug_config.step_path(step_idx, step.name(), filename);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                img.save(&path)
                    .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
                debug!("Debug: saved {}", path.display());
            }
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
