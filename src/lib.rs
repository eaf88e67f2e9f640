pub mod batch;
pub mod config;
pub mod detection;
pub mod models;
pub mod pipeline;

pub use batch::BatchProcessor;
pub use config::{Config, Overrides};
pub use detection::Detector;
pub use detection::classify::{HandClassifier, LabelRule};
pub use models::{BoundingBox, Detection, HandLabel, ImageLog, RawDetection, RunSummary};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineData, PipelineStep};
