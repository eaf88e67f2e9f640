use clap::Parser;
use std::path::PathBuf;

use glovecheck::batch::{BatchProcessor, write_json};
use glovecheck::detection::{self, Detectors};
use glovecheck::{Config, LabelRule, Overrides};

#[derive(Parser)]
#[command(name = "glovecheck")]
#[command(about = "Label detected hands in a folder of images as gloved or bare")]
#[command(version)]
struct Cli {
    /// Folder of .png/.jpg/.jpeg images [default: input_images]
    #[arg(long, value_name = "DIR")]
    input: Option<PathBuf>,

    /// Folder for annotated copies [default: output]
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Folder for per-image JSON logs [default: logs]
    #[arg(long, value_name = "DIR")]
    logs: Option<PathBuf>,

    /// TOML config file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base detection model (.rten) [default: models/yolov8n.rten]
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Class names for the base model, one per line [default: COCO]
    #[arg(long, value_name = "FILE")]
    labels: Option<PathBuf>,

    /// Secondary protective-equipment model (.rten)
    #[arg(long, value_name = "PATH")]
    ppe_model: Option<PathBuf>,

    /// Class names for the PPE model, one per line
    #[arg(long, value_name = "FILE")]
    ppe_labels: Option<PathBuf>,

    /// Minimum detection confidence [default: 0.1]
    #[arg(long, value_name = "F")]
    conf: Option<f32>,

    /// IoU threshold for non-maximum suppression [default: 0.7]
    #[arg(long, value_name = "F")]
    iou: Option<f32>,

    /// Model input size in pixels [default: 640]
    #[arg(long, value_name = "N")]
    imgsz: Option<u32>,

    /// Maximum detections kept per image [default: 300]
    #[arg(long, value_name = "N")]
    max_det: Option<usize>,

    /// Only keep these base-model classes (comma separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    classes: Option<Vec<String>>,

    /// Gloved/bare rule: filename, label or hybrid [default: hybrid]
    #[arg(long, value_name = "RULE")]
    rule: Option<LabelRule>,

    /// TrueType font for box labels [default: first system font found]
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Save model inputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            input: self.input.clone(),
            output: self.output.clone(),
            logs: self.logs.clone(),
            model: self.model.clone(),
            labels: self.labels.clone(),
            ppe_model: self.ppe_model.clone(),
            ppe_labels: self.ppe_labels.clone(),
            confidence: self.conf,
            iou: self.iou,
            input_size: self.imgsz,
            max_detections: self.max_det,
            classes: self.classes.clone(),
            rule: self.rule,
            font: self.font.clone(),
            summary: self.summary.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::load(args.config.as_deref(), args.overrides())?;
    log::debug!("Configuration: {:?}", config);
    log::info!("Initializing detection ({} rule)", config.rule);

    let detectors = Detectors::load(&config)?;
    let style = detection::annotation_style(&config)?;
    let mut pipeline =
        detection::build_standard_pipeline(detectors, &config, style).with_verbose(args.verbose > 0);

    if let Some(debug_dir) = args.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let processor = BatchProcessor::new(
        pipeline,
        config.output_dir.clone(),
        config.log_dir.clone(),
    );
    let summary = processor.run(&config.input_dir)?;

    if let Some(path) = &config.summary {
        write_json(path, &summary)?;
    }

    println!("\n=== Glove Detection Results ===");
    println!("Images processed: {}", summary.images_processed);
    println!("Images failed: {}", summary.images_failed);
    println!("Gloved hands: {}", summary.gloved);
    println!("Bare hands: {}", summary.bare);
    println!("Annotated images: {}", config.output_dir.display());
    println!("Detection logs: {}", config.log_dir.display());

    summary.ensure_success()
}
