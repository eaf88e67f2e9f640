use anyhow::{Context, Result, bail};
use image::ImageReader;
use log::{error, info};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{ImageLog, RunSummary};
use crate::pipeline::Pipeline;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Image files directly inside `dir`, sorted by name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("input directory {} does not exist", dir.display());
    }

    let mut images = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read input directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Write pretty JSON with 4-space indentation
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    fs::write(path, buf).with_context(|| format!("failed to write {}", path.display()))
}

/// Runs a pipeline over every image of a directory
pub struct BatchProcessor {
    pipeline: Pipeline,
    output_dir: PathBuf,
    log_dir: PathBuf,
}

impl BatchProcessor {
    pub fn new(pipeline: Pipeline, output_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            pipeline,
            output_dir,
            log_dir,
        }
    }

    /// Process every image in `input_dir`. Failing images are recorded and skipped.
    pub fn run(&self, input_dir: &Path) -> Result<RunSummary> {
        let images = list_images(input_dir)?;
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;
        fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("failed to create {}", self.log_dir.display()))?;

        info!("Found {} images in {}", images.len(), input_dir.display());

        let mut summary = RunSummary::start(input_dir.to_path_buf());
        for path in &images {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match self.process_image(path, &filename) {
                Ok(log) => {
                    info!("Processed {} ({} detections)", filename, log.detections.len());
                    summary.record(&log);
                }
                Err(e) => {
                    error!("Failed to process {}: {:#}", filename, e);
                    summary.record_failure(filename, &e);
                }
            }
        }
        summary.finish();

        Ok(summary)
    }

    /// Detect, write the annotated copy and the JSON log for one image
    pub fn process_image(&self, path: &Path, filename: &str) -> Result<ImageLog> {
        let image = ImageReader::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .with_guessed_format()?
            .decode()
            .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;

        let data = self.pipeline.run(filename, image)?;
        let log = data.to_log();

        if let Some(annotated) = &data.annotated {
            let out = self.output_dir.join(filename);
            annotated
                .save(&out)
                .map_err(|e| anyhow::anyhow!("Failed to save {}: {}", out.display(), e))?;
        }

        write_json(&self.log_path(filename), &log)?;
        Ok(log)
    }

    pub fn log_path(&self, filename: &str) -> PathBuf {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        self.log_dir.join(format!("{}.json", stem))
    }
}
