use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

use crate::models::{Detection, HandLabel, RawDetection};

/// How a detected region is labelled gloved or bare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRule {
    /// Gloved iff the image file name mentions a glove
    Filename,
    /// Gloved iff the detector's class name is a (non-negated) glove class
    Label,
    /// Gloved iff the file name says so or a PPE glove box lies inside the region
    Hybrid,
}

impl FromStr for LabelRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "filename" => Ok(LabelRule::Filename),
            "label" => Ok(LabelRule::Label),
            "hybrid" => Ok(LabelRule::Hybrid),
            other => bail!(
                "unknown label rule '{}', expected one of: filename, label, hybrid",
                other
            ),
        }
    }
}

impl fmt::Display for LabelRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LabelRule::Filename => "filename",
            LabelRule::Label => "label",
            LabelRule::Hybrid => "hybrid",
        })
    }
}

impl LabelRule {
    /// Only the hybrid rule reads the PPE model's boxes
    pub fn uses_ppe(&self) -> bool {
        matches!(self, LabelRule::Hybrid)
    }
}

pub fn filename_indicates_glove(filename: &str) -> bool {
    filename.to_lowercase().contains("glove")
}

/// `glove` counts, `no_glove` / `no-glove` / `noglove` do not
pub fn label_indicates_glove(class_name: &str) -> bool {
    let name = class_name.to_lowercase();
    name.contains("glove") && !name.trim_start().starts_with("no")
}

pub struct HandClassifier {
    rule: LabelRule,
    ppe_coverage: f32,
}

impl HandClassifier {
    pub fn new(rule: LabelRule, ppe_coverage: f32) -> Self {
        Self { rule, ppe_coverage }
    }

    pub fn rule(&self) -> LabelRule {
        self.rule
    }

    /// Label every candidate, preserving order
    pub fn classify(
        &self,
        filename: &str,
        candidates: &[RawDetection],
        ppe: &[RawDetection],
    ) -> Vec<Detection> {
        let by_name = filename_indicates_glove(filename);

        candidates
            .iter()
            .map(|candidate| {
                let gloved = match self.rule {
                    LabelRule::Filename => by_name,
                    LabelRule::Label => label_indicates_glove(&candidate.class_name),
                    LabelRule::Hybrid => by_name || self.ppe_glove_inside(candidate, ppe),
                };
                let label = if gloved {
                    HandLabel::Gloved_Hand
                } else {
                    HandLabel::Bare_Hand
                };
                Detection::new(label, candidate.confidence, &candidate.bbox)
            })
            .collect()
    }

    fn ppe_glove_inside(&self, candidate: &RawDetection, ppe: &[RawDetection]) -> bool {
        ppe.iter().any(|p| {
            label_indicates_glove(&p.class_name)
                && candidate.bbox.coverage_of(&p.bbox) >= self.ppe_coverage
        })
    }
}
