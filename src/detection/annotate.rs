//! Drawing detections onto a copy of the source image.
//!
//! Each detection gets a hollow box in its label colour. The label text is rendered above the box
//! when a TrueType font is available; otherwise a solid colour tag takes its place.

use ab_glyph::FontVec;
use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::debug;
use std::path::Path;

use crate::models::{Detection, HandLabel};

pub const GLOVED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BARE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Gap between the top of the box and the label baseline
const LABEL_OFFSET: i32 = 10;

const SYSTEM_FONTS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn label_color(label: HandLabel) -> Rgb<u8> {
    match label {
        HandLabel::Gloved_Hand => GLOVED_COLOR,
        HandLabel::Bare_Hand => BARE_COLOR,
    }
}

pub struct AnnotationStyle {
    /// If None, a colour tag replaces the label text
    pub font: Option<FontVec>,
    pub font_size: f32,
    pub thickness: u32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 24.0,
            thickness: 3,
        }
    }
}

impl AnnotationStyle {
    pub fn with_font_path(mut self, path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| anyhow::anyhow!("failed to parse font {}", path.display()))?;
        self.font = Some(font);
        Ok(self)
    }

    /// Try a handful of well-known system font locations
    pub fn with_system_font(mut self) -> Self {
        for path in SYSTEM_FONTS {
            if let Ok(data) = std::fs::read(path)
                && let Ok(font) = FontVec::try_from_vec(data)
            {
                debug!("Using system font {}", path);
                self.font = Some(font);
                return self;
            }
        }
        debug!("No system font found, labels will be drawn as colour tags");
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness.max(1);
        self
    }
}

/// Return an RGB copy of `image` with every detection drawn on it
pub fn annotate(image: &DynamicImage, detections: &[Detection], style: &AnnotationStyle) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for det in detections {
        draw_detection(&mut canvas, det, style);
    }
    canvas
}

fn draw_detection(canvas: &mut RgbImage, det: &Detection, style: &AnnotationStyle) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let bbox = det.bounding_box().clamp(width, height);
    let color = label_color(det.label);

    let x1 = bbox.x1 as i32;
    let y1 = bbox.y1 as i32;
    let w = bbox.width() as i32;
    let h = bbox.height() as i32;

    // Thickness grows inwards from the box edge.
    for i in 0..style.thickness as i32 {
        let (rw, rh) = (w - 2 * i, h - 2 * i);
        if rw <= 0 || rh <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x1 + i, y1 + i).of_size(rw as u32, rh as u32),
            color,
        );
    }

    match &style.font {
        Some(font) => {
            let text = det.label.as_str();
            let (_, text_h) = text_size(style.font_size, font, text);
            let y = (y1 - LABEL_OFFSET - text_h as i32).max(0);
            draw_text_mut(canvas, color, x1, y, style.font_size, font, text);
        }
        None => {
            let tag_h = (style.font_size / 2.0).max(4.0) as i32;
            let tag_w = ((style.font_size * 2.0) as u32).max(1);
            let y = (y1 - LABEL_OFFSET - tag_h).max(0);
            draw_filled_rect_mut(canvas, Rect::at(x1, y).of_size(tag_w, tag_h as u32), color);
        }
    }
}
