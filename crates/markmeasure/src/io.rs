//! The annotation snapshot written next to each image.

use crate::depth::DepthCorrectionModel;
use crate::shape::{BoxShape, LineSegment, LineShape, Rect, Shape};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum AnnotationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("session has no image path to save annotations next to")]
    NoImagePath,
}

/// One shape in file form. Points are `[x, y, w, h]` for boxes and
/// `[x1, y1, x2, y2]` for lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeRecord {
    Box {
        label: String,
        points: [f64; 4],
    },
    Line {
        label: String,
        points: [f64; 4],
        mm_value: Option<f64>,
        mm_corrected: Option<f64>,
        depth_mm: Option<f64>,
    },
}

impl From<&Shape> for ShapeRecord {
    fn from(shape: &Shape) -> Self {
        match shape {
            Shape::Box(b) => ShapeRecord::Box {
                label: b.label.clone(),
                points: [b.rect.x, b.rect.y, b.rect.width, b.rect.height],
            },
            Shape::Line(l) => ShapeRecord::Line {
                label: l.label.clone(),
                points: [l.segment.p1.x, l.segment.p1.y, l.segment.p2.x, l.segment.p2.y],
                mm_value: l.base_mm,
                mm_corrected: l.corrected_mm,
                depth_mm: l.depth_mm,
            },
        }
    }
}

impl From<&ShapeRecord> for Shape {
    fn from(rec: &ShapeRecord) -> Self {
        match rec {
            ShapeRecord::Box { label, points } => Shape::Box(BoxShape {
                label: label.clone(),
                rect: Rect::new(points[0], points[1], points[2], points[3]),
            }),
            ShapeRecord::Line {
                label,
                points,
                mm_value,
                mm_corrected,
                depth_mm,
            } => Shape::Line(LineShape {
                label: label.clone(),
                segment: LineSegment::new(
                    Point2::new(points[0], points[1]),
                    Point2::new(points[2], points[3]),
                ),
                base_mm: *mm_value,
                corrected_mm: *mm_corrected,
                depth_mm: *depth_mm,
                reference: mm_value.is_some(),
            }),
        }
    }
}

/// Whole-session snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFile {
    pub image_path: String,
    pub px_per_mm: Option<f64>,
    pub scale_correction: DepthCorrectionModel,
    pub depth_mm: Option<f64>,
    pub shapes: Vec<ShapeRecord>,
}

impl AnnotationFile {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, AnnotationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write as pretty JSON (two-space indent).
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), AnnotationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// `<image_path>.annotations.json`, keeping the image extension.
pub fn annotation_path_for(image_path: impl AsRef<Path>) -> PathBuf {
    let mut s: OsString = image_path.as_ref().as_os_str().to_owned();
    s.push(".annotations.json");
    PathBuf::from(s)
}
