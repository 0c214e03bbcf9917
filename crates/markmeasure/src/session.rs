//! Stateful measurement over one loaded image.
//!
//! The session owns the working image, the current scale, the depth model and
//! the ordered shape list. Every calibration change re-derives the millimetre
//! fields of the stored lines so they never go stale.

use crate::depth::{fit_two_lines, DepthCorrectionModel, ReferenceLine};
use crate::image_io::load_rgb;
use crate::io::{annotation_path_for, AnnotationFile, AnnotationIoError, ShapeRecord};
use crate::rectify::rectify_topdown;
use crate::scale::estimate_px_per_mm;
use crate::shape::{BoxShape, LineSegment, LineShape, Rect, Shape};
use markmeasure_aruco::ArucoDetector;
use markmeasure_core::{Homography, RgbImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Depth fits use the most recent reference lines, at most this many.
const REFERENCE_HISTORY: usize = 2;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    Uncalibrated,
    Scaled,
    DepthCorrected,
}

/// What a line would read, for live feedback while it is being drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineReading {
    /// Depth-corrected millimetres.
    Millimetres(f64),
    /// Raw length while no scale is set.
    Pixels(f64),
}

impl fmt::Display for LineReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineReading::Millimetres(mm) => write!(f, "{mm:.1} mm"),
            LineReading::Pixels(px) => write!(f, "{px:.0} px"),
        }
    }
}

/// Outcome of [`MeasurementSession::rectify_topdown`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectifySummary {
    pub width: usize,
    pub height: usize,
    pub homography: Homography,
    pub px_per_mm: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct MeasurementSession {
    image: RgbImage,
    image_path: Option<PathBuf>,
    px_per_mm: Option<f64>,
    depth_model: DepthCorrectionModel,
    depth_mm: Option<f64>,
    shapes: Vec<Shape>,
    reference_lines: Vec<ReferenceLine>,
    homography: Option<Homography>,
    current_label: String,
}

impl MeasurementSession {
    pub fn new(image: RgbImage, image_path: Option<PathBuf>) -> Self {
        Self {
            image,
            image_path,
            px_per_mm: None,
            depth_model: DepthCorrectionModel::identity(),
            depth_mm: None,
            shapes: Vec::new(),
            reference_lines: Vec::new(),
            homography: None,
            current_label: String::new(),
        }
    }

    /// Decode `path` and start an uncalibrated session on it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let image = load_rgb(path).map_err(|source| SessionError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded {} ({}x{})", path.display(), image.width, image.height);
        Ok(Self::new(image, Some(path.to_path_buf())))
    }

    /// Replace the image and reset all calibration and shapes. The current
    /// label is kept.
    pub fn load_image(&mut self, image: RgbImage, image_path: Option<PathBuf>) {
        let label = std::mem::take(&mut self.current_label);
        *self = Self::new(image, image_path);
        self.current_label = label;
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    pub fn px_per_mm(&self) -> Option<f64> {
        self.px_per_mm
    }

    pub fn depth_model(&self) -> DepthCorrectionModel {
        self.depth_model
    }

    pub fn depth_mm(&self) -> Option<f64> {
        self.depth_mm
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Oldest first, at most two.
    pub fn reference_lines(&self) -> &[ReferenceLine] {
        &self.reference_lines
    }

    /// Source-to-rectified transform of the last rectification, if any.
    pub fn homography(&self) -> Option<&Homography> {
        self.homography.as_ref()
    }

    pub fn state(&self) -> CalibrationState {
        match self.px_per_mm {
            None => CalibrationState::Uncalibrated,
            Some(_) if self.depth_model.is_identity() => CalibrationState::Scaled,
            Some(_) => CalibrationState::DepthCorrected,
        }
    }

    pub fn current_label(&self) -> &str {
        &self.current_label
    }

    pub fn set_current_label(&mut self, label: impl Into<String>) {
        self.current_label = label.into();
    }

    pub fn add_box(&mut self, rect: Rect) -> Option<usize> {
        let label = self.current_label.clone();
        self.add_box_labeled(label, rect)
    }

    /// Store a box; `None` (and no change) unless both sides exceed 5 px.
    pub fn add_box_labeled(&mut self, label: impl Into<String>, rect: Rect) -> Option<usize> {
        if !rect.is_large_enough() {
            log::debug!("discarding {:.1}x{:.1} px box", rect.width, rect.height);
            return None;
        }
        self.shapes.push(Shape::Box(BoxShape {
            label: label.into(),
            rect,
        }));
        Some(self.shapes.len() - 1)
    }

    pub fn add_line(&mut self, p1: Point2<f64>, p2: Point2<f64>) -> Option<usize> {
        let label = self.current_label.clone();
        self.add_line_labeled(label, p1, p2)
    }

    /// Store a measurement line; `None` (and no change) unless it is longer
    /// than 5 px. Lines drawn with a scale set become depth-fit references.
    pub fn add_line_labeled(
        &mut self,
        label: impl Into<String>,
        p1: Point2<f64>,
        p2: Point2<f64>,
    ) -> Option<usize> {
        let segment = LineSegment::new(p1, p2);
        if !segment.is_long_enough() {
            log::debug!("discarding {:.1} px line", segment.length_px());
            return None;
        }
        let base_mm = self.base_mm(&segment);
        let line = LineShape {
            label: label.into(),
            segment,
            base_mm,
            corrected_mm: base_mm.map(|mm| self.depth_model.correct(mm, segment.mid_y())),
            depth_mm: self.depth_mm,
            reference: base_mm.is_some(),
        };
        self.shapes.push(Shape::Line(line));
        self.rebuild_reference_lines();
        Some(self.shapes.len() - 1)
    }

    /// Reading a line from `p1` to `p2` would get, without storing it.
    pub fn preview_line(&self, p1: Point2<f64>, p2: Point2<f64>) -> LineReading {
        let segment = LineSegment::new(p1, p2);
        match self.base_mm(&segment) {
            Some(mm) => LineReading::Millimetres(self.depth_model.correct(mm, segment.mid_y())),
            None => LineReading::Pixels(segment.length_px()),
        }
    }

    /// Set the scale from markers in the working image.
    ///
    /// Leaves the session untouched when no marker is found.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, detector)))]
    pub fn detect_scale(&mut self, detector: &ArucoDetector, marker_mm: f64) -> Option<f64> {
        let markers = detector.detect_rgb(&self.image.view());
        let est = estimate_px_per_mm(&markers, marker_mm)?;
        log::info!(
            "scale {:.4} px/mm from {} marker(s)",
            est.px_per_mm,
            est.markers_used
        );
        self.set_scale(Some(est.px_per_mm));
        Some(est.px_per_mm)
    }

    /// Replace the working image with its top-down view and adopt the
    /// re-measured scale, which may be absent.
    ///
    /// Leaves the session untouched when fewer than four markers are found.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, detector)))]
    pub fn rectify_topdown(&mut self, detector: &ArucoDetector, marker_mm: f64) -> Option<RectifySummary> {
        let rect = rectify_topdown(&self.image, detector, marker_mm)?;
        if !self.shapes.is_empty() {
            log::warn!(
                "rectifying with {} shape(s) drawn on the unrectified image",
                self.shapes.len()
            );
        }
        let summary = RectifySummary {
            width: rect.image.width,
            height: rect.image.height,
            homography: rect.homography,
            px_per_mm: rect.px_per_mm,
        };
        self.image = rect.image;
        self.homography = Some(rect.homography);
        self.set_scale(rect.px_per_mm);
        Some(summary)
    }

    /// Declare the most recent line to measure `known_mm` and derive the scale
    /// from it. Existing depth coefficients are kept.
    pub fn calibrate_from_single_line(&mut self, known_mm: f64) -> Option<f64> {
        if !known_mm.is_finite() || known_mm <= 0.0 {
            return None;
        }
        let last = self.shapes.iter().rev().find_map(Shape::as_line)?;
        let px_per_mm = last.segment.length_px() / known_mm;
        log::info!("scale {px_per_mm:.4} px/mm from a {known_mm} mm line");
        self.set_scale(Some(px_per_mm));
        Some(px_per_mm)
    }

    /// Fit the depth model from the two most recent reference lines, both of
    /// which measure `true_width_mm`, and re-correct every line.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn calibrate_depth_two_lines(
        &mut self,
        true_width_mm: f64,
        depth_mm: f64,
    ) -> Option<DepthCorrectionModel> {
        self.px_per_mm?;
        if !depth_mm.is_finite() {
            return None;
        }
        let [a, b] = self.reference_lines.as_slice() else {
            return None;
        };
        let model = fit_two_lines(a, b, true_width_mm)?;
        log::info!(
            "depth model alpha {:.6} beta {:.3e} at {depth_mm} mm",
            model.alpha,
            model.beta
        );

        self.depth_model = model;
        self.depth_mm = Some(depth_mm);
        for line in self.lines_mut() {
            if let Some(base) = line.base_mm {
                line.corrected_mm = Some(model.correct(base, line.segment.mid_y()));
                line.depth_mm = Some(depth_mm);
            }
        }
        Some(model)
    }

    /// Remove the most recent shape; a no-op on an empty session.
    pub fn undo(&mut self) -> Option<Shape> {
        let shape = self.shapes.pop()?;
        self.rebuild_reference_lines();
        Some(shape)
    }

    pub fn to_annotation_file(&self) -> AnnotationFile {
        AnnotationFile {
            image_path: self
                .image_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            px_per_mm: self.px_per_mm,
            scale_correction: self.depth_model,
            depth_mm: self.depth_mm,
            shapes: self.shapes.iter().map(ShapeRecord::from).collect(),
        }
    }

    /// Replace shapes and calibration with a saved snapshot of this image.
    ///
    /// Millimetre fields are derived again from the restored scale and depth
    /// model. Lines saved with a millimetre value count as references.
    pub fn restore_annotations(&mut self, file: &AnnotationFile) {
        self.shapes = file.shapes.iter().map(Shape::from).collect();
        self.depth_model = file.scale_correction;
        self.depth_mm = file.depth_mm;
        self.set_scale(file.px_per_mm.filter(|s| s.is_finite() && *s > 0.0));
        log::info!(
            "restored {} shapes, state {:?}",
            self.shapes.len(),
            self.state()
        );
    }

    /// Write `<image_path>.annotations.json` and return its path.
    pub fn save_annotations(&self) -> Result<PathBuf, AnnotationIoError> {
        let image_path = self.image_path.as_ref().ok_or(AnnotationIoError::NoImagePath)?;
        let out = annotation_path_for(image_path);
        self.to_annotation_file().write_json(&out)?;
        log::info!("wrote {}", out.display());
        Ok(out)
    }

    fn base_mm(&self, segment: &LineSegment) -> Option<f64> {
        self.px_per_mm.map(|s| segment.length_px() / s)
    }

    fn lines_mut(&mut self) -> impl Iterator<Item = &mut LineShape> {
        self.shapes.iter_mut().filter_map(|s| match s {
            Shape::Line(l) => Some(l),
            Shape::Box(_) => None,
        })
    }

    fn set_scale(&mut self, px_per_mm: Option<f64>) {
        self.px_per_mm = px_per_mm;
        let model = self.depth_model;
        for line in self.lines_mut() {
            let base = px_per_mm.map(|s| line.segment.length_px() / s);
            line.base_mm = base;
            line.corrected_mm = base.map(|mm| model.correct(mm, line.segment.mid_y()));
        }
        self.rebuild_reference_lines();
    }

    fn rebuild_reference_lines(&mut self) {
        let mut recent: Vec<ReferenceLine> = self
            .shapes
            .iter()
            .rev()
            .filter_map(Shape::as_line)
            .filter(|l| l.reference)
            .filter_map(|l| {
                l.base_mm.map(|base_mm| ReferenceLine {
                    y_mid: l.segment.mid_y(),
                    base_mm,
                })
            })
            .take(REFERENCE_HISTORY)
            .collect();
        recent.reverse();
        self.reference_lines = recent;
    }
}
