//! Headless sessions driven by a JSON action list.
//!
//! A script names an image, optional label configuration and a sequence of
//! annotation and calibration actions. Actions whose preconditions fail are
//! recorded as rejected and the run continues, so one report shows every
//! step that needs the operator's attention.

use crate::image_io::save_rgb;
use crate::io::{annotation_path_for, AnnotationFile, AnnotationIoError};
use crate::labels::{LabelConfig, LabelConfigError};
use crate::session::{CalibrationState, MeasurementSession, SessionError};
use crate::shape::Rect;
use crate::DepthCorrectionModel;
use markmeasure_aruco::{ArucoDetector, ArucoDetectorParams};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Labels(#[from] LabelConfigError),
    #[error(transparent)]
    Annotations(#[from] AnnotationIoError),
    #[error("failed to write {path}: {source}")]
    SaveImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    SetLabel {
        label: String,
    },
    /// Marker size defaults to the script / label configuration value.
    DetectScale {
        #[serde(default)]
        marker_mm: Option<f64>,
    },
    Rectify {
        #[serde(default)]
        marker_mm: Option<f64>,
    },
    /// Negative sizes are normalized.
    Box {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        #[serde(default)]
        label: Option<String>,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(default)]
        label: Option<String>,
    },
    CalibrateLine {
        known_mm: f64,
    },
    CalibrateDepth {
        true_width_mm: f64,
        depth_mm: f64,
    },
    Undo,
    SaveRectified {
        path: String,
    },
    /// Continue from a saved annotation file for the same image.
    LoadAnnotations {
        path: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetLabel { .. } => "set_label",
            Action::DetectScale { .. } => "detect_scale",
            Action::Rectify { .. } => "rectify",
            Action::Box { .. } => "box",
            Action::Line { .. } => "line",
            Action::CalibrateLine { .. } => "calibrate_line",
            Action::CalibrateDepth { .. } => "calibrate_depth",
            Action::Undo => "undo",
            Action::SaveRectified { .. } => "save_rectified",
            Action::LoadAnnotations { .. } => "load_annotations",
        }
    }
}

/// Script file contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionScript {
    pub image_path: String,
    #[serde(default)]
    pub labels_path: Option<String>,
    /// Overrides `default_marker_size_mm` from the labels file.
    #[serde(default)]
    pub marker_size_mm: Option<f64>,
    /// Annotation output; defaults to `<image_path>.annotations.json`.
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub detector: Option<ArucoDetectorParams>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl SessionScript {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ScriptError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| annotation_path_for(&self.image_path))
    }
}

/// Result of one action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub op: String,
    pub applied: bool,
    /// Scale, corrected length or similar headline number, when there is one.
    #[serde(default)]
    pub value: Option<f64>,
    pub message: String,
}

impl ActionOutcome {
    fn applied(action: &Action, value: Option<f64>, message: impl Into<String>) -> Self {
        Self {
            op: action.name().to_string(),
            applied: true,
            value,
            message: message.into(),
        }
    }

    fn rejected(action: &Action, message: impl Into<String>) -> Self {
        Self {
            op: action.name().to_string(),
            applied: false,
            value: None,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptReport {
    pub image_path: String,
    pub annotations_path: String,
    pub state: CalibrationState,
    pub px_per_mm: Option<f64>,
    pub depth_model: DepthCorrectionModel,
    pub shape_count: usize,
    pub outcomes: Vec<ActionOutcome>,
}

/// Shared inputs for applying actions to a session.
pub struct ScriptContext {
    pub detector: ArucoDetector,
    pub marker_mm: f64,
}

/// Apply one action. Only output failures are errors.
pub fn apply_action(
    session: &mut MeasurementSession,
    ctx: &ScriptContext,
    action: &Action,
) -> Result<ActionOutcome, ScriptError> {
    let outcome = match action {
        Action::SetLabel { label } => {
            session.set_current_label(label.clone());
            ActionOutcome::applied(action, None, format!("label \"{label}\""))
        }
        Action::DetectScale { marker_mm } => {
            let mm = marker_mm.unwrap_or(ctx.marker_mm);
            match session.detect_scale(&ctx.detector, mm) {
                Some(s) => ActionOutcome::applied(action, Some(s), format!("px/mm: {s:.3}")),
                None => ActionOutcome::rejected(action, "no markers detected"),
            }
        }
        Action::Rectify { marker_mm } => {
            let mm = marker_mm.unwrap_or(ctx.marker_mm);
            match session.rectify_topdown(&ctx.detector, mm) {
                Some(r) => ActionOutcome::applied(
                    action,
                    r.px_per_mm,
                    match r.px_per_mm {
                        Some(s) => format!("{}x{} px/mm: {s:.3}", r.width, r.height),
                        None => format!("{}x{} px/mm: -", r.width, r.height),
                    },
                ),
                None => ActionOutcome::rejected(action, "need four markers at the corners"),
            }
        }
        Action::Box { x, y, w, h, label } => {
            let rect = Rect::from_corners(Point2::new(*x, *y), Point2::new(x + w, y + h));
            let label = label.clone().unwrap_or_else(|| session.current_label().to_string());
            match session.add_box_labeled(label, rect) {
                Some(i) => ActionOutcome::applied(action, None, format!("shape {i}")),
                None => ActionOutcome::rejected(action, "box sides must exceed 5 px"),
            }
        }
        Action::Line {
            x1,
            y1,
            x2,
            y2,
            label,
        } => {
            let (p1, p2) = (Point2::new(*x1, *y1), Point2::new(*x2, *y2));
            let reading = session.preview_line(p1, p2);
            let label = label.clone().unwrap_or_else(|| session.current_label().to_string());
            match session.add_line_labeled(label, p1, p2) {
                Some(i) => {
                    let value = session.shapes()[i].as_line().and_then(|l| l.corrected_mm);
                    ActionOutcome::applied(action, value, format!("shape {i}: {reading}"))
                }
                None => ActionOutcome::rejected(action, "line must exceed 5 px"),
            }
        }
        Action::CalibrateLine { known_mm } => match session.calibrate_from_single_line(*known_mm) {
            Some(s) => ActionOutcome::applied(action, Some(s), format!("px/mm: {s:.3}")),
            None => ActionOutcome::rejected(action, "draw a line and give a positive length"),
        },
        Action::CalibrateDepth {
            true_width_mm,
            depth_mm,
        } => match session.calibrate_depth_two_lines(*true_width_mm, *depth_mm) {
            Some(m) => ActionOutcome::applied(
                action,
                None,
                format!("alpha {:.6} beta {:.3e}", m.alpha, m.beta),
            ),
            None => ActionOutcome::rejected(
                action,
                "draw two horizontal lines on the same raised face after setting the scale",
            ),
        },
        Action::Undo => match session.undo() {
            Some(shape) => ActionOutcome::applied(action, None, format!("removed \"{}\"", shape.label())),
            None => ActionOutcome::rejected(action, "nothing to undo"),
        },
        Action::SaveRectified { path } => {
            save_rgb(session.image(), path).map_err(|source| ScriptError::SaveImage {
                path: PathBuf::from(path),
                source,
            })?;
            ActionOutcome::applied(action, None, format!("wrote {path}"))
        }
        Action::LoadAnnotations { path } => match AnnotationFile::load_json(path) {
            Ok(file) => {
                session.restore_annotations(&file);
                ActionOutcome::applied(
                    action,
                    session.px_per_mm(),
                    format!("{} shapes from {path}", session.shapes().len()),
                )
            }
            Err(e) => ActionOutcome::rejected(action, format!("{path}: {e}")),
        },
    };

    if outcome.applied {
        log::info!("{}: {}", outcome.op, outcome.message);
    } else {
        log::warn!("{} rejected: {}", outcome.op, outcome.message);
    }
    Ok(outcome)
}

/// Open the image, run every action and write the annotation file.
pub fn run_script(script: &SessionScript) -> Result<ScriptReport, ScriptError> {
    let labels = match &script.labels_path {
        Some(p) => LabelConfig::load_json(p)?,
        None => LabelConfig::default(),
    };
    let ctx = ScriptContext {
        detector: ArucoDetector::new(script.detector.clone().unwrap_or_default()),
        marker_mm: script
            .marker_size_mm
            .unwrap_or(labels.default_marker_size_mm),
    };

    let mut session = MeasurementSession::open(&script.image_path)?;
    session.set_current_label(labels.default_label());

    let outcomes = script
        .actions
        .iter()
        .map(|a| apply_action(&mut session, &ctx, a))
        .collect::<Result<Vec<_>, _>>()?;

    let out = script.output_path();
    session.to_annotation_file().write_json(&out)?;

    Ok(ScriptReport {
        image_path: script.image_path.clone(),
        annotations_path: out.display().to_string(),
        state: session.state(),
        px_per_mm: session.px_per_mm(),
        depth_model: session.depth_model(),
        shape_count: session.shapes().len(),
        outcomes,
    })
}
