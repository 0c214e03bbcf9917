//! Marker-calibrated length measurement on photographs.
//!
//! This crate provides:
//! - re-exports of the geometric core and the marker detector,
//! - scale estimation from markers of known size,
//! - top-down rectification from four corner markers,
//! - the two-line vertical depth correction,
//! - [`MeasurementSession`], which keeps shapes and calibration consistent,
//! - annotation JSON, label configuration and scripted sessions.
//!
//! ## Quickstart
//!
//! ```no_run
//! use markmeasure::{ArucoDetector, MeasurementSession};
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = MeasurementSession::open("bench.jpg")?;
//! let detector = ArucoDetector::default();
//! if session.detect_scale(&detector, 60.0).is_some() {
//!     session.add_line(Point2::new(120.0, 300.0), Point2::new(480.0, 300.0));
//! }
//! let saved = session.save_annotations()?;
//! println!("wrote {}", saved.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `markmeasure::core`: homographies, image buffers, warping, logging.
//! - `markmeasure::aruco`: the 4×4 dictionary, detector and renderer.
//! - [`scale`], [`rectify`], [`depth`]: the calibration steps.
//! - [`session`], [`shape`]: stateful annotation.
//! - [`io`], [`labels`], [`script`]: file formats.

pub use markmeasure_aruco as aruco;
pub use markmeasure_core as core;

pub mod depth;
pub mod image_io;
pub mod io;
pub mod labels;
pub mod rectify;
pub mod scale;
pub mod script;
pub mod session;
pub mod shape;

pub use depth::{fit_two_lines, DepthCorrectionModel, ReferenceLine};
pub use io::{annotation_path_for, AnnotationFile, AnnotationIoError, ShapeRecord};
pub use labels::{LabelConfig, LabelConfigError};
pub use markmeasure_aruco::{ArucoDetector, ArucoDetectorParams, Marker};
pub use rectify::{rectify_topdown, Rectification};
pub use scale::{estimate_px_per_mm, ScaleEstimate};
pub use script::{run_script, Action, ActionOutcome, ScriptError, ScriptReport, SessionScript};
pub use session::{CalibrationState, LineReading, MeasurementSession, RectifySummary, SessionError};
pub use shape::{LineSegment, Rect, Shape};

/// Install a `tracing` subscriber at `level` and route `log` records into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, level: log::LevelFilter) {
    let _ = tracing_log::LogTracer::init();
    markmeasure_core::init_tracing(json, level);
}
