//! Square fiducial markers for metric calibration.
//!
//! This crate covers the whole marker path for a 4×4 bit family:
//! - the embedded dictionary (compiled in from `data/*_CODES.json`),
//! - rotation-aware code matching,
//! - quad candidates from the contours of dark blobs,
//! - per-quad bit decoding and [`ArucoDetector`],
//! - marker rendering for printing and synthetic scenes.

pub mod builtins;
mod candidates;
mod decode;
mod detector;
mod dictionary;
mod matcher;
mod render;
mod threshold;

pub use detector::{ArucoDetector, ArucoDetectorParams, Marker};
pub use dictionary::Dictionary;
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use render::render_marker;
pub use threshold::ThresholdMode;
