//! Pixels-per-millimetre from detected markers of known size.

use markmeasure_aruco::Marker;
use markmeasure_core::quad_mean_side;
use serde::{Deserialize, Serialize};

/// Mean scale over the markers that contributed to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleEstimate {
    pub px_per_mm: f64,
    pub markers_used: usize,
}

/// Mean side length of one marker divided by its physical side.
pub fn marker_px_per_mm(marker: &Marker, marker_mm: f64) -> f64 {
    quad_mean_side(&marker.corners_f64()) / marker_mm
}

/// Plain arithmetic mean of the per-marker scales.
///
/// `None` for an empty detection or a non-positive marker size.
pub fn estimate_px_per_mm(markers: &[Marker], marker_mm: f64) -> Option<ScaleEstimate> {
    if markers.is_empty() || !marker_mm.is_finite() || marker_mm <= 0.0 {
        return None;
    }
    let sum: f64 = markers.iter().map(|m| marker_px_per_mm(m, marker_mm)).sum();
    let px_per_mm = sum / markers.len() as f64;
    (px_per_mm.is_finite() && px_per_mm > 0.0).then_some(ScaleEstimate {
        px_per_mm,
        markers_used: markers.len(),
    })
}
