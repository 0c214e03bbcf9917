//! End-to-end marker detection on a full image.

use crate::builtins::DICT_4X4_50;
use crate::candidates::{find_quads, QuadFilter};
use crate::decode::{DecodeConfig, Decoded, QuadDecoder};
use crate::threshold::{binarize_dark, ThresholdMode};
use crate::{Dictionary, Matcher};
use markmeasure_core::{quad_centroid, GrayImageView, RgbImageView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Detector tuning. Every field has a default so partial JSON works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArucoDetectorParams {
    pub threshold: ThresholdMode,
    /// Shortest accepted quad side, in pixels.
    pub min_side_px: f64,
    /// Polygon simplification tolerance relative to the contour perimeter.
    pub polygon_epsilon_rel: f64,
    /// Accepted bit errors; `None` uses the dictionary's correction capacity.
    pub max_hamming: Option<u8>,
    pub border_bits: usize,
    pub inset_frac: f32,
    pub min_distance_to_border_px: f64,
    pub min_border_score: f32,
    /// Candidates whose centres are closer than this are the same marker.
    pub dedup_radius_px: f64,
}

impl Default for ArucoDetectorParams {
    fn default() -> Self {
        Self {
            threshold: ThresholdMode::default(),
            min_side_px: 12.0,
            polygon_epsilon_rel: 0.05,
            max_hamming: None,
            border_bits: 1,
            inset_frac: 0.25,
            min_distance_to_border_px: 3.0,
            min_border_score: 0.85,
            dedup_radius_px: 4.0,
        }
    }
}

/// One decoded marker in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: u32,
    /// TL, TR, BR, BL in the marker's own frame.
    pub corners: [Point2<f32>; 4],
    /// Quarter turns between the marker frame and the image frame.
    pub rotation: u8,
    pub hamming: u8,
    pub border_score: f32,
}

impl Marker {
    pub fn corners_f64(&self) -> [Point2<f64>; 4] {
        self.corners.map(|p| Point2::new(p.x as f64, p.y as f64))
    }

    pub fn centre(&self) -> Point2<f64> {
        quad_centroid(&self.corners_f64())
    }
}

#[derive(Clone, Debug)]
pub struct ArucoDetector {
    params: ArucoDetectorParams,
    matcher: Matcher,
}

impl Default for ArucoDetector {
    fn default() -> Self {
        Self::new(ArucoDetectorParams::default())
    }
}

impl ArucoDetector {
    /// Detector over the built-in 4×4 / 50 symbol dictionary.
    pub fn new(params: ArucoDetectorParams) -> Self {
        Self::with_dictionary(DICT_4X4_50, params)
    }

    pub fn with_dictionary(dict: Dictionary, params: ArucoDetectorParams) -> Self {
        let max_hamming = params.max_hamming.unwrap_or(dict.max_correction_bits);
        Self {
            matcher: Matcher::new(dict, max_hamming),
            params,
        }
    }

    pub fn params(&self) -> &ArucoDetectorParams {
        &self.params
    }

    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    /// Find and decode every marker; an empty list when nothing decodes.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn detect(&self, image: &GrayImageView<'_>) -> Vec<Marker> {
        if image.width == 0 || image.height == 0 {
            return Vec::new();
        }
        let Some(gray) = imageproc::image::GrayImage::from_raw(
            image.width as u32,
            image.height as u32,
            image.data.to_vec(),
        ) else {
            log::warn!(
                "gray buffer of {} bytes does not match {}x{}",
                image.data.len(),
                image.width,
                image.height
            );
            return Vec::new();
        };

        let p = &self.params;
        if !p.polygon_epsilon_rel.is_finite() || p.polygon_epsilon_rel <= 0.0 {
            log::warn!(
                "polygon_epsilon_rel must be positive, got {}",
                p.polygon_epsilon_rel
            );
            return Vec::new();
        }
        let filter = QuadFilter {
            min_side_px: p.min_side_px,
            polygon_epsilon_rel: p.polygon_epsilon_rel,
            min_distance_to_border_px: p.min_distance_to_border_px,
        };
        let quads: Vec<[Point2<f64>; 4]> = binarize_dark(&gray, p.threshold)
            .iter()
            .flat_map(|mask| find_quads(mask, &filter))
            .collect();

        let cfg = DecodeConfig {
            border_bits: p.border_bits,
            inset_frac: p.inset_frac,
            min_border_score: p.min_border_score,
        };
        let Some(mut decoder) = QuadDecoder::new(cfg, &self.matcher) else {
            return Vec::new();
        };
        let decoded: Vec<Decoded> = quads
            .iter()
            .filter_map(|q| decoder.decode(image, q))
            .collect();

        let markers = dedup_by_centre(decoded, p.dedup_radius_px);
        log::debug!(
            "{} quad candidates, {} markers decoded",
            quads.len(),
            markers.len()
        );
        markers
    }

    /// Convert to luma and run [`ArucoDetector::detect`].
    pub fn detect_rgb(&self, image: &RgbImageView<'_>) -> Vec<Marker> {
        let gray = image.to_gray();
        self.detect(&gray.view())
    }
}

/// Keep the strongest read of each physical marker, preserving discovery order.
fn dedup_by_centre(decoded: Vec<Decoded>, radius: f64) -> Vec<Marker> {
    let mut order: Vec<usize> = (0..decoded.len()).collect();
    order.sort_by(|&a, &b| {
        let (da, db) = (&decoded[a], &decoded[b]);
        db.border_score
            .total_cmp(&da.border_score)
            .then(da.hamming.cmp(&db.hamming))
            .then(a.cmp(&b))
    });

    let centres: Vec<Point2<f64>> = decoded.iter().map(|d| quad_centroid(&d.corners)).collect();
    let mut kept: Vec<usize> = Vec::with_capacity(decoded.len());
    for i in order {
        if kept
            .iter()
            .all(|&k| (centres[k] - centres[i]).norm() > radius)
        {
            kept.push(i);
        }
    }
    kept.sort_unstable();

    kept.into_iter()
        .map(|i| {
            let d = &decoded[i];
            Marker {
                id: d.id,
                corners: d.corners.map(|p| Point2::new(p.x as f32, p.y as f32)),
                rotation: d.rotation,
                hamming: d.hamming,
                border_score: d.border_score,
            }
        })
        .collect()
}
