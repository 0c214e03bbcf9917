//! Thresholding utilities: Otsu split for bit samples and whole-image
//! binarization for quad finding.

use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::box_filter;
use imageproc::image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// How the detector separates dark marker ink from the background.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// One global Otsu level for the whole image.
    Otsu,
    /// Dark when `pixel + offset < local mean` over a `(2r+1)²` box.
    Adaptive { block_radius: u32, offset: i16 },
    /// Both of the above. Quads are collected from each mask in turn, so
    /// evenly lit scenes keep the Otsu corners and shaded ones still read.
    OtsuAndAdaptive { block_radius: u32, offset: i16 },
}

impl Default for ThresholdMode {
    fn default() -> Self {
        Self::OtsuAndAdaptive {
            block_radius: 11,
            offset: 7,
        }
    }
}

/// Compute an Otsu threshold from a set of sample intensities.
///
/// Values strictly below the returned level are dark.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let (min_v, max_v) = samples
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16 + 1) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            // Pixels equal to `t` belong to the dark class.
            best_t = (t + 1).min(255) as u8;
        }
    }

    best_t
}

/// Foreground masks, one per pass: 255 where the pixel counts as dark ink.
pub(crate) fn binarize_dark(gray: &GrayImage, mode: ThresholdMode) -> Vec<GrayImage> {
    match mode {
        ThresholdMode::Otsu => vec![otsu_mask(gray)],
        ThresholdMode::Adaptive {
            block_radius,
            offset,
        } => vec![adaptive_mask(gray, block_radius, offset)],
        ThresholdMode::OtsuAndAdaptive {
            block_radius,
            offset,
        } => vec![otsu_mask(gray), adaptive_mask(gray, block_radius, offset)],
    }
}

fn otsu_mask(gray: &GrayImage) -> GrayImage {
    threshold(gray, otsu_level(gray), ThresholdType::BinaryInverted)
}

fn adaptive_mask(gray: &GrayImage, block_radius: u32, offset: i16) -> GrayImage {
    let r = block_radius.max(1);
    let mean = box_filter(gray, r, r);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        let local = mean.get_pixel(x, y).0[0] as i16;
        if (p.0[0] as i16) + offset < local {
            out.put_pixel(x, y, Luma([255]));
        }
    }
    out
}
