//! Top-down rectification from four markers placed at the corners of a
//! planar region.

use crate::scale::estimate_px_per_mm;
use markmeasure_aruco::{ArucoDetector, Marker};
use markmeasure_core::{homography_from_4pt, quad_centroid, warp_perspective_rgb, Homography, RgbImage};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Result of a successful rectification.
#[derive(Clone, Debug)]
pub struct Rectification {
    /// Fronto-parallel view, `width × height` from [`rectified_size`].
    pub image: RgbImage,
    /// Maps source pixels to rectified pixels.
    pub homography: Homography,
    /// Scale re-measured on the rectified view; `None` when no marker there
    /// decodes in full (corner markers are cut by the crop).
    pub px_per_mm: Option<f64>,
    /// Marker centroids used, ordered TL, TR, BR, BL.
    pub source_quad: [Point2<f64>; 4],
}

pub fn marker_centroid(marker: &Marker) -> Point2<f64> {
    quad_centroid(&marker.corners_f64())
}

/// Split into the two upper and two lower points, each pair by ascending x.
///
/// The result depends only on geometry, never on input order.
pub fn order_tl_tr_br_bl(points: [Point2<f64>; 4]) -> [Point2<f64>; 4] {
    let mut pts = points;
    pts.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    let (mut top, mut bottom) = ([pts[0], pts[1]], [pts[2], pts[3]]);
    top.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    bottom.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    [top[0], top[1], bottom[1], bottom[0]]
}

/// Output size: ceiling of the longer of each pair of opposite sides.
pub fn rectified_size(ordered: &[Point2<f64>; 4]) -> (usize, usize) {
    let [tl, tr, br, bl] = *ordered;
    let w = (tr - tl).norm().max((br - bl).norm()).ceil();
    let h = (bl - tl).norm().max((br - tr).norm()).ceil();
    ((w as usize).max(1), (h as usize).max(1))
}

/// Homography taking the ordered quad onto `(0,0)-(w-1,h-1)`.
pub fn topdown_homography(ordered: &[Point2<f64>; 4], width: usize, height: usize) -> Option<Homography> {
    let (w, h) = ((width - 1) as f64, (height - 1) as f64);
    let dst = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];
    homography_from_4pt(ordered, &dst)
}

/// Detect markers, warp the plane spanned by the first four to a top-down
/// view and re-measure the scale there.
///
/// `None` when fewer than four markers are found or their centroids are
/// degenerate.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, detector), fields(width = image.width, height = image.height))
)]
pub fn rectify_topdown(image: &RgbImage, detector: &ArucoDetector, marker_mm: f64) -> Option<Rectification> {
    let markers = detector.detect_rgb(&image.view());
    if markers.len() < 4 {
        log::info!("rectification needs 4 markers, found {}", markers.len());
        return None;
    }

    let centroids = [0, 1, 2, 3].map(|i| marker_centroid(&markers[i]));
    let ordered = order_tl_tr_br_bl(centroids);
    let (width, height) = rectified_size(&ordered);
    let homography = topdown_homography(&ordered, width, height)?;
    let h_src_from_dst = homography.inverse()?;

    let warped = warp_perspective_rgb(&image.view(), &h_src_from_dst, width, height);
    let px_per_mm =
        estimate_px_per_mm(&detector.detect_rgb(&warped.view()), marker_mm).map(|s| s.px_per_mm);
    log::debug!("rectified to {width}x{height}, px/mm {px_per_mm:?}");

    Some(Rectification {
        image: warped,
        homography,
        px_per_mm,
        source_quad: ordered,
    })
}
