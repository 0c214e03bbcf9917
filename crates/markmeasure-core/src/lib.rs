//! Geometric core for marker-based metric measurement.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! decode image files or detect markers; it provides the homography solver,
//! light image views, bilinear sampling and the perspective warp used by
//! `markmeasure-aruco` and `markmeasure`.

mod homography;
mod image;
mod logger;
mod quad;
mod warp;

pub use homography::{homography_from_4pt, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_rgb, GrayImage, GrayImageView, RgbImage, RgbImageView,
};
pub use quad::{
    is_convex_quad, quad_centroid, quad_mean_side, quad_side_lengths, quad_signed_area,
};
pub use warp::warp_perspective_rgb;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
