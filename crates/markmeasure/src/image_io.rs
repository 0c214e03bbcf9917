//! Adapters between the `image` crate and the lightweight core buffers.

use image::error::{ImageError, ParameterError, ParameterErrorKind};
use markmeasure_core::{GrayImage, RgbImage};
use std::path::Path;

pub fn rgb_from_dynamic(img: image::DynamicImage) -> RgbImage {
    let rgb = img.to_rgb8();
    RgbImage {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
        data: rgb.into_raw(),
    }
}

/// Decode any supported file format into 8-bit RGB.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, ImageError> {
    Ok(rgb_from_dynamic(image::open(path)?))
}

fn dimension_mismatch() -> ImageError {
    ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch))
}

/// Encode by file extension.
pub fn save_rgb(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let buf = image::RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .ok_or_else(dimension_mismatch)?;
    buf.save(path)
}

pub fn save_gray(img: &GrayImage, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let buf = image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .ok_or_else(dimension_mismatch)?;
    buf.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trip_keeps_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rgb.png");
        let img = RgbImage {
            width: 3,
            height: 2,
            data: (0..18).map(|v| (v * 13) as u8).collect(),
        };
        save_rgb(&img, &path).expect("save");
        assert_eq!(load_rgb(&path).expect("load"), img);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let img = GrayImage {
            width: 4,
            height: 4,
            data: vec![0; 3],
        };
        assert!(save_gray(&img, dir.path().join("bad.png")).is_err());
    }
}
