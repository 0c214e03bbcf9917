use crate::{sample_bilinear_rgb, Homography, RgbImage, RgbImageView};
use nalgebra::Point2;

/// Warp `src` into an `out_w × out_h` image.
///
/// `h_src_from_dst` maps output pixel coordinates back into the source; each
/// output pixel `(x, y)` is sampled bilinearly at `h_src_from_dst * (x, y)`.
/// Output pixels whose preimage falls outside the source stay black.
pub fn warp_perspective_rgb(
    src: &RgbImageView<'_>,
    h_src_from_dst: &Homography,
    out_w: usize,
    out_h: usize,
) -> RgbImage {
    let mut data = vec![0u8; 3 * out_w * out_h];

    for y in 0..out_h {
        for x in 0..out_w {
            let p = h_src_from_dst.apply(Point2::new(x as f64, y as f64));
            if !p.x.is_finite() || !p.y.is_finite() {
                continue;
            }
            let i = 3 * (y * out_w + x);
            data[i..i + 3].copy_from_slice(&sample_bilinear_rgb(src, p.x, p.y));
        }
    }

    RgbImage {
        width: out_w,
        height: out_h,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: usize, h: usize) -> RgbImage {
        let mut data = Vec::with_capacity(3 * w * h);
        for y in 0..h {
            for x in 0..w {
                let v = if (x / 4 + y / 4) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, v / 2, 0]);
            }
        }
        RgbImage {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn identity_warp_copies_pixels() {
        let src = checker(16, 12);
        let out = warp_perspective_rgb(&src.view(), &Homography::identity(), 16, 12);
        assert_eq!(out, src);
    }

    #[test]
    fn translation_shifts_content_and_fills_black() {
        let src = checker(16, 12);
        let shift = Homography::from_array([[1.0, 0.0, 8.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let out = warp_perspective_rgb(&src.view(), &shift, 16, 12);

        let px = |img: &RgbImage, x: usize, y: usize| {
            let i = 3 * (y * img.width + x);
            [img.data[i], img.data[i + 1], img.data[i + 2]]
        };
        assert_eq!(px(&out, 0, 0), px(&src, 8, 0));
        assert_eq!(px(&out, 12, 5), [0, 0, 0]);
    }
}
