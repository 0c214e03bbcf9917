#![allow(dead_code)]

use markmeasure::aruco::builtins::DICT_4X4_50;
use markmeasure::aruco::render_marker;
use markmeasure::core::{GrayImage, RgbImage};

pub const PAPER: u8 = 235;

pub fn paper(width: usize, height: usize) -> GrayImage {
    GrayImage::filled(width, height, PAPER)
}

/// Paste marker `id` (one-cell border, no quiet zone) with its top-left at `(x0, y0)`.
pub fn paste_marker(dst: &mut GrayImage, id: u32, cell_px: usize, x0: usize, y0: usize) {
    let m = render_marker(&DICT_4X4_50, id, cell_px, 0).expect("render");
    for y in 0..m.height {
        let row = (y0 + y) * dst.width + x0;
        dst.data[row..row + m.width].copy_from_slice(&m.data[y * m.width..(y + 1) * m.width]);
    }
}

pub fn to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage {
        width: gray.width,
        height: gray.height,
        data: gray.data.iter().flat_map(|&v| [v, v, v]).collect(),
    }
}

/// 640×480 bench with four 84 px markers near the corners. Their centroids
/// span (81.5, 81.5) to (581.5, 401.5).
pub fn corner_bench() -> GrayImage {
    let mut img = paper(640, 480);
    paste_marker(&mut img, 1, 14, 40, 40);
    paste_marker(&mut img, 2, 14, 540, 40);
    paste_marker(&mut img, 3, 14, 40, 360);
    paste_marker(&mut img, 4, 14, 540, 360);
    img
}

/// [`corner_bench`] plus a 24 px gauge marker just inside the bottom edge of
/// the centroid rectangle. It is found after the corner markers.
pub fn bench_scene() -> GrayImage {
    let mut img = corner_bench();
    paste_marker(&mut img, 10, 4, 308, 362);
    img
}

pub fn save_png(img: &GrayImage, path: &std::path::Path) {
    markmeasure::image_io::save_rgb(&to_rgb(img), path).expect("save png");
}
