use markmeasure_aruco::builtins::DICT_4X4_50;
use markmeasure_aruco::{render_marker, ArucoDetector, ArucoDetectorParams, ThresholdMode};
use markmeasure_core::{
    homography_from_4pt, quad_mean_side, warp_perspective_rgb, GrayImage, Homography, RgbImage,
};
use nalgebra::{Matrix3, Point2};

fn canvas(width: usize, height: usize) -> GrayImage {
    GrayImage::filled(width, height, 235)
}

/// Paste a rendered marker, turned clockwise `quarter_turns` times, at `(x0, y0)`.
fn paste_marker(dst: &mut GrayImage, id: u32, cell_px: usize, x0: usize, y0: usize, quarter_turns: u8) {
    let m = render_marker(&DICT_4X4_50, id, cell_px, 0).expect("render");
    let n = m.width;
    for y in 0..n {
        for x in 0..n {
            // Clockwise: destination (x, y) reads source (y, n-1-x).
            let (sx, sy) = match quarter_turns & 3 {
                0 => (x, y),
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            dst.data[(y0 + y) * dst.width + x0 + x] = m.data[sy * n + sx];
        }
    }
}

fn near(p: Point2<f32>, x: f32, y: f32, tol: f32) -> bool {
    (p.x - x).abs() <= tol && (p.y - y).abs() <= tol
}

fn to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage {
        width: gray.width,
        height: gray.height,
        data: gray.data.iter().flat_map(|&v| [v, v, v]).collect(),
    }
}

#[test]
fn finds_every_marker_in_a_flat_scene() {
    let mut img = canvas(420, 300);
    paste_marker(&mut img, 0, 10, 20, 20, 0);
    paste_marker(&mut img, 17, 10, 300, 30, 0);
    paste_marker(&mut img, 42, 8, 40, 200, 0);

    let markers = ArucoDetector::default().detect(&img.view());
    let mut ids: Vec<u32> = markers.iter().map(|m| m.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 17, 42]);

    let m0 = markers.iter().find(|m| m.id == 0).expect("marker 0");
    assert!(near(m0.corners[0], 19.5, 19.5, 1.0), "{:?}", m0.corners);
    assert!(near(m0.corners[2], 79.5, 79.5, 1.0), "{:?}", m0.corners);
    assert_eq!(m0.hamming, 0);
    assert_eq!(m0.rotation, 0);
}

#[test]
fn rotated_marker_reports_its_own_top_left() {
    let mut img = canvas(200, 200);
    paste_marker(&mut img, 9, 10, 70, 70, 1);

    let markers = ArucoDetector::default().detect(&img.view());
    assert_eq!(markers.len(), 1);
    let m = markers[0];
    assert_eq!(m.id, 9);
    assert_eq!(m.rotation, 1);
    // A clockwise quarter turn moves the symbol's top-left to the image top-right.
    assert!(near(m.corners[0], 129.5, 69.5, 1.0), "{:?}", m.corners);
    assert!(near(m.corners[1], 129.5, 129.5, 1.0), "{:?}", m.corners);
}

#[test]
fn repeated_ids_are_all_reported() {
    let mut img = canvas(300, 120);
    paste_marker(&mut img, 5, 8, 20, 30, 0);
    paste_marker(&mut img, 5, 8, 200, 30, 2);

    let markers = ArucoDetector::default().detect(&img.view());
    assert_eq!(markers.len(), 2);
    assert!(markers.iter().all(|m| m.id == 5));
}

#[test]
fn survives_a_perspective_view() {
    let mut flat = canvas(300, 300);
    paste_marker(&mut flat, 23, 12, 114, 114, 0);
    let flat_rgb = to_rgb(&flat);

    let dst = [
        Point2::new(0.0, 0.0),
        Point2::new(299.0, 0.0),
        Point2::new(299.0, 299.0),
        Point2::new(0.0, 299.0),
    ];
    let src = [
        Point2::new(20.0, 10.0),
        Point2::new(280.0, 30.0),
        Point2::new(295.0, 290.0),
        Point2::new(5.0, 270.0),
    ];
    let h_src_from_dst = homography_from_4pt(&dst, &src).expect("homography");
    let warped = warp_perspective_rgb(&flat_rgb.view(), &h_src_from_dst, 300, 300);

    let markers = ArucoDetector::default().detect_rgb(&warped.view());
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].id, 23);

    let h_dst_from_src = h_src_from_dst.inverse().expect("invertible");
    let expected = h_dst_from_src.apply(Point2::new(113.5, 113.5));
    assert!(
        near(markers[0].corners[0], expected.x as f32, expected.y as f32, 2.5),
        "{:?} vs {expected:?}",
        markers[0].corners
    );
}

#[test]
fn blank_and_empty_images_have_no_markers() {
    let det = ArucoDetector::default();
    assert!(det.detect(&canvas(64, 64).view()).is_empty());
    assert!(det.detect(&GrayImage::filled(0, 0, 0).view()).is_empty());
}

#[test]
fn default_params_read_an_unevenly_lit_scene() {
    let mut img = canvas(320, 160);
    paste_marker(&mut img, 30, 10, 30, 40, 0);
    paste_marker(&mut img, 31, 10, 220, 40, 0);
    // Darken the right half so one global level no longer fits both sides.
    for y in 0..img.height {
        for x in 160..img.width {
            let v = &mut img.data[y * img.width + x];
            *v = (*v as f32 * 0.45) as u8;
        }
    }

    let mut ids: Vec<u32> = ArucoDetector::default()
        .detect(&img.view())
        .iter()
        .map(|m| m.id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![30, 31]);

    let local_only = ArucoDetector::new(ArucoDetectorParams {
        threshold: ThresholdMode::Adaptive {
            block_radius: 25,
            offset: 10,
        },
        ..ArucoDetectorParams::default()
    });
    assert_eq!(local_only.detect(&img.view()).len(), 2);
}

/// A 120 px marker (id 7) turned clockwise by `degrees` about the centre of a 240 px frame.
fn turned_marker(degrees: f64) -> (RgbImage, [Point2<f64>; 4]) {
    let mut flat = canvas(400, 400);
    paste_marker(&mut flat, 7, 20, 140, 140, 0);
    let (c_src, c_dst) = (199.5, 119.5);

    let (s, c) = degrees.to_radians().sin_cos();
    // Output pixel back into the flat scene: undo the turn about the centre.
    let h_src_from_dst = Homography::new(Matrix3::new(
        c,
        s,
        c_src - c * c_dst - s * c_dst,
        -s,
        c,
        c_src + s * c_dst - c * c_dst,
        0.0,
        0.0,
        1.0,
    ));
    let warped = warp_perspective_rgb(&to_rgb(&flat).view(), &h_src_from_dst, 240, 240);

    let truth = [(-60.0, -60.0), (60.0, -60.0), (60.0, 60.0), (-60.0, 60.0)]
        .map(|(x, y)| Point2::new(c_dst + c * x - s * y, c_dst + s * x + c * y));
    (warped, truth)
}

#[test]
fn slightly_turned_marker_keeps_its_true_outline() {
    let det = ArucoDetector::default();
    for degrees in [0.5, 1.0, 2.0, 3.0, 5.0, 12.0, 30.0] {
        let (img, truth) = turned_marker(degrees);
        let markers = det.detect_rgb(&img.view());
        assert_eq!(markers.len(), 1, "{degrees} deg: {markers:?}");
        assert_eq!(markers[0].id, 7, "{degrees} deg");

        let corners = markers[0].corners_f64();
        let side = quad_mean_side(&corners);
        assert!((side - 120.0).abs() < 1.2, "{degrees} deg: side {side}");
        for t in truth {
            let closest = corners
                .iter()
                .map(|p| (*p - t).norm())
                .fold(f64::INFINITY, f64::min);
            assert!(closest < 1.5, "{degrees} deg: {t:?} vs {corners:?}");
        }
    }
}

#[test]
fn non_positive_polygon_tolerance_finds_nothing() {
    let mut img = canvas(200, 200);
    paste_marker(&mut img, 3, 10, 70, 70, 0);
    for eps in [0.0, -1.0, f64::NAN] {
        let det = ArucoDetector::new(ArucoDetectorParams {
            polygon_epsilon_rel: eps,
            ..ArucoDetectorParams::default()
        });
        assert!(det.detect(&img.view()).is_empty(), "eps {eps}");
    }
}
