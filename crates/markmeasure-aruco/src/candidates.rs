//! Quad candidates from the outer contours of dark blobs.

use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::image::GrayImage;
use imageproc::point::Point;
use markmeasure_core::{is_convex_quad, quad_centroid, quad_side_lengths, quad_signed_area};
use nalgebra::{Point2, Vector2};

/// Shape filters applied to every outer contour.
#[derive(Clone, Copy, Debug)]
pub(crate) struct QuadFilter {
    pub min_side_px: f64,
    pub polygon_epsilon_rel: f64,
    pub min_distance_to_border_px: f64,
}

/// Convex four-corner outlines, clockwise on screen from the corner nearest
/// the image origin.
///
/// `mask` holds 255 for dark ink and 0 for background. Corners lie on the
/// outer pixel edge of the blob.
pub(crate) fn find_quads(mask: &GrayImage, filter: &QuadFilter) -> Vec<[Point2<f64>; 4]> {
    let (w, h) = (mask.width() as f64, mask.height() as f64);
    let mut out = Vec::new();

    for contour in find_contours::<i32>(mask) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let points = &contour.points;
        let perimeter = arc_length(points, true);
        if perimeter < 4.0 * filter.min_side_px {
            continue;
        }
        let epsilon = filter.polygon_epsilon_rel * perimeter;
        if !epsilon.is_finite() || epsilon <= 0.0 {
            continue;
        }

        let Some(idx) = corner_indices(points, epsilon, filter.min_side_px * 0.5) else {
            continue;
        };
        let margin = filter.min_distance_to_border_px;
        if idx.iter().map(|&i| points[i]).any(|p| {
            let (x, y) = (p.x as f64, p.y as f64);
            x < margin || y < margin || x > w - 1.0 - margin || y > h - 1.0 - margin
        }) {
            continue;
        }

        let mut quad = refine_corners(points, &idx);
        if !is_convex_quad(&quad) {
            continue;
        }
        if quad_side_lengths(&quad)
            .iter()
            .any(|&s| s < filter.min_side_px)
        {
            continue;
        }

        if quad_signed_area(&quad) < 0.0 {
            quad.reverse();
        }
        let start = (0..4)
            .min_by(|&a, &b| (quad[a].x + quad[a].y).total_cmp(&(quad[b].x + quad[b].y)))
            .unwrap_or(0);
        quad.rotate_left(start);
        out.push(quad);
    }

    out
}

fn to_f64(p: Point<i32>) -> Point2<f64> {
    Point2::new(p.x as f64, p.y as f64)
}

/// Contour indices of exactly four polygon corners, in contour order.
///
/// A closed contour starts wherever the raster scan first met the blob, which
/// is usually partway along an edge. The simplification is therefore anchored
/// at two genuine extreme points: the point farthest from the centroid and the
/// point farthest from that one. Each of the two chains between them is
/// simplified on its own.
fn corner_indices(points: &[Point<i32>], epsilon: f64, merge_px: f64) -> Option<[usize; 4]> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let centre = points
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, &p| acc + to_f64(p).coords)
        / n as f64;
    let farthest_from = |c: Point2<f64>| {
        (0..n)
            .max_by(|&i, &j| {
                let di = (to_f64(points[i]) - c).norm_squared();
                let dj = (to_f64(points[j]) - c).norm_squared();
                di.total_cmp(&dj).then(j.cmp(&i))
            })
            .unwrap_or(0)
    };
    let a = farthest_from(Point2::from(centre));
    let b = farthest_from(to_f64(points[a]));
    if a == b {
        return None;
    }

    // Walk forward from `a`: chain one ends at `b`, chain two returns to `a`.
    let rotated: Vec<Point<i32>> = points[a..].iter().chain(&points[..a]).copied().collect();
    let split = (b + n - a) % n;
    let mut closing = rotated[split..].to_vec();
    closing.push(rotated[0]);

    let first = chain_vertices(&rotated[..=split], 0, epsilon);
    let second = chain_vertices(&closing, split, epsilon);

    let mut corners: Vec<usize> = Vec::with_capacity(first.len() + second.len());
    let inner = second.get(1..second.len().saturating_sub(1)).unwrap_or(&[]);
    for &i in first.iter().chain(inner).filter(|&&i| i < n) {
        let p = to_f64(rotated[i]);
        match corners.last() {
            Some(&last) if (p - to_f64(rotated[last])).norm() < merge_px => {}
            _ => corners.push(i),
        }
    }
    while corners.len() > 1
        && (to_f64(rotated[corners[0]]) - to_f64(rotated[corners[corners.len() - 1]])).norm()
            < merge_px
    {
        corners.pop();
    }

    let corners: [usize; 4] = corners.try_into().ok()?;
    Some(corners.map(|i| (i + a) % n))
}

/// Douglas-Peucker vertices of an open chain, as indices offset by `offset`.
fn chain_vertices(chain: &[Point<i32>], offset: usize, epsilon: f64) -> Vec<usize> {
    if chain.len() < 2 {
        return Vec::new();
    }
    let poly = approximate_polygon_dp(chain, epsilon, false);
    let mut out = Vec::with_capacity(poly.len());
    let mut from = 0;
    for v in poly {
        if let Some(k) = chain[from..].iter().position(|p| *p == v) {
            from += k;
            out.push(offset + from);
        }
    }
    out
}

/// A side's supporting line `normal · p = offset`, with the normal pointing
/// away from the blob.
#[derive(Clone, Copy, Debug)]
struct EdgeLine {
    normal: Vector2<f64>,
    offset: f64,
}

/// Fit a line to the middle of every side and intersect neighbours.
///
/// Contour points are boundary pixel centres, half a pixel inside the ink
/// edge, so each fitted line is pushed outward by 0.5 px. A corner falls back
/// to its contour pixel (shifted the same way) when its two lines are nearly
/// parallel or the intersection lands far from that pixel.
fn refine_corners(points: &[Point<i32>], idx: &[usize; 4]) -> [Point2<f64>; 4] {
    let n = points.len();
    let raw = idx.map(|i| to_f64(points[i]));
    let centre = quad_centroid(&raw);

    let lines: [Option<EdgeLine>; 4] = std::array::from_fn(|k| {
        let (from, to) = (idx[k], idx[(k + 1) % 4]);
        let len = (to + n - from) % n;
        let trim = len / 6;
        let span = if len > 2 * trim + 2 { (trim, len - trim) } else { (0, len) };
        let side: Vec<Point2<f64>> = (span.0..=span.1)
            .map(|s| to_f64(points[(from + s) % n]))
            .collect();
        fit_edge_line(&side, centre)
    });

    std::array::from_fn(|k| {
        let fallback = half_pixel_out(raw[k], centre);
        let (Some(prev), Some(next)) = (lines[(k + 3) % 4], lines[k]) else {
            return fallback;
        };
        let det = prev.normal.x * next.normal.y - prev.normal.y * next.normal.x;
        if det.abs() < 1e-3 {
            return fallback;
        }
        let p = Point2::new(
            (prev.offset * next.normal.y - next.offset * prev.normal.y) / det,
            (prev.normal.x * next.offset - next.normal.x * prev.offset) / det,
        );
        let side = (raw[(k + 1) % 4] - raw[k]).norm().min((raw[(k + 3) % 4] - raw[k]).norm());
        if (p - fallback).norm() > (0.1 * side).max(2.0) {
            return fallback;
        }
        p
    })
}

/// Total least squares line through `pts`, moved half a pixel away from `centre`.
fn fit_edge_line(pts: &[Point2<f64>], centre: Point2<f64>) -> Option<EdgeLine> {
    if pts.len() < 2 {
        return None;
    }
    let count = pts.len() as f64;
    let mean = pts.iter().fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + p.coords) / count;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in pts {
        let d = p.coords - mean;
        sxx += d.x * d.x;
        syy += d.y * d.y;
        sxy += d.x * d.y;
    }
    if sxx + syy < 1e-9 {
        return None;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let mut normal = Vector2::new(-theta.sin(), theta.cos());
    if normal.dot(&(mean - centre.coords)) < 0.0 {
        normal = -normal;
    }
    Some(EdgeLine {
        normal,
        offset: normal.dot(&mean) + 0.5,
    })
}

fn half_pixel_out(p: Point2<f64>, centre: Point2<f64>) -> Point2<f64> {
    let half = |d: f64| if d.abs() < 1e-9 { 0.0 } else { 0.5 * d.signum() };
    Point2::new(p.x + half(p.x - centre.x), p.y + half(p.y - centre.y))
}
