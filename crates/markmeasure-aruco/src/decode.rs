//! Bit sampling inside a candidate quad and dictionary lookup.

use crate::threshold::otsu_threshold_from_samples;
use crate::Matcher;
use markmeasure_core::{homography_from_4pt, sample_bilinear, GrayImageView, Homography};
use nalgebra::Point2;

/// Sampling parameters for one marker read.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DecodeConfig {
    pub border_bits: usize,
    /// Fraction of each cell side ignored on every edge.
    pub inset_frac: f32,
    pub min_border_score: f32,
}

/// Raw read of one quad before dictionary matching.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Observation {
    /// Inner bits, row-major, black = 1.
    pub code: u64,
    pub border_score: f32,
}

/// A quad that decoded to a dictionary symbol.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Decoded {
    pub id: u32,
    pub rotation: u8,
    pub hamming: u8,
    pub border_score: f32,
    /// Image corners reordered so index 0 is the symbol's top-left.
    pub corners: [Point2<f64>; 4],
}

/// Reads quads whose corners are clockwise on screen, starting anywhere.
pub(crate) struct QuadDecoder<'a> {
    cfg: DecodeConfig,
    matcher: &'a Matcher,
    bits: usize,
    cells: usize,
    canonical: [Point2<f64>; 4],
    cell_offsets: Vec<Point2<f64>>,
    threshold_points: Vec<Point2<f64>>,
    scratch_cells: Vec<u8>,
    scratch_thr: Vec<u8>,
}

impl<'a> QuadDecoder<'a> {
    pub fn new(cfg: DecodeConfig, matcher: &'a Matcher) -> Option<Self> {
        let bits = matcher.dictionary().marker_size;
        if bits == 0 || bits * bits > 64 {
            return None;
        }
        let cells = bits + 2 * cfg.border_bits;
        let s = cells as f64;
        let canonical = [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ];

        let r = (0.5 - cfg.inset_frac.clamp(0.0, 0.45) as f64).max(0.05);
        let mut cell_offsets = Vec::with_capacity(9);
        for dy in [-r, 0.0, r] {
            for dx in [-r, 0.0, r] {
                cell_offsets.push(Point2::new(dx, dy));
            }
        }

        Some(Self {
            cfg,
            matcher,
            bits,
            cells,
            canonical,
            cell_offsets,
            threshold_points: build_threshold_points(cells),
            scratch_cells: Vec::with_capacity(cells * cells),
            scratch_thr: Vec::new(),
        })
    }

    pub fn decode(&mut self, img: &GrayImageView<'_>, quad: &[Point2<f64>; 4]) -> Option<Decoded> {
        let h = homography_from_4pt(&self.canonical, quad)?;
        let obs = self.observe(img, &h)?;
        let m = self.matcher.match_code(obs.code)?;

        let mut corners = *quad;
        corners.rotate_left(m.rotation as usize);
        Some(Decoded {
            id: m.id,
            rotation: m.rotation,
            hamming: m.hamming,
            border_score: obs.border_score,
            corners,
        })
    }

    fn observe(&mut self, img: &GrayImageView<'_>, h: &Homography) -> Option<Observation> {
        self.scratch_cells.clear();
        for cy in 0..self.cells {
            for cx in 0..self.cells {
                let centre = Point2::new(cx as f64 + 0.5, cy as f64 + 0.5);
                let mut sum = 0.0f32;
                for off in &self.cell_offsets {
                    let q = h.apply(centre + off.coords);
                    sum += sample_bilinear(img, q.x as f32, q.y as f32);
                }
                let mean = sum / self.cell_offsets.len() as f32;
                self.scratch_cells.push(mean.round().clamp(0.0, 255.0) as u8);
            }
        }

        self.scratch_thr.clear();
        for p in &self.threshold_points {
            let q = h.apply(*p);
            self.scratch_thr
                .push(sample_bilinear(img, q.x as f32, q.y as f32).round().clamp(0.0, 255.0) as u8);
        }

        classify_cells(
            &self.scratch_cells,
            &self.scratch_thr,
            self.cells,
            self.bits,
            self.cfg.border_bits,
            self.cfg.min_border_score,
        )
    }
}

/// Turn per-cell means into a code; `None` when the black border is too weak.
pub(crate) fn classify_cells(
    samples: &[u8],
    thr_samples: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    min_border_score: f32,
) -> Option<Observation> {
    if samples.len() != cells * cells {
        return None;
    }
    let thr = if thr_samples.is_empty() {
        otsu_threshold_from_samples(samples)
    } else {
        otsu_threshold_from_samples(thr_samples)
    };

    let mut border_ok = 0u32;
    let mut border_total = 0u32;
    let mut code = 0u64;

    for cy in 0..cells {
        for cx in 0..cells {
            let is_black = samples[cy * cells + cx] < thr;
            let is_border = cx < border || cy < border || cx + border >= cells || cy + border >= cells;
            if is_border {
                border_total += 1;
                border_ok += is_black as u32;
            } else if is_black {
                code |= 1u64 << ((cy - border) * bits + (cx - border));
            }
        }
    }

    let border_score = if border_total == 0 {
        1.0
    } else {
        border_ok as f32 / border_total as f32
    };
    (border_score >= min_border_score).then_some(Observation { code, border_score })
}

fn build_threshold_points(cells: usize) -> Vec<Point2<f64>> {
    const THRESH_SUBDIV: usize = 3;
    let grid = cells * THRESH_SUBDIV;
    let step = cells as f64 / grid as f64;
    let mut points = Vec::with_capacity(grid * grid);
    for ty in 0..grid {
        for tx in 0..grid {
            points.push(Point2::new(
                (tx as f64 + 0.5) * step,
                (ty as f64 + 0.5) * step,
            ));
        }
    }
    points
}
