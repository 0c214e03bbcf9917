//! Annotation primitives in image pixel coordinates.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Boxes need both sides, lines their length, strictly above this.
pub const MIN_SHAPE_PX: f64 = 5.0;

/// Axis-aligned rectangle, top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two opposite corners given in any order.
    pub fn from_corners(a: Point2<f64>, b: Point2<f64>) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn is_large_enough(&self) -> bool {
        self.width > MIN_SHAPE_PX && self.height > MIN_SHAPE_PX
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub p1: Point2<f64>,
    pub p2: Point2<f64>,
}

impl LineSegment {
    pub fn new(p1: Point2<f64>, p2: Point2<f64>) -> Self {
        Self { p1, p2 }
    }

    pub fn length_px(&self) -> f64 {
        (self.p2 - self.p1).norm()
    }

    /// Image row of the midpoint, the input of the depth correction.
    pub fn mid_y(&self) -> f64 {
        0.5 * (self.p1.y + self.p2.y)
    }

    pub fn is_long_enough(&self) -> bool {
        self.length_px() > MIN_SHAPE_PX
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxShape {
    pub label: String,
    pub rect: Rect,
}

/// A measurement line with its millimetre readings.
///
/// `base_mm` and `corrected_mm` are absent while the session has no scale.
#[derive(Clone, Debug, PartialEq)]
pub struct LineShape {
    pub label: String,
    pub segment: LineSegment,
    pub base_mm: Option<f64>,
    pub corrected_mm: Option<f64>,
    pub depth_mm: Option<f64>,
    /// Drawn while a scale was set, so usable as a depth-fit reference.
    pub reference: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Box(BoxShape),
    Line(LineShape),
}

impl Shape {
    pub fn label(&self) -> &str {
        match self {
            Shape::Box(b) => &b.label,
            Shape::Line(l) => &l.label,
        }
    }

    pub fn as_line(&self) -> Option<&LineShape> {
        match self {
            Shape::Line(l) => Some(l),
            Shape::Box(_) => None,
        }
    }
}
