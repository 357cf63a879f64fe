use serde::{Deserialize, Serialize};

/// Slack for a bottom that lands exactly on an edge's top after float rounding.
const ALIGN_EPS: f32 = 1e-6;

/// Axis-aligned box in normalized image coordinates, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Center-format to corner-format, clamped so the box never leaves the image.
    /// Width and height are re-clamped after the corner shift.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        let x = (cx - w / 2.0).clamp(0.0, 1.0);
        let y = (cy - h / 2.0).clamp(0.0, 1.0);
        let width = w.clamp(0.0, 1.0 - x);
        let height = h.clamp(0.0, 1.0 - y);
        Self { x, y, width, height }
    }

    pub fn center_x(&self) -> f32 { self.x + self.width / 2.0 }
    pub fn center_y(&self) -> f32 { self.y + self.height / 2.0 }

    pub fn left(&self) -> f32 { self.x }
    pub fn right(&self) -> f32 { self.x + self.width }
    pub fn top(&self) -> f32 { self.y }
    pub fn bottom(&self) -> f32 { self.y + self.height }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let iw = (self.right().min(other.right()) - self.left().max(other.left())).max(0.0);
        let ih = (self.bottom().min(other.bottom()) - self.top().max(other.top())).max(0.0);
        iw * ih
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Euclidean distance between box centers.
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        let dx = self.center_x() - other.center_x();
        let dy = self.center_y() - other.center_y();
        (dx * dx + dy * dy).sqrt()
    }

    /// Manhattan distance between box centers.
    pub fn center_l1_distance(&self, other: &BoundingBox) -> f32 {
        (self.center_x() - other.center_x()).abs() + (self.center_y() - other.center_y()).abs()
    }

    /// Width of the overlap between the two boxes' horizontal extents.
    pub fn horizontal_overlap(&self, other: &BoundingBox) -> f32 {
        (self.right().min(other.right()) - self.left().max(other.left())).max(0.0)
    }

    pub fn is_near(&self, other: &BoundingBox, threshold: f32) -> bool {
        self.center_distance(other) < threshold
    }

    /// True when this box rests on top of `edge`: its bottom sits at or up to `band`
    /// above the edge's top and it overlaps the edge horizontally by more than
    /// `min_overlap_frac` of its own width.
    pub fn is_above_edge(&self, edge: &BoundingBox, band: f32, min_overlap_frac: f32) -> bool {
        // y grows downward, so the gap is positive when the bottom is above the edge
        let gap = edge.top() - self.bottom();
        let aligned = gap >= -ALIGN_EPS && gap <= band;
        aligned && self.horizontal_overlap(edge) > self.width * min_overlap_frac
    }

    pub fn is_within_image(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= 1.0 + 1e-6 && self.bottom() <= 1.0 + 1e-6
    }
}
