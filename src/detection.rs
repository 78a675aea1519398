//! Bounding boxes and per-frame detections produced by the external tracker.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Axis-aligned bounding box in pixel space, stored as min and max corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Create a bounding box from its corners.
    ///
    /// Fails if any edge is non-finite or the box is inverted. Zero-area
    /// boxes are allowed here; they are rejected later by signature
    /// extraction.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        let bbox = Self { x1, y1, x2, y2 };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Create a bounding box from top-left corner and size.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        Self::new(x, y, x + width, y + height)
    }

    /// Check that all edges are finite and the box is not inverted.
    pub fn validate(&self) -> Result<()> {
        if ![self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidBoundingBox(format!(
                "non-finite edge in ({}, {}, {}, {})",
                self.x1, self.y1, self.x2, self.y2
            )));
        }
        if self.x2 < self.x1 || self.y2 < self.y1 {
            return Err(Error::InvalidBoundingBox(format!(
                "inverted box ({}, {}, {}, {})",
                self.x1, self.y1, self.x2, self.y2
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point `(cx, cy)`.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Intersection over union with another box (0 when the union is empty).
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter_area = inter_w * inter_h;

        let union_area = self.area() + other.area() - inter_area;
        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Translate the box by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }
}

/// One external detector output for one frame.
///
/// The identifier is assigned by the external tracker. It is unique within a
/// frame when present, but may change between frames or be missing entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detected box in pixel coordinates.
    pub bbox: BoundingBox,

    /// Detector confidence in [0, 1].
    pub confidence: f64,

    /// Ephemeral tracker identifier.
    #[serde(default)]
    pub id: Option<i64>,
}

impl Detection {
    /// Create a new detection. Validation happens at the engine boundary.
    pub fn new(bbox: BoundingBox, confidence: f64, id: Option<i64>) -> Self {
        Self { bbox, confidence, id }
    }

    /// Check the box and confidence of this detection.
    pub fn validate(&self) -> Result<()> {
        self.bbox.validate()?;
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidConfidence(self.confidence));
        }
        Ok(())
    }
}
