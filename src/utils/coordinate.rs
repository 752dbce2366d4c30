use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle in pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// new returns a box when the corners describe a non-empty rectangle.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(BoundingBox { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// clamp restricts the box to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box is left inside the frame.
    pub fn clamp(&self, width: i32, height: i32) -> Option<Self> {
        BoundingBox::new(
            self.x1.clamp(0, width),
            self.y1.clamp(0, height),
            self.x2.clamp(0, width),
            self.y2.clamp(0, height),
        )
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Horizontal midpoint, kept fractional so that odd widths do not bias left/right.
    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) as f32 / 2.0
    }
}

/// Feature classes the detection model distinguishes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DetectionLabel {
    Face,
    Eyes,
    Mouth,
}

/// One box reported by the detection model, already filtered by confidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub label: DetectionLabel,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(bbox: BoundingBox, label: DetectionLabel, confidence: f32) -> Self {
        RawDetection { bbox, label, confidence }
    }
}

/// Per-frame interpretation of the detections. A missing field means the
/// feature was not found and is skipped.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSet {
    pub face: Option<BoundingBox>,
    pub left_eye: Option<BoundingBox>,
    pub right_eye: Option<BoundingBox>,
    pub mouth: Option<BoundingBox>,
}

impl FeatureSet {
    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    /// Boxes to be erased before compositing. The face box is never erased.
    pub fn removal_boxes(&self) -> Vec<BoundingBox> {
        [self.left_eye, self.right_eye, self.mouth]
            .into_iter()
            .flatten()
            .collect()
    }
}
