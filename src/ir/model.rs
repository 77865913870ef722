//! Annotation records and image context.
//!
//! Keypoints are held in normalized image space. Pixel values only exist at
//! the file boundary and are converted by the codec.

use serde::{Deserialize, Serialize};

use super::bbox::BBoxXYXY;
use super::coord::Coord;
use super::ids::ClassId;
use super::space::Normalized;
use crate::error::KplabelError;

/// Pixel dimensions of the image a label file belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// Creates an image size, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, KplabelError> {
        if width == 0 || height == 0 {
            return Err(KplabelError::InvalidImageSize { width, height });
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn width_f64(&self) -> f64 {
        self.width as f64
    }

    #[inline]
    pub fn height_f64(&self) -> f64 {
        self.height as f64
    }
}

/// A single keypoint slot value.
///
/// `v == 0` marks an absent point and is always stored as `(0.0, 0.0, 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub v: i32,
}

impl Keypoint {
    /// Visibility flag assigned to points placed by hand or recovered from
    /// files that do not carry one.
    pub const VISIBLE: i32 = 2;

    /// Creates a keypoint; non-positive flags collapse to [`Keypoint::absent`].
    pub fn new(x: f64, y: f64, v: i32) -> Self {
        if v > 0 {
            Self { x, y, v }
        } else {
            Self::absent()
        }
    }

    /// A visible keypoint with the default flag.
    pub fn visible(x: f64, y: f64) -> Self {
        Self::new(x, y, Self::VISIBLE)
    }

    pub const fn absent() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            v: 0,
        }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.v > 0
    }

    #[inline]
    pub fn coord(&self) -> Coord<Normalized> {
        Coord::new(self.x, self.y)
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self::absent()
    }
}

/// One annotated object: a category and its keypoint slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub class_id: ClassId,

    /// Slot values in category order. May be longer than the category's
    /// current slot list after a schema edit.
    pub keypoints: Vec<Keypoint>,

    /// Box as read from the file. Never used when writing; the encoder
    /// derives a fresh box from the visible keypoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBoxXYXY<Normalized>>,
}

impl Annotation {
    pub fn new(class_id: ClassId, keypoints: Vec<Keypoint>) -> Self {
        Self {
            class_id,
            keypoints,
            bbox: None,
        }
    }

    /// A record with `slots` absent keypoints, as created by a new-annotation
    /// action.
    pub fn with_empty_slots(class_id: ClassId, slots: usize) -> Self {
        Self::new(class_id, vec![Keypoint::absent(); slots])
    }

    pub fn visible_keypoints(&self) -> impl Iterator<Item = &Keypoint> {
        self.keypoints.iter().filter(|kp| kp.is_visible())
    }

    /// Right-pads with absent keypoints until there are at least `len` slots.
    pub fn pad_to(&mut self, len: usize) {
        if self.keypoints.len() < len {
            self.keypoints.resize(len, Keypoint::absent());
        }
    }

    /// Pads or truncates to exactly `len` slots.
    pub fn resize_to(&mut self, len: usize) {
        self.keypoints.resize(len, Keypoint::absent());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_rejects_zero() {
        assert!(ImageSize::new(0, 10).is_err());
        assert!(ImageSize::new(10, 0).is_err());
        assert!(ImageSize::new(1, 1).is_ok());
    }

    #[test]
    fn absent_keypoints_are_zeroed() {
        assert_eq!(Keypoint::new(0.4, 0.6, 0), Keypoint::absent());
        assert_eq!(Keypoint::new(0.4, 0.6, -1), Keypoint::absent());
        assert_eq!(Keypoint::new(0.4, 0.6, 1).v, 1);
    }

    #[test]
    fn pad_to_never_truncates() {
        let mut ann = Annotation::new(ClassId(0), vec![Keypoint::visible(0.1, 0.1); 3]);
        ann.pad_to(2);
        assert_eq!(ann.keypoints.len(), 3);
        ann.pad_to(5);
        assert_eq!(ann.keypoints.len(), 5);
        assert_eq!(ann.keypoints[4], Keypoint::absent());
    }

    #[test]
    fn resize_to_truncates_and_pads() {
        let mut ann = Annotation::with_empty_slots(ClassId(1), 4);
        ann.resize_to(2);
        assert_eq!(ann.keypoints.len(), 2);
        ann.resize_to(3);
        assert_eq!(ann.keypoints.len(), 3);
    }
}
