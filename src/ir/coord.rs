//! Typed coordinate values using PhantomData for compile-time safety.

use std::marker::PhantomData;

use super::model::ImageSize;
use super::space::{Normalized, Pixel};

/// A 2D coordinate with a type-level marker for the coordinate space.
///
/// The `TSpace` parameter should be either [`Pixel`] or [`Normalized`],
/// ensuring that coordinates from different spaces cannot be accidentally
/// mixed.
#[derive(Clone, Copy, PartialEq)]
pub struct Coord<TSpace> {
    pub x: f64,
    pub y: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> Coord<TSpace> {
    /// Creates a new coordinate with the given x and y values.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }
}

impl Coord<Pixel> {
    /// Divides by the image dimensions.
    pub fn to_normalized(&self, size: ImageSize) -> Coord<Normalized> {
        Coord::new(self.x / size.width_f64(), self.y / size.height_f64())
    }
}

impl Coord<Normalized> {
    /// Multiplies by the image dimensions.
    pub fn to_pixel(&self, size: ImageSize) -> Coord<Pixel> {
        Coord::new(self.x * size.width_f64(), self.y * size.height_f64())
    }

    /// Interprets a raw pair read from a label file.
    ///
    /// A pair with either component above 1.0 is taken to be in pixel space
    /// and divided by the image size; anything else is already normalized.
    /// The rule is applied per pair, so a file may mix both scales.
    pub fn from_raw(x: f64, y: f64, size: ImageSize) -> Self {
        if looks_like_pixels(x, y) {
            Coord::<Pixel>::new(x, y).to_normalized(size)
        } else {
            Coord::new(x, y)
        }
    }
}

/// Returns true when a raw pair should be treated as pixel coordinates.
#[inline]
pub fn looks_like_pixels(x: f64, y: f64) -> bool {
    x > 1.0 || y > 1.0
}

impl<TSpace> std::fmt::Debug for Coord<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coord")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl<TSpace> Default for Coord<TSpace> {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
