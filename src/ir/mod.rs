//! Keypoint annotation model for kplabel.
//!
//! This module defines the in-memory representation of keypoint annotations
//! and the category schema they are interpreted against, plus the codecs
//! that move them to and from disk.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: Marker types keep pixel and normalized coordinates
//!    apart at compile time; pixel values only appear at the file boundary.
//!
//! 2. **Canonical Format**: Keypoints and boxes live in normalized space.
//!
//! 3. **Explicit Schema**: The [`CategoryRegistry`] is a plain value handed
//!    to the decoder, which extends it when label files reveal more structure
//!    than it knows about.
//!
//! # Example
//!
//! ```
//! use kplabel::ir::{CategoryRegistry, ImageSize, VisibilityPolicy};
//! use kplabel::ir::io_yolo_pose::{decode_labels, encode_labels};
//!
//! let mut registry = CategoryRegistry::new();
//! let size = ImageSize::new(200, 100).unwrap();
//! let records = decode_labels(
//!     "0 0.5 0.5 0.2 0.3 100 50 3",
//!     size,
//!     &mut registry,
//!     VisibilityPolicy::default(),
//! )
//! .unwrap();
//! assert_eq!(
//!     encode_labels(&records, &registry, size),
//!     "0 0.500000 0.500000 0.000000 0.000000 0.500000 0.500000\n"
//! );
//! ```

mod bbox;
mod coord;
mod ids;
pub mod io_schema_yaml;
pub mod io_yolo_pose;
mod model;
mod registry;
mod space;

// Re-export core types for convenient access
pub use bbox::BBoxXYXY;
pub use coord::{looks_like_pixels, Coord};
pub use ids::ClassId;
pub use io_yolo_pose::VisibilityPolicy;
pub use model::{Annotation, ImageSize, Keypoint};
pub use registry::{parse_keypoint_names, Category, CategoryRegistry};
pub use space::{Normalized, Pixel};
