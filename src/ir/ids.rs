//! Newtype identifier for category positions in the schema registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a category in a [`CategoryRegistry`](super::CategoryRegistry).
///
/// This is also the integer written as the first column of every label line.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub usize);

impl ClassId {
    /// Creates a new ClassId.
    #[inline]
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the underlying index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for ClassId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
