//! Wind vectors as stored in a built field.

use serde::{Deserialize, Serialize};

/// A wind sample `[u, v, magnitude]`.
///
/// Points without data are represented by `None` wherever a `WindVector` is
/// looked up; a present vector always has a finite magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindVector {
    pub u: f32,
    pub v: f32,
    pub magnitude: f32,
}

impl WindVector {
    pub fn new(u: f32, v: f32, magnitude: f32) -> Self {
        Self { u, v, magnitude }
    }

    /// Build a vector from its components, computing the magnitude.
    pub fn from_components(u: f32, v: f32) -> Self {
        Self {
            u,
            v,
            magnitude: (u * u + v * v).sqrt(),
        }
    }
}
