//! The queryable field handed to the animator.

use flow_common::{CanvasBound, WindVector};
use rand::Rng;
use tracing::trace;

use crate::field::Columns;

/// Retries when seeding a particle before settling for a point without data.
pub const MAX_RANDOMIZE_RETRIES: usize = 30;

/// A built flow field: per-pixel `[u, v, magnitude]` over a canvas.
///
/// Owns its columns; dropping the field (or calling [`release`]) frees them.
///
/// [`release`]: VectorField::release
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    columns: Columns,
    bounds: CanvasBound,
}

/// Wrap built columns into a field over `bounds`.
pub fn create_field(columns: Columns, bounds: CanvasBound) -> VectorField {
    VectorField { columns, bounds }
}

impl VectorField {
    /// Wind at pixel `(x, y)`, rounded to the nearest pixel. `None` where
    /// the field has no data.
    pub fn sample(&self, x: f64, y: f64) -> Option<WindVector> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        self.columns.get(x.round() as i32, y.round() as i32)
    }

    /// Pick a random pixel inside the bounds, preferring one with data.
    ///
    /// Gives up after [`MAX_RANDOMIZE_RETRIES`] retries and returns the last
    /// point tried, so an empty field never loops forever.
    pub fn randomize<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let b = &self.bounds;
        if b.width <= 0 || b.height <= 0 {
            return (b.x as f64, b.y as f64);
        }
        let mut point = (b.x as f64, b.y as f64);
        for _ in 0..=MAX_RANDOMIZE_RETRIES {
            let x = rng.gen_range(0..b.width) + b.x;
            let y = rng.gen_range(0..b.height) + b.y;
            point = (x as f64, y as f64);
            if self.columns.get(x, y).is_some() {
                break;
            }
        }
        point
    }

    pub fn bounds(&self) -> &CanvasBound {
        &self.bounds
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// True when no pixel holds a vector.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Drop the field and its backing columns.
    pub fn release(self) {
        trace!(columns = self.columns.column_count(), "Releasing field");
    }
}
