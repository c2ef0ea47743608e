//! Flow field construction and trail rendering.
//!
//! - Field building: sparse wind grid to dense per-pixel vectors
//! - Vector field: sampling and random seeding of particles
//! - Colour scale: magnitude to trail colour
//! - Surface: trail fading, additive strokes and PNG export

pub mod colorscale;
pub mod field;
pub mod png;
pub mod surface;
pub mod vector_field;

pub use colorscale::{Color, ColorScale};
pub use field::{build_field, build_field_columns, interpolate_field, Columns};
pub use surface::{Segment, Surface};
pub use vector_field::{create_field, VectorField};
