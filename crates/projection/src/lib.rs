//! Geographic <-> screen math for the flow field.
//!
//! Implements spherical Mercator from scratch without external dependencies,
//! together with the projection distortion correction and the bilinear
//! vector interpolation used when building a field.

pub mod interpolation;
pub mod mercator;

pub use interpolation::{bilinear_interpolate_vector, floor_mod, interpolate};
pub use mercator::{deg_to_rad, distort, distortion, invert, merc_y, project, rad_to_deg};
