//! Common types shared across the wind flow crates.
//!
//! Grid datasets, viewport geometry, reference-time handling and the error
//! taxonomy used by the field builder, the animator and the transition
//! coordinator.

pub mod error;
pub mod extent;
pub mod grid;
pub mod time;
pub mod vector;

pub use error::{FlowError, FlowResult};
pub use extent::{CanvasBound, Extent, Viewport};
pub use grid::{
    Axis, AxisValue, CoverageGrid, Domain, GridData, LegacyGrid, LegacyHeader, NdArray,
    RegularAxis, VectorGrid, VectorKeys,
};
pub use time::parse_reference_time;
pub use vector::WindVector;
