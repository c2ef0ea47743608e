//! Moving between wind datasets.
//!
//! A [`GridSource`] fetches datasets by key, [`interpolate_data`] plans the
//! in-between frames, and the [`CoordinatorHandle`] ties them together so
//! only the most recently requested dataset is ever shown.

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod interpolate;
pub mod source;

pub use actor::{DataActor, DataRequest, DataResponse};
pub use config::{SourceConfig, TransitionConfig};
pub use coordinator::{CoordinatorHandle, CoordinatorStatus, TransitionTarget};
pub use interpolate::{interpolate_data, step_count, InterpolationPlan};
pub use source::{FileSource, GridSource, HttpSource};
