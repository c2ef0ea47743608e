//! Time interpolation between two datasets.
//!
//! The number of steps follows the reference-time gap: one step per
//! `granularity_hours`, clamped to `[min_steps, max_steps]`. Identical
//! reference times cut straight to the new dataset.

use std::sync::Arc;

use flow_common::time::format_dtg;
use flow_common::{FlowError, FlowResult, GridData, RegularAxis, VectorKeys};

use crate::config::TransitionConfig;

/// Datasets to show in order, and how long each one stays up.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationPlan {
    /// `from`, the intermediates, then `to`. Just `[to]` for a direct cut.
    pub data: Vec<Arc<GridData>>,
    /// Per-step duration in units of the playback scalar. `None` for a
    /// direct cut.
    pub speed: Option<f64>,
    /// Reference time of the target dataset as a compact dtg.
    pub to_dtg: Option<String>,
}

impl InterpolationPlan {
    fn direct(to: Arc<GridData>) -> Self {
        let to_dtg = to.reference_time().map(|t| format_dtg(&t));
        Self {
            data: vec![to],
            speed: None,
            to_dtg,
        }
    }

    /// Datasets shown before the target.
    pub fn intermediate_count(&self) -> usize {
        self.data.len().saturating_sub(1)
    }

    pub fn is_direct(&self) -> bool {
        self.speed.is_none()
    }

    /// The dataset the plan ends on.
    pub fn target(&self) -> Option<&Arc<GridData>> {
        self.data.last()
    }
}

/// Coordinates and memory order of a dataset's U/V grid.
#[derive(Debug, Clone, Copy)]
struct GridLayout {
    x: RegularAxis,
    y: RegularAxis,
    /// Whether x varies slower than y in the flat value arrays.
    x_major: bool,
}

impl GridLayout {
    fn of(data: &GridData, keys: &VectorKeys) -> FlowResult<Self> {
        let coverage = data.to_coverage(keys)?;
        let x = coverage.domain.x_axis()?;
        let y = coverage.domain.y_axis()?;

        let mut order = None;
        for key in [&keys.u, &keys.v] {
            let names = coverage.range(key)?.axis_names.as_ref().ok_or_else(|| {
                FlowError::validation(format!("range '{}' has no axisNames", key))
            })?;
            let position = |axis: &str| names.iter().position(|n| n == axis);
            let x_major = match (position("x"), position("y")) {
                (Some(xi), Some(yi)) => xi < yi,
                _ => {
                    return Err(FlowError::validation(format!(
                        "range '{}' must name both x and y axes",
                        key
                    )))
                }
            };
            if order.is_some_and(|o| o != x_major) {
                return Err(FlowError::validation("U and V ranges disagree on axis order"));
            }
            order = Some(x_major);
        }

        Ok(Self {
            x,
            y,
            x_major: order.unwrap_or(false),
        })
    }

    fn matches(&self, other: &Self) -> bool {
        let same_axis = |a: &RegularAxis, b: &RegularAxis| {
            a.num == b.num && (a.start - b.start).abs() < 1e-9 && (a.stop - b.stop).abs() < 1e-9
        };
        same_axis(&self.x, &other.x) && same_axis(&self.y, &other.y) && self.x_major == other.x_major
    }
}

/// Number of steps between two datasets, 0 for a direct cut.
pub fn step_count(from: &GridData, to: &GridData, config: &TransitionConfig) -> usize {
    match (from.reference_time(), to.reference_time()) {
        (Some(a), Some(b)) if a == b => 0,
        (Some(a), Some(b)) => {
            let hours = (b - a).num_seconds().unsigned_abs() as f64 / 3600.0;
            let steps = (hours / config.granularity_hours).round() as usize;
            steps.clamp(config.min_steps, config.max_steps)
        }
        _ => config.default_steps,
    }
}

/// Build the plan that morphs `from` into `to`.
///
/// Each intermediate `i` of `n` steps holds `from + (to - from) * i / n` per
/// cell and component; a cell missing on either side stays missing. Fails
/// when the two datasets are not laid out on the same grid: same x and y
/// axes, same axis order, same number of cells.
pub fn interpolate_data(
    from: &Arc<GridData>,
    to: &Arc<GridData>,
    keys: &VectorKeys,
    config: &TransitionConfig,
) -> FlowResult<InterpolationPlan> {
    let steps = step_count(from, to, config);
    if steps <= 1 {
        return Ok(InterpolationPlan::direct(to.clone()));
    }

    let from_layout = GridLayout::of(from, keys)?;
    let to_layout = GridLayout::of(to, keys)?;
    if !from_layout.matches(&to_layout) {
        return Err(FlowError::validation(format!(
            "cannot interpolate between different grids: {:?} and {:?}",
            from_layout, to_layout
        )));
    }

    let (from_u, from_v) = from.components(keys)?;
    let (to_u, to_v) = to.components(keys)?;
    if from_u.len() != to_u.len() || from_v.len() != to_v.len() || from_u.len() != from_v.len() {
        return Err(FlowError::validation(format!(
            "cannot interpolate between grids of {} and {} cells",
            from_u.len(),
            to_u.len()
        )));
    }

    let lerp = |a: &[Option<f32>], b: &[Option<f32>], t: f32| -> Vec<Option<f32>> {
        a.iter()
            .zip(b)
            .map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) => Some(x + (y - x) * t),
                _ => None,
            })
            .collect()
    };

    let mut data = Vec::with_capacity(steps + 1);
    data.push(from.clone());
    for i in 1..steps {
        let t = i as f32 / steps as f32;
        let u = lerp(from_u, to_u, t);
        let v = lerp(from_v, to_v, t);
        data.push(Arc::new(to.with_components(keys, u, v)?));
    }
    data.push(to.clone());

    let mut plan = InterpolationPlan::direct(to.clone());
    plan.data = data;
    plan.speed = Some(config.granularity_hours / steps as f64);
    Ok(plan)
}
