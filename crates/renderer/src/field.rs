//! Field building: sparse U/V grid to dense screen-space vectors.
//!
//! The grid is reshaped into rows of `[u, v]` cells, every second pixel of
//! the canvas is inverted to lon/lat, the wind there is bilinearly
//! interpolated and corrected for projection distortion. Each sample covers
//! a 2x2 pixel block.

use std::time::Instant;

use flow_common::{
    CanvasBound, CoverageGrid, Extent, FlowError, FlowResult, GridData, NdArray, RegularAxis,
    VectorGrid, VectorKeys, WindVector,
};
use projection::{distort, interpolate, invert};
use rayon::prelude::*;
use tracing::debug;

use crate::vector_field::{create_field, VectorField};

/// Exponent applied to the map area when scaling particle speed.
const MAP_AREA_EXPONENT: f64 = 0.4;

/// Dense field samples, one column per two pixels of canvas width and one
/// cell per two pixels of height.
///
/// A sample at pixel `(x, y)` also answers for `(x + 1, y)`, `(x, y + 1)`
/// and `(x + 1, y + 1)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    x: i32,
    y: i32,
    columns: Vec<Vec<Option<WindVector>>>,
}

impl Columns {
    /// Sample at integer pixel `(x, y)`.
    pub fn get(&self, x: i32, y: i32) -> Option<WindVector> {
        if x < self.x || y < self.y {
            return None;
        }
        let c = ((x - self.x) / 2) as usize;
        let r = ((y - self.y) / 2) as usize;
        self.columns.get(c)?.get(r).copied().flatten()
    }

    /// Number of sampled columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|c| c.iter().all(Option::is_none))
    }

    /// Number of samples holding a vector.
    pub fn defined_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.iter().filter(|v| v.is_some()).count())
            .sum()
    }
}

/// Grid size and memory layout of one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisLayout {
    nx: usize,
    ny: usize,
    /// Distance between consecutive x / y indices in the flat value array.
    x_stride: usize,
    y_stride: usize,
}

fn check_axes_shape(key: &str, range: &NdArray) -> FlowResult<AxisLayout> {
    let (names, shape) = match (&range.axis_names, &range.shape) {
        (Some(names), Some(shape)) => (names, shape),
        _ => {
            return Err(FlowError::validation(format!(
                "range '{}' is missing axisNames or shape",
                key
            )))
        }
    };
    if names.len() != shape.len() {
        return Err(FlowError::validation(format!(
            "range '{}': {} axis names but {} shape entries",
            key,
            names.len(),
            shape.len()
        )));
    }

    let mut x_idx = None;
    let mut y_idx = None;
    for (idx, (name, &len)) in names.iter().zip(shape.iter()).enumerate() {
        match name.as_str() {
            "x" => x_idx = Some(idx),
            "y" => y_idx = Some(idx),
            other if len != 1 => {
                return Err(FlowError::validation(format!(
                    "range '{}': axis '{}' must have length 1, got {}",
                    key, other, len
                )))
            }
            _ => {}
        }
    }
    let (x_idx, y_idx) = match (x_idx, y_idx) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(FlowError::validation(format!(
                "range '{}' must name both x and y axes",
                key
            )))
        }
    };

    let stride = |idx: usize| shape[idx + 1..].iter().product::<usize>();
    let layout = AxisLayout {
        nx: shape[x_idx],
        ny: shape[y_idx],
        x_stride: stride(x_idx),
        y_stride: stride(y_idx),
    };

    let expected: usize = shape.iter().product();
    if range.values.len() != expected {
        return Err(FlowError::validation(format!(
            "range '{}' holds {} values, shape implies {}",
            key,
            range.values.len(),
            expected
        )));
    }
    Ok(layout)
}

/// Validate the U/V ranges against each other and the domain, then reshape
/// them into `rows[j][i]`. A full-circle x axis gets its first column
/// appended to every row so interpolation wraps seamlessly.
fn reshape_grid(
    coverage: &CoverageGrid,
    keys: &VectorKeys,
    x_axis: &RegularAxis,
    y_axis: &RegularAxis,
) -> FlowResult<VectorGrid> {
    let u = coverage.range(&keys.u)?;
    let v = coverage.range(&keys.v)?;
    let u_layout = check_axes_shape(&keys.u, u)?;
    let v_layout = check_axes_shape(&keys.v, v)?;

    if u_layout != v_layout {
        return Err(FlowError::validation(format!(
            "ranges '{}' and '{}' disagree on axis order or shape",
            keys.u, keys.v
        )));
    }
    if u_layout.nx != x_axis.num || u_layout.ny != y_axis.num {
        return Err(FlowError::validation(format!(
            "range shape {}x{} does not match domain axes {}x{}",
            u_layout.nx, u_layout.ny, x_axis.num, y_axis.num
        )));
    }

    let layout = u_layout;
    let wraps = x_axis.wraps_globe();
    let rows = (0..layout.ny)
        .map(|j| {
            let mut row: Vec<Option<[f32; 2]>> = (0..layout.nx)
                .map(|i| {
                    let p = j * layout.y_stride + i * layout.x_stride;
                    match (u.values[p], v.values[p]) {
                        (Some(uu), Some(vv)) if uu.is_finite() && vv.is_finite() => Some([uu, vv]),
                        _ => None,
                    }
                })
                .collect();
            if wraps {
                if let Some(first) = row.first().copied() {
                    row.push(first);
                }
            }
            row
        })
        .collect();

    Ok(VectorGrid::new(rows))
}

/// Build field columns from a coverage.
///
/// Fails with a validation error when the U and V metadata are missing or
/// incompatible; callers treat that as "no field".
pub fn build_field_columns(
    coverage: &CoverageGrid,
    keys: &VectorKeys,
    velocity_scale: f64,
    canvas_bound: &CanvasBound,
    extent: &Extent,
) -> FlowResult<Columns> {
    let x_axis = coverage.domain.x_axis()?;
    let y_axis = coverage.domain.y_axis()?;
    let grid = reshape_grid(coverage, keys, &x_axis, &y_axis)?;
    Ok(interpolate_field(
        velocity_scale,
        &x_axis,
        &y_axis,
        &grid,
        canvas_bound,
        extent,
    ))
}

/// Interpolate the grid at every second pixel of `bound`.
///
/// The velocity scale is multiplied by `mapArea^0.4` so particle speed
/// follows the geographic span of the view.
pub fn interpolate_field(
    velocity_scale: f64,
    x_axis: &RegularAxis,
    y_axis: &RegularAxis,
    grid: &VectorGrid,
    bound: &CanvasBound,
    extent: &Extent,
) -> Columns {
    let scale = velocity_scale * extent.map_area().powf(MAP_AREA_EXPONENT);

    let column_count = if bound.width > bound.x {
        ((bound.width - bound.x + 1) / 2) as usize
    } else {
        0
    };
    let row_count = if bound.y_max >= bound.y {
        ((bound.y_max - bound.y) / 2 + 1) as usize
    } else {
        0
    };

    let interpolate_column = |c: usize| -> Vec<Option<WindVector>> {
        let x = bound.x + 2 * c as i32;
        (0..row_count)
            .map(|r| {
                let y = bound.y + 2 * r as i32;
                let (lon, lat) = invert(x as f64, y as f64, extent);
                if !lon.is_finite() || !lat.is_finite() {
                    return None;
                }
                let wind = interpolate(x_axis, y_axis, grid, lon, lat)?;
                let [du, dv] = distort(
                    lon,
                    lat,
                    x as f64,
                    y as f64,
                    scale,
                    [wind.u as f64, wind.v as f64],
                    extent,
                );
                Some(WindVector::new(du as f32, dv as f32, wind.magnitude))
            })
            .collect()
    };

    let columns = (0..column_count)
        .into_par_iter()
        .map(interpolate_column)
        .collect();

    Columns {
        x: bound.x,
        y: bound.y,
        columns,
    }
}

/// Build a ready-to-use field from either dataset format.
pub fn build_field(
    data: &GridData,
    keys: &VectorKeys,
    velocity_scale: f64,
    canvas_bound: &CanvasBound,
    extent: &Extent,
) -> FlowResult<VectorField> {
    let start = Instant::now();
    let coverage = data.to_coverage(keys)?;
    let columns = build_field_columns(&coverage, keys, velocity_scale, canvas_bound, extent)?;
    debug!(
        columns = columns.column_count(),
        samples = columns.defined_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Built field"
    );
    Ok(create_field(columns, *canvas_bound))
}
