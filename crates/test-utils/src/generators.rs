//! Synthetic wind datasets with predictable values.
//!
//! Every generator takes a closure `(lon, lat) -> Option<(u, v)>` so tests
//! can place gaps (`None`) and gradients exactly where they need them.

use std::collections::HashMap;

use flow_common::{
    CoverageGrid, Domain, GridData, LegacyGrid, LegacyHeader, NdArray, RegularAxis, VectorKeys,
};

/// Coordinates of every point on an axis.
pub fn axis_points(axis: &RegularAxis) -> Vec<f64> {
    (0..axis.num)
        .map(|i| axis.start + axis.step() * i as f64)
        .collect()
}

/// Coverage with `[t, y, x]` axis order (x varies fastest).
pub fn coverage_from_fn<F>(x: RegularAxis, y: RegularAxis, keys: &VectorKeys, f: F) -> GridData
where
    F: Fn(f64, f64) -> Option<(f32, f32)>,
{
    let mut u = Vec::with_capacity(x.num * y.num);
    let mut v = Vec::with_capacity(x.num * y.num);
    for lat in axis_points(&y) {
        for lon in axis_points(&x) {
            let sample = f(lon, lat);
            u.push(sample.map(|s| s.0));
            v.push(sample.map(|s| s.1));
        }
    }
    build_coverage(x, y, keys, u, v, &["t", "y", "x"], &[1, y.num, x.num])
}

/// Coverage with `[x, y]` axis order (y varies fastest).
pub fn transposed_coverage_from_fn<F>(
    x: RegularAxis,
    y: RegularAxis,
    keys: &VectorKeys,
    f: F,
) -> GridData
where
    F: Fn(f64, f64) -> Option<(f32, f32)>,
{
    let mut u = Vec::with_capacity(x.num * y.num);
    let mut v = Vec::with_capacity(x.num * y.num);
    for lon in axis_points(&x) {
        for lat in axis_points(&y) {
            let sample = f(lon, lat);
            u.push(sample.map(|s| s.0));
            v.push(sample.map(|s| s.1));
        }
    }
    build_coverage(x, y, keys, u, v, &["x", "y"], &[x.num, y.num])
}

fn build_coverage(
    x: RegularAxis,
    y: RegularAxis,
    keys: &VectorKeys,
    u: Vec<Option<f32>>,
    v: Vec<Option<f32>>,
    axis_names: &[&str],
    shape: &[usize],
) -> GridData {
    let names: Vec<String> = axis_names.iter().map(|s| s.to_string()).collect();
    let mut ranges = HashMap::new();
    ranges.insert(keys.u.clone(), NdArray::new(u, shape.to_vec(), names.clone()));
    ranges.insert(keys.v.clone(), NdArray::new(v, shape.to_vec(), names));
    GridData::Coverage(CoverageGrid::new(Domain::grid(x, y), ranges))
}

/// Constant wind over a regular grid.
pub fn uniform_coverage(x: RegularAxis, y: RegularAxis, u: f32, v: f32) -> GridData {
    coverage_from_fn(x, y, &VectorKeys::default(), |_, _| Some((u, v)))
}

/// Global grid at `step` degrees: longitudes `0..360-step`, latitudes 90 to -90.
pub fn global_coverage<F>(step: f64, f: F) -> GridData
where
    F: Fn(f64, f64) -> Option<(f32, f32)>,
{
    let nx = (360.0 / step).round() as usize;
    let ny = (180.0 / step).round() as usize + 1;
    let x = RegularAxis::new(0.0, 360.0 - step, nx);
    let y = RegularAxis::new(90.0, -90.0, ny);
    coverage_from_fn(x, y, &VectorKeys::default(), f)
}

/// Legacy `{header, data}` dataset, rows running north to south.
pub fn legacy_from_fn<F>(nx: usize, ny: usize, lo1: f64, la1: f64, step: f64, f: F) -> GridData
where
    F: Fn(f64, f64) -> Option<(f32, f32)>,
{
    let mut u = Vec::with_capacity(nx * ny);
    let mut v = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        let lat = la1 - step * j as f64;
        for i in 0..nx {
            let sample = f(lo1 + step * i as f64, lat);
            u.push(sample.map(|s| s.0));
            v.push(sample.map(|s| s.1));
        }
    }
    GridData::Legacy(LegacyGrid {
        header: LegacyHeader {
            nx,
            ny,
            lo1,
            la1,
            dx: step,
            dy: step,
            ref_time: None,
            forecast_time: None,
            extra: serde_json::Map::new(),
        },
        data: vec![u, v],
    })
}

/// Stamp a reference time onto a dataset.
pub fn with_ref_time(data: GridData, ref_time: &str) -> GridData {
    match data {
        GridData::Coverage(mut c) => {
            c.ref_time = Some(ref_time.to_string());
            GridData::Coverage(c)
        }
        GridData::Legacy(mut l) => {
            l.header.ref_time = Some(ref_time.to_string());
            GridData::Legacy(l)
        }
    }
}
