//! Gridded wind datasets.
//!
//! Two wire formats are accepted:
//! - A CoverageJSON-style document with a `domain` of regular axes and one
//!   `NdArray` range per wind component.
//! - The legacy `{header, data: [u, v]}` layout with a regular lat/lon
//!   header.
//!
//! A dataset is immutable once received. Updates replace the whole value.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::parse_reference_time;
use crate::{FlowError, FlowResult};

/// Regular axis defined by its first and last coordinate and point count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegularAxis {
    pub start: f64,
    pub stop: f64,
    pub num: usize,
}

impl RegularAxis {
    pub fn new(start: f64, stop: f64, num: usize) -> Self {
        Self { start, stop, num }
    }

    /// Spacing between consecutive points (negative for descending axes).
    pub fn step(&self) -> f64 {
        if self.num > 1 {
            (self.stop - self.start) / (self.num - 1) as f64
        } else {
            0.0
        }
    }

    /// True when the axis, plus one wrap-around cell, covers a full 360°.
    pub fn wraps_globe(&self) -> bool {
        self.num > 1 && (self.step().abs() * self.num as f64 + 1e-9).floor() >= 360.0
    }
}

/// An axis in the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Axis {
    /// Regular axis defined by start, stop, and number of points.
    Regular(RegularAxis),
    /// Explicit list of values (typically the `t` axis).
    Values { values: Vec<AxisValue> },
}

impl Axis {
    pub fn len(&self) -> usize {
        match self {
            Axis::Regular(axis) => axis.num,
            Axis::Values { values } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_regular(&self) -> Option<RegularAxis> {
        match self {
            Axis::Regular(axis) => Some(*axis),
            Axis::Values { .. } => None,
        }
    }

    fn first_value(&self) -> Option<&AxisValue> {
        match self {
            Axis::Values { values } => values.first(),
            Axis::Regular(_) => None,
        }
    }
}

/// A value on an explicit axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Float(f64),
    String(String),
}

/// The spatial/temporal domain of a coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(rename = "domainType", default, skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<String>,

    pub axes: HashMap<String, Axis>,
}

impl Domain {
    /// Create a grid domain from regular x and y axes.
    pub fn grid(x: RegularAxis, y: RegularAxis) -> Self {
        let mut axes = HashMap::new();
        axes.insert("x".to_string(), Axis::Regular(x));
        axes.insert("y".to_string(), Axis::Regular(y));
        Self {
            type_: Some("Domain".to_string()),
            domain_type: Some("Grid".to_string()),
            axes,
        }
    }

    /// Add a single-valued time axis.
    pub fn with_time(mut self, t: impl Into<String>) -> Self {
        self.axes.insert(
            "t".to_string(),
            Axis::Values {
                values: vec![AxisValue::String(t.into())],
            },
        );
        self
    }

    /// Look up a regular axis by name.
    pub fn regular_axis(&self, name: &str) -> FlowResult<RegularAxis> {
        match self.axes.get(name) {
            Some(axis) => axis.as_regular().ok_or_else(|| {
                FlowError::validation(format!("axis '{}' is not a regular start/stop/num axis", name))
            }),
            None => Err(FlowError::validation(format!("domain has no '{}' axis", name))),
        }
    }

    pub fn x_axis(&self) -> FlowResult<RegularAxis> {
        self.regular_axis("x")
    }

    pub fn y_axis(&self) -> FlowResult<RegularAxis> {
        self.regular_axis("y")
    }
}

/// N-dimensional array of component values; `null` marks missing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    #[serde(rename = "type", default = "default_ndarray_type")]
    pub type_: String,

    #[serde(rename = "dataType", default = "default_data_type")]
    pub data_type: String,

    #[serde(rename = "axisNames", default, skip_serializing_if = "Option::is_none")]
    pub axis_names: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,

    pub values: Vec<Option<f32>>,
}

fn default_ndarray_type() -> String {
    "NdArray".to_string()
}

fn default_data_type() -> String {
    "float".to_string()
}

impl NdArray {
    pub fn new(values: Vec<Option<f32>>, shape: Vec<usize>, axis_names: Vec<String>) -> Self {
        Self {
            type_: default_ndarray_type(),
            data_type: default_data_type(),
            axis_names: Some(axis_names),
            shape: Some(shape),
            values,
        }
    }

    /// Same metadata, different values.
    pub fn with_values(&self, values: Vec<Option<f32>>) -> Self {
        Self {
            values,
            ..self.clone()
        }
    }
}

/// Names of the U and V ranges in a coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorKeys {
    pub u: String,
    pub v: String,
}

impl VectorKeys {
    pub fn new(u: impl Into<String>, v: impl Into<String>) -> Self {
        Self {
            u: u.into(),
            v: v.into(),
        }
    }
}

impl Default for VectorKeys {
    fn default() -> Self {
        Self::new("u", "v")
    }
}

/// CoverageJSON-style dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGrid {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(rename = "refTime", default, skip_serializing_if = "Option::is_none")]
    pub ref_time: Option<String>,

    pub domain: Domain,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    pub ranges: HashMap<String, NdArray>,
}

impl CoverageGrid {
    pub fn new(domain: Domain, ranges: HashMap<String, NdArray>) -> Self {
        Self {
            type_: Some("Coverage".to_string()),
            ref_time: None,
            domain,
            parameters: None,
            ranges,
        }
    }

    pub fn range(&self, key: &str) -> FlowResult<&NdArray> {
        self.ranges
            .get(key)
            .ok_or_else(|| FlowError::validation(format!("coverage has no '{}' range", key)))
    }

    /// Explicit `refTime`, else the first value of the `t` axis.
    pub fn reference_time_str(&self) -> Option<&str> {
        if let Some(ref t) = self.ref_time {
            return Some(t.as_str());
        }
        match self.domain.axes.get("t").and_then(Axis::first_value) {
            Some(AxisValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Header of the legacy format (regular lat/lon grid, rows north to south).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyHeader {
    pub nx: usize,
    pub ny: usize,
    /// Longitude of the first grid point.
    pub lo1: f64,
    /// Latitude of the first grid point.
    pub la1: f64,
    pub dx: f64,
    pub dy: f64,

    #[serde(rename = "refTime", default, skip_serializing_if = "Option::is_none")]
    pub ref_time: Option<String>,

    #[serde(rename = "forecastTime", default, skip_serializing_if = "Option::is_none")]
    pub forecast_time: Option<f64>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Legacy dataset: `{header, data: [u, v]}` with flat row-major arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyGrid {
    pub header: LegacyHeader,
    pub data: Vec<Vec<Option<f32>>>,
}

impl LegacyGrid {
    /// Express the legacy layout as a coverage with `[y, x]` axis order.
    pub fn to_coverage(&self, keys: &VectorKeys) -> FlowResult<CoverageGrid> {
        let (u, v) = self.components()?;
        let h = &self.header;
        let x = RegularAxis::new(h.lo1, h.lo1 + h.nx.saturating_sub(1) as f64 * h.dx, h.nx);
        let y = RegularAxis::new(h.la1, h.la1 - h.ny.saturating_sub(1) as f64 * h.dy, h.ny);

        let axis_names = vec!["y".to_string(), "x".to_string()];
        let shape = vec![h.ny, h.nx];
        let mut ranges = HashMap::new();
        ranges.insert(keys.u.clone(), NdArray::new(u.to_vec(), shape.clone(), axis_names.clone()));
        ranges.insert(keys.v.clone(), NdArray::new(v.to_vec(), shape, axis_names));

        let mut coverage = CoverageGrid::new(Domain::grid(x, y), ranges);
        coverage.ref_time = h.ref_time.clone();
        Ok(coverage)
    }

    fn components(&self) -> FlowResult<(&[Option<f32>], &[Option<f32>])> {
        match self.data.as_slice() {
            [u, v] => Ok((u.as_slice(), v.as_slice())),
            other => Err(FlowError::validation(format!(
                "legacy data must hold exactly [u, v] arrays, found {}",
                other.len()
            ))),
        }
    }
}

/// A wind dataset in either accepted format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridData {
    Coverage(CoverageGrid),
    Legacy(LegacyGrid),
}

impl GridData {
    pub fn from_json(json: &str) -> FlowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> FlowResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Raw reference-time string, if the dataset carries one.
    pub fn reference_time_str(&self) -> Option<&str> {
        match self {
            GridData::Coverage(c) => c.reference_time_str(),
            GridData::Legacy(l) => l.header.ref_time.as_deref(),
        }
    }

    /// Parsed reference time; unparseable values count as absent.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.reference_time_str()
            .and_then(|s| parse_reference_time(s).ok())
    }

    /// View the dataset as a coverage, converting the legacy layout.
    pub fn to_coverage(&self, keys: &VectorKeys) -> FlowResult<Cow<'_, CoverageGrid>> {
        match self {
            GridData::Coverage(c) => Ok(Cow::Borrowed(c)),
            GridData::Legacy(l) => Ok(Cow::Owned(l.to_coverage(keys)?)),
        }
    }

    /// Flat U and V value arrays.
    pub fn components(&self, keys: &VectorKeys) -> FlowResult<(&[Option<f32>], &[Option<f32>])> {
        match self {
            GridData::Coverage(c) => Ok((
                c.range(&keys.u)?.values.as_slice(),
                c.range(&keys.v)?.values.as_slice(),
            )),
            GridData::Legacy(l) => l.components(),
        }
    }

    /// Copy of this dataset with the U and V values replaced.
    pub fn with_components(
        &self,
        keys: &VectorKeys,
        u: Vec<Option<f32>>,
        v: Vec<Option<f32>>,
    ) -> FlowResult<GridData> {
        match self {
            GridData::Coverage(c) => {
                let mut out = c.clone();
                let u_range = c.range(&keys.u)?.with_values(u);
                let v_range = c.range(&keys.v)?.with_values(v);
                out.ranges.insert(keys.u.clone(), u_range);
                out.ranges.insert(keys.v.clone(), v_range);
                Ok(GridData::Coverage(out))
            }
            GridData::Legacy(l) => Ok(GridData::Legacy(LegacyGrid {
                header: l.header.clone(),
                data: vec![u, v],
            })),
        }
    }
}

/// Reshaped component grid: `rows[j][i]` holds `[u, v]` or `None` where data
/// is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorGrid {
    rows: Vec<Vec<Option<[f32; 2]>>>,
}

impl VectorGrid {
    pub fn new(rows: Vec<Vec<Option<[f32; 2]>>>) -> Self {
        Self { rows }
    }

    /// Cell at row `j`, column `i`; out-of-range indices yield `None`.
    pub fn get(&self, j: i64, i: i64) -> Option<[f32; 2]> {
        if j < 0 || i < 0 {
            return None;
        }
        self.rows.get(j as usize)?.get(i as usize).copied().flatten()
    }

    pub fn rows(&self) -> &[Vec<Option<[f32; 2]>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
