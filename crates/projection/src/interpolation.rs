//! Bilinear interpolation of `[u, v]` samples on a regular lat/lon grid.

use flow_common::{RegularAxis, VectorGrid, WindVector};

/// Remainder of floored division; stays non-negative for negative `a`.
pub fn floor_mod(a: f64, n: f64) -> f64 {
    a - n * (a / n).floor()
}

/// Blend four neighbouring samples by the fractional position `(x, y)`.
///
/// `g00` is the sample at the cell origin, `g10` one step along x, `g01`
/// one step along y and `g11` the opposite corner.
pub fn bilinear_interpolate_vector(
    x: f64,
    y: f64,
    g00: [f32; 2],
    g10: [f32; 2],
    g01: [f32; 2],
    g11: [f32; 2],
) -> WindVector {
    let rx = 1.0 - x;
    let ry = 1.0 - y;
    let (a, b, c, d) = (rx * ry, x * ry, rx * y, x * y);
    let u = g00[0] as f64 * a + g10[0] as f64 * b + g01[0] as f64 * c + g11[0] as f64 * d;
    let v = g00[1] as f64 * a + g10[1] as f64 * b + g01[1] as f64 * c + g11[1] as f64 * d;
    WindVector::new(u as f32, v as f32, (u * u + v * v).sqrt() as f32)
}

/// Wind at `(lon, lat)` in degrees, or `None` when any of the four
/// surrounding cells has no data.
///
/// Longitude is located with floored-modulo indexing so grids can wrap
/// around the antimeridian; latitude is indexed linearly.
pub fn interpolate(
    x_axis: &RegularAxis,
    y_axis: &RegularAxis,
    grid: &VectorGrid,
    lon: f64,
    lat: f64,
) -> Option<WindVector> {
    if x_axis.num == 0 || y_axis.num == 0 || grid.is_empty() {
        return None;
    }
    let dx = x_axis.step();
    let dy = y_axis.step();
    if dx == 0.0 || dy == 0.0 || !dx.is_finite() || !dy.is_finite() {
        return None;
    }

    let i = floor_mod(lon - x_axis.start, 360.0) / dx;
    let j = (lat - y_axis.start) / dy;
    if !i.is_finite() || !j.is_finite() {
        return None;
    }

    let fi = i.floor();
    let fj = j.floor();
    let (fi_idx, fj_idx) = (fi as i64, fj as i64);

    let g00 = grid.get(fj_idx, fi_idx)?;
    let g10 = grid.get(fj_idx, fi_idx + 1)?;
    let g01 = grid.get(fj_idx + 1, fi_idx)?;
    let g11 = grid.get(fj_idx + 1, fi_idx + 1)?;

    Some(bilinear_interpolate_vector(i - fi, j - fj, g00, g10, g01, g11))
}

#[cfg(test)]
mod tests {
    use super::*;

    const G00: [f32; 2] = [1.0, -2.0];
    const G10: [f32; 2] = [3.5, 0.0];
    const G01: [f32; 2] = [-4.0, 8.0];
    const G11: [f32; 2] = [0.25, 6.0];

    #[test]
    fn test_floor_mod_negative() {
        assert_eq!(floor_mod(-10.0, 360.0), 350.0);
        assert_eq!(floor_mod(370.0, 360.0), 10.0);
        assert_eq!(floor_mod(0.0, 360.0), 0.0);
    }

    #[test]
    fn test_bilinear_corners_exact() {
        let corners = [
            ((0.0, 0.0), G00),
            ((1.0, 0.0), G10),
            ((0.0, 1.0), G01),
            ((1.0, 1.0), G11),
        ];
        for ((x, y), expected) in corners {
            let w = bilinear_interpolate_vector(x, y, G00, G10, G01, G11);
            assert_eq!([w.u, w.v], expected, "corner ({}, {})", x, y);
        }
    }

    #[test]
    fn test_bilinear_center_is_mean() {
        let w = bilinear_interpolate_vector(0.5, 0.5, G00, G10, G01, G11);
        let mean_u = (G00[0] + G10[0] + G01[0] + G11[0]) / 4.0;
        let mean_v = (G00[1] + G10[1] + G01[1] + G11[1]) / 4.0;
        assert!((w.u - mean_u).abs() < 1e-6);
        assert!((w.v - mean_v).abs() < 1e-6);
        assert!((w.magnitude - (mean_u * mean_u + mean_v * mean_v).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_interpolate_null_neighbour() {
        let x = RegularAxis::new(0.0, 2.0, 3);
        let y = RegularAxis::new(10.0, 8.0, 3);
        let grid = VectorGrid::new(vec![
            vec![Some([1.0, 0.0]), Some([1.0, 0.0]), Some([1.0, 0.0])],
            vec![Some([1.0, 0.0]), Some([1.0, 0.0]), Some([1.0, 0.0])],
            vec![Some([1.0, 0.0]), Some([1.0, 0.0]), None],
        ]);

        // The cell whose far corner is missing yields no vector.
        assert!(interpolate(&x, &y, &grid, 1.5, 8.5).is_none());
        // Its neighbours are complete.
        let w = interpolate(&x, &y, &grid, 0.5, 9.5).unwrap();
        assert_eq!(w.u, 1.0);
        assert!(interpolate(&x, &y, &grid, 1.5, 9.5).is_some());
    }

    #[test]
    fn test_interpolate_outside_grid() {
        let x = RegularAxis::new(0.0, 1.0, 2);
        let y = RegularAxis::new(1.0, 0.0, 2);
        let grid = VectorGrid::new(vec![vec![Some([1.0, 1.0]); 2]; 2]);
        assert!(interpolate(&x, &y, &grid, 0.5, 5.0).is_none());
        assert!(interpolate(&x, &y, &grid, 0.5, -5.0).is_none());
        assert!(interpolate(&x, &y, &grid, 0.5, 0.5).is_some());
    }

    #[test]
    fn test_interpolate_wraps_longitude() {
        let x = RegularAxis::new(0.0, 270.0, 4);
        let y = RegularAxis::new(10.0, 0.0, 2);
        // Wrap column appended: index 4 repeats index 0.
        let row = vec![
            Some([0.0, 0.0]),
            Some([1.0, 0.0]),
            Some([2.0, 0.0]),
            Some([3.0, 0.0]),
            Some([0.0, 0.0]),
        ];
        let grid = VectorGrid::new(vec![row.clone(), row]);

        let east = interpolate(&x, &y, &grid, 315.0, 5.0).unwrap();
        let west = interpolate(&x, &y, &grid, -45.0, 5.0).unwrap();
        assert_eq!(east, west);
        assert!((east.u - 1.5).abs() < 1e-6);
    }
}
