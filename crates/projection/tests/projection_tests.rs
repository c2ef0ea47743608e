//! Tests for Mercator projection and grid interpolation.

use flow_common::{RegularAxis, VectorGrid};
use projection::{distort, interpolate, invert, project};
use test_utils::{assert_approx_eq, assert_coords_approx_eq, viewports};

// ============================================================================
// project / invert
// ============================================================================

#[test]
fn test_round_trip_inside_extent() {
    for vp in [viewports::europe(), viewports::small(), viewports::world(), viewports::pacific()] {
        let extent = vp.extent();
        let (sw, ne) = (vp.south_west, vp.north_east);
        for fx in [0.0, 0.1, 0.33, 0.5, 0.9, 1.0] {
            for fy in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let lon = sw[0] + (ne[0] - sw[0]) * fx;
                let lat = sw[1] + (ne[1] - sw[1]) * fy;
                let (x, y) = project(lat, lon, &extent);
                let (lon2, lat2) = invert(x, y, &extent);
                assert_coords_approx_eq!((lon2, lat2), (lon, lat), 1e-6);
            }
        }
    }
}

#[test]
fn test_round_trip_pixel_space() {
    let vp = viewports::europe();
    let extent = vp.extent();
    for x in (0..=800).step_by(40) {
        for y in (0..=600).step_by(30) {
            let (lon, lat) = invert(x as f64, y as f64, &extent);
            let (px, py) = project(lat, lon, &extent);
            assert_coords_approx_eq!((px, py), (x as f64, y as f64), 1e-6);
        }
    }
}

#[test]
fn test_invert_longitude_is_linear() {
    let extent = viewports::world().extent();
    let (lon, lat) = invert(360.0, 300.0, &extent);
    assert_approx_eq!(lon, 0.0, 1e-9);
    assert_approx_eq!(lat, 0.0, 1e-9);
    let (lon, _) = invert(180.0, 0.0, &extent);
    assert_approx_eq!(lon, -90.0, 1e-9);
}

// ============================================================================
// distortion
// ============================================================================

#[test]
fn test_distortion_grows_toward_pole() {
    // Same geographic wind covers more pixels further north under Mercator.
    let extent = viewports::world().extent();
    let (x0, y0) = project(0.0, 20.0, &extent);
    let (x1, y1) = project(70.0, 20.0, &extent);
    let equator = distort(20.0, 0.0, x0, y0, 1.0, [0.0, 1.0], &extent);
    let north = distort(20.0, 70.0, x1, y1, 1.0, [0.0, 1.0], &extent);
    assert!(north[1].abs() > equator[1].abs());
}

#[test]
fn test_distort_scales_linearly() {
    let extent = viewports::europe().extent();
    let (x, y) = project(50.0, 5.0, &extent);
    let a = distort(5.0, 50.0, x, y, 1.0, [3.0, -2.0], &extent);
    let b = distort(5.0, 50.0, x, y, 2.0, [3.0, -2.0], &extent);
    assert_approx_eq!(b[0], 2.0 * a[0], 1e-9);
    assert_approx_eq!(b[1], 2.0 * a[1], 1e-9);
}

// ============================================================================
// interpolate
// ============================================================================

#[test]
fn test_interpolate_finite_when_complete() {
    let x = RegularAxis::new(-10.0, 30.0, 9);
    let y = RegularAxis::new(60.0, 35.0, 6);
    let grid = VectorGrid::new(vec![vec![Some([2.0, -1.0]); 9]; 6]);
    for lon in [-10.0, -3.3, 0.0, 12.7, 29.9] {
        for lat in [59.9, 50.0, 41.2, 35.1] {
            let w = interpolate(&x, &y, &grid, lon, lat).expect("complete cell");
            assert!(w.magnitude.is_finite());
            assert_approx_eq!(w.u, 2.0, 1e-6);
            assert_approx_eq!(w.v, -1.0, 1e-6);
        }
    }
}

#[test]
fn test_interpolate_gap_returns_none() {
    let x = RegularAxis::new(0.0, 4.0, 5);
    let y = RegularAxis::new(4.0, 0.0, 5);
    let mut rows = vec![vec![Some([1.0, 1.0]); 5]; 5];
    rows[2][2] = None;
    let grid = VectorGrid::new(rows);
    // All four cells around (2, 2) are incomplete.
    for (lon, lat) in [(1.5, 2.5), (2.5, 2.5), (1.5, 1.5), (2.5, 1.5)] {
        assert!(interpolate(&x, &y, &grid, lon, lat).is_none());
    }
    assert!(interpolate(&x, &y, &grid, 0.5, 3.5).is_some());
}
