//! Spherical Mercator projection onto the pixel space of a viewport.
//!
//! Coordinates handed to and returned from `project`/`invert` are in
//! degrees; the `Extent` carries its bounds in radians together with the
//! pixel size of the drawable surface. Screen Y grows downwards.

use std::f64::consts::PI;

use flow_common::Extent;

/// Finite-difference step for the distortion estimate: 10^-5.2 degrees.
pub const DISTORTION_STEP: f64 = 6.309_573_444_801_933e-6;

pub fn deg_to_rad(deg: f64) -> f64 {
    deg / 180.0 * PI
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad / (PI / 180.0)
}

/// Mercator ordinate of a latitude given in radians.
pub fn merc_y(lat: f64) -> f64 {
    (lat / 2.0 + PI / 4.0).tan().ln()
}

/// Project a geographic point (degrees) to pixel `(x, y)`.
pub fn project(lat: f64, lon: f64, extent: &Extent) -> (f64, f64) {
    let y_min = merc_y(extent.south);
    let y_max = merc_y(extent.north);
    let x_factor = extent.width / (extent.east - extent.west);
    let y_factor = extent.height / (y_max - y_min);

    let x = (deg_to_rad(lon) - extent.west) * x_factor;
    let y = (y_max - merc_y(deg_to_rad(lat))) * y_factor;
    (x, y)
}

/// Inverse of [`project`]: pixel `(x, y)` to `(lon, lat)` in degrees.
///
/// The vertical scale is anchored on the extent's south and north edges, so
/// for any extent `project(invert(p))` reproduces `p`.
pub fn invert(x: f64, y: f64, extent: &Extent) -> (f64, f64) {
    let lon_delta = extent.east - extent.west;
    let y_min = merc_y(extent.south);
    let y_max = merc_y(extent.north);
    let y_factor = extent.height / (y_max - y_min);

    let merc = y_max - y / y_factor;
    let lat = rad_to_deg(2.0 * merc.exp().atan() - PI / 2.0);
    let lon = rad_to_deg(extent.west) + x / extent.width * rad_to_deg(lon_delta);
    (lon, lat)
}

/// Local Jacobian of the projection at `(lon, lat)` / pixel `(x, y)`.
///
/// Returns `[dx/dλ, dy/dλ, dx/dφ, dy/dφ]`, the λ terms divided by the
/// meridian scale factor `cos(lat)`. Steps are taken towards the interior
/// so the estimate never crosses the antimeridian or a pole.
pub fn distortion(lon: f64, lat: f64, x: f64, y: f64, extent: &Extent) -> [f64; 4] {
    let h_lon = if lon < 0.0 { DISTORTION_STEP } else { -DISTORTION_STEP };
    let h_lat = if lat < 0.0 { DISTORTION_STEP } else { -DISTORTION_STEP };

    let p_lon = project(lat, lon + h_lon, extent);
    let p_lat = project(lat + h_lat, lon, extent);

    let k = deg_to_rad(lat).cos();
    [
        (p_lon.0 - x) / h_lon / k,
        (p_lon.1 - y) / h_lon / k,
        (p_lat.0 - x) / h_lat,
        (p_lat.1 - y) / h_lat,
    ]
}

/// Scale a geographic wind vector and correct it into pixel displacement.
pub fn distort(
    lon: f64,
    lat: f64,
    x: f64,
    y: f64,
    scale: f64,
    wind: [f64; 2],
    extent: &Extent,
) -> [f64; 2] {
    let u = wind[0] * scale;
    let v = wind[1] * scale;
    let d = distortion(lon, lat, x, y, extent);
    [d[0] * u + d[2] * v, d[1] * u + d[3] * v]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn europe() -> Extent {
        Extent::from_degrees([-10.0, 35.0], [30.0, 60.0], 800, 600)
    }

    #[test]
    fn test_deg_rad_reciprocal() {
        for deg in [-180.0, -45.5, 0.0, 12.25, 90.0, 359.0] {
            assert!((rad_to_deg(deg_to_rad(deg)) - deg).abs() < 1e-12);
        }
    }

    #[test]
    fn test_project_corners() {
        let extent = europe();
        let (x, y) = project(60.0, -10.0, &extent);
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);

        let (x, y) = project(35.0, 30.0, &extent);
        assert!((x - 800.0).abs() < 1e-9);
        assert!((y - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_invert_corners() {
        let extent = europe();
        let (lon, lat) = invert(0.0, 600.0, &extent);
        assert!((lon - -10.0).abs() < 1e-9);
        assert!((lat - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_y_points_south() {
        let extent = europe();
        let (_, north) = project(55.0, 0.0, &extent);
        let (_, south) = project(40.0, 0.0, &extent);
        assert!(north < south);
    }

    #[test]
    fn test_distortion_eastward_wind_moves_right() {
        let extent = europe();
        let (x, y) = project(45.0, 10.0, &extent);
        let [dx, dy] = distort(10.0, 45.0, x, y, 1.0, [1.0, 0.0], &extent);
        assert!(dx > 0.0);
        assert!(dy.abs() < 1e-6);

        let [dx, dy] = distort(10.0, 45.0, x, y, 1.0, [0.0, 1.0], &extent);
        assert!(dx.abs() < 1e-6);
        assert!(dy < 0.0, "northward wind moves up the screen");
    }

    #[test]
    fn test_distortion_step_sign_near_antimeridian() {
        let extent = Extent::from_degrees([170.0, -10.0], [180.0, 10.0], 200, 200);
        let (x, y) = project(5.0, 179.9, &extent);
        let d = distortion(179.9, 5.0, x, y, &extent);
        assert!(d.iter().all(|c| c.is_finite()));
    }
}
