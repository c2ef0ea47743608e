//! Viewport geometry: geographic extent and pixel canvas bounds.

use serde::{Deserialize, Serialize};

/// Geographic bounds of the viewport in radians plus its pixel size.
///
/// Recomputed whenever the viewport changes (pan, zoom, resize).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub south: f64,
    pub north: f64,
    pub east: f64,
    pub west: f64,
    pub width: f64,
    pub height: f64,
}

impl Extent {
    /// Build an extent from south-west and north-east corners given as
    /// `[lon, lat]` in degrees.
    pub fn from_degrees(south_west: [f64; 2], north_east: [f64; 2], width: u32, height: u32) -> Self {
        Self {
            south: south_west[1].to_radians(),
            north: north_east[1].to_radians(),
            east: north_east[0].to_radians(),
            west: south_west[0].to_radians(),
            width: width as f64,
            height: height as f64,
        }
    }

    /// Product of the latitude and longitude spans (radians squared).
    ///
    /// Used to scale particle speed with the geographic size of the view.
    pub fn map_area(&self) -> f64 {
        (self.south - self.north) * (self.west - self.east)
    }
}

/// Pixel rectangle of the drawable surface the field is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasBound {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "xMax")]
    pub x_max: i32,
    #[serde(rename = "yMax")]
    pub y_max: i32,
    pub width: i32,
    pub height: i32,
}

impl CanvasBound {
    /// Clamp a pixel rectangle given by its upper-left and lower-right corners
    /// to a `width` x `height` surface.
    pub fn build(upper_left: [f64; 2], lower_right: [f64; 2], width: u32, height: u32) -> Self {
        let width = width as i32;
        let height = height as i32;
        Self {
            x: upper_left[0].round() as i32,
            y: (upper_left[1].floor() as i32).max(0),
            x_max: (lower_right[0].ceil() as i32).min(width - 1),
            y_max: (lower_right[1].ceil() as i32).min(height - 1),
            width,
            height,
        }
    }

    /// Number of pixels covered by the surface.
    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }
}

/// What the host map hands the core on every pan, zoom or resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Pixel width of the drawable surface.
    pub width: u32,
    /// Pixel height of the drawable surface.
    pub height: u32,
    /// South-west corner as `[lon, lat]` in degrees.
    pub south_west: [f64; 2],
    /// North-east corner as `[lon, lat]` in degrees.
    pub north_east: [f64; 2],
    /// Map zoom level.
    #[serde(default)]
    pub zoom: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, south_west: [f64; 2], north_east: [f64; 2], zoom: f64) -> Self {
        Self {
            width,
            height,
            south_west,
            north_east,
            zoom,
        }
    }

    /// Pixel corners of the whole surface: `[0, 0]` to `[width, height]`.
    pub fn pixel_bounds(&self) -> ([f64; 2], [f64; 2]) {
        ([0.0, 0.0], [self.width as f64, self.height as f64])
    }

    pub fn extent(&self) -> Extent {
        Extent::from_degrees(self.south_west, self.north_east, self.width, self.height)
    }

    pub fn canvas_bound(&self) -> CanvasBound {
        let (upper_left, lower_right) = self.pixel_bounds();
        CanvasBound::build(upper_left, lower_right, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_bound_clamps_to_surface() {
        let bound = CanvasBound::build([0.0, 0.0], [800.0, 600.0], 800, 600);
        assert_eq!(bound.x, 0);
        assert_eq!(bound.y, 0);
        assert_eq!(bound.x_max, 799);
        assert_eq!(bound.y_max, 599);
        assert_eq!(bound.area(), 480_000);
    }

    #[test]
    fn test_canvas_bound_negative_top_is_clamped() {
        let bound = CanvasBound::build([-0.4, -3.5], [10.2, 10.2], 20, 20);
        assert_eq!(bound.x, 0);
        assert_eq!(bound.y, 0);
        assert_eq!(bound.x_max, 11);
        assert_eq!(bound.y_max, 11);
    }

    #[test]
    fn test_extent_from_degrees() {
        let extent = Extent::from_degrees([-10.0, 35.0], [30.0, 60.0], 400, 300);
        assert!((extent.west - (-10.0f64).to_radians()).abs() < 1e-12);
        assert!((extent.north - 60.0f64.to_radians()).abs() < 1e-12);
        assert_eq!(extent.width, 400.0);
        assert!(extent.map_area() > 0.0);
    }

    #[test]
    fn test_viewport_serde_field_names() {
        let bound = CanvasBound::build([0.0, 0.0], [10.0, 10.0], 10, 10);
        let json = serde_json::to_string(&bound).unwrap();
        assert!(json.contains("\"xMax\":9"));
        assert!(json.contains("\"yMax\":9"));
    }
}
