//! Drawable surface for particle trails.
//!
//! Trails persist by fading the whole surface each frame (destination-in
//! with a low alpha) and new segments are stroked additively so overlapping
//! trails brighten.

use flow_common::{CanvasBound, FlowError, FlowResult};
use tiny_skia::{BlendMode, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::colorscale::Color;
use crate::png::create_png;

/// Alpha of the fade fill before the trail factor is applied.
const FADE_FILL_ALPHA: f32 = 0.99;

/// One trail segment, from a particle's position to its next position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: [f32; 2],
    pub to: [f32; 2],
}

/// RGBA drawing surface backed by a tiny-skia pixmap.
#[derive(Debug, Clone)]
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> FlowResult<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            FlowError::render(format!("cannot create a {}x{} surface", width, height))
        })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Clear to fully transparent.
    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    /// Keep `0.99 * trail_age` of the existing alpha inside `bound`.
    pub fn fade(&mut self, bound: &CanvasBound, trail_age: f32) {
        let Some(rect) = Rect::from_xywh(
            bound.x as f32,
            bound.y as f32,
            bound.width as f32,
            bound.height as f32,
        ) else {
            return;
        };
        let alpha = (FADE_FILL_ALPHA * trail_age).clamp(0.0, 1.0);
        let mut paint = Paint::default();
        let fill =
            tiny_skia::Color::from_rgba(0.0, 0.0, 0.0, alpha).unwrap_or(tiny_skia::Color::BLACK);
        paint.set_color(fill);
        paint.blend_mode = BlendMode::DestinationIn;
        paint.anti_alias = false;
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    /// Stroke all segments as one path in `color`, blending additively.
    ///
    /// The colour's alpha is scaled by `opacity`; trails are stroked at the
    /// trail age so new segments start as translucent as the faded ones.
    /// Returns the number of segments added to the path.
    pub fn stroke_segments<I>(
        &mut self,
        color: Color,
        line_width: f32,
        opacity: f32,
        segments: I,
    ) -> usize
    where
        I: IntoIterator<Item = Segment>,
    {
        let mut pb = PathBuilder::new();
        let mut count = 0;
        for seg in segments {
            pb.move_to(seg.from[0], seg.from[1]);
            pb.line_to(seg.to[0], seg.to[1]);
            count += 1;
        }
        if count == 0 {
            return 0;
        }

        let mut paint = Paint::default();
        let alpha = (color.a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
        paint.set_color_rgba8(color.r, color.g, color.b, alpha);
        paint.blend_mode = BlendMode::Plus;
        paint.anti_alias = true;

        let stroke = Stroke {
            width: line_width,
            line_cap: LineCap::Butt,
            ..Stroke::default()
        };

        // A path of zero-length segments has no bounds and draws nothing.
        if let Some(path) = pb.finish() {
            self.pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
        count
    }

    /// Demultiplied RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Number of pixels with any opacity.
    pub fn painted_pixels(&self) -> usize {
        self.pixmap.pixels().iter().filter(|p| p.alpha() > 0).count()
    }

    /// Demultiplied RGBA bytes, row-major.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixmap.data().len());
        for p in self.pixmap.pixels() {
            let c = p.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    /// Encode the current contents as PNG.
    pub fn to_png(&self) -> FlowResult<Vec<u8>> {
        create_png(
            &self.to_rgba(),
            self.width() as usize,
            self.height() as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_bound(s: &Surface) -> CanvasBound {
        CanvasBound::build(
            [0.0, 0.0],
            [s.width() as f64, s.height() as f64],
            s.width(),
            s.height(),
        )
    }

    #[test]
    fn test_zero_size_surface_is_render_error() {
        assert!(matches!(Surface::new(0, 10), Err(FlowError::Render(_))));
    }

    #[test]
    fn test_stroke_then_fade() {
        let mut s = Surface::new(20, 20).unwrap();
        let drawn = s.stroke_segments(
            Color::rgb(255, 0, 0),
            2.0,
            1.0,
            [Segment {
                from: [2.0, 10.0],
                to: [18.0, 10.0],
            }],
        );
        assert_eq!(drawn, 1);
        let before = s.pixel(10, 10).unwrap();
        assert!(before[3] > 200);
        assert_eq!(before[0], 255);

        let bound = full_bound(&s);
        s.fade(&bound, 0.9);
        let after = s.pixel(10, 10).unwrap();
        assert!(after[3] < before[3]);
        assert!(after[3] > 0);
    }

    #[test]
    fn test_repeated_fade_dims_trails() {
        let mut s = Surface::new(16, 16).unwrap();
        s.stroke_segments(
            Color::rgb(0, 255, 0),
            1.0,
            1.0,
            [Segment {
                from: [0.0, 8.0],
                to: [16.0, 8.0],
            }],
        );
        let bound = full_bound(&s);
        let before = s.pixel(8, 8).unwrap()[3];
        for _ in 0..200 {
            s.fade(&bound, 0.9);
        }
        // 8-bit rounding can leave a faint residue, never a visible trail.
        let residue = s.to_rgba().chunks_exact(4).map(|p| p[3]).max().unwrap_or(0);
        assert!(residue <= 16, "residue alpha {}", residue);
        assert!(before > residue);
    }

    #[test]
    fn test_additive_blending_brightens() {
        let mut s = Surface::new(10, 10).unwrap();
        let seg = Segment {
            from: [0.0, 5.0],
            to: [10.0, 5.0],
        };
        s.stroke_segments(Color::rgba(100, 0, 0, 128), 2.0, 1.0, [seg]);
        let once = s.pixel(5, 5).unwrap();
        s.stroke_segments(Color::rgba(100, 0, 0, 128), 2.0, 1.0, [seg]);
        let twice = s.pixel(5, 5).unwrap();
        assert!(twice[3] > once[3]);
    }

    #[test]
    fn test_empty_stroke_draws_nothing() {
        let mut s = Surface::new(8, 8).unwrap();
        assert_eq!(s.stroke_segments(Color::rgb(1, 1, 1), 1.0, 1.0, []), 0);
        assert_eq!(s.painted_pixels(), 0);
    }

    #[test]
    fn test_stroke_opacity_scales_alpha() {
        let seg = Segment {
            from: [0.0, 5.0],
            to: [10.0, 5.0],
        };
        let mut full = Surface::new(10, 10).unwrap();
        full.stroke_segments(Color::rgb(0, 0, 255), 2.0, 1.0, [seg]);
        let mut faint = Surface::new(10, 10).unwrap();
        faint.stroke_segments(Color::rgb(0, 0, 255), 2.0, 0.5, [seg]);

        let full_alpha = full.pixel(5, 5).unwrap()[3] as i32;
        let faint_alpha = faint.pixel(5, 5).unwrap()[3] as i32;
        assert_eq!(full_alpha, 255);
        assert!((faint_alpha - 128).abs() <= 2, "alpha {}", faint_alpha);
        assert_eq!(faint.pixel(5, 5).unwrap()[2], 255);
    }
}
