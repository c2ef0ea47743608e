//! Wind-speed colour scale for particle trails.

use std::fmt;
use std::str::FromStr;

use flow_common::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};

/// An sRGB colour with alpha.
///
/// Serialized in CSS notation; parses `rgb(r,g,b)`, `rgba(r,g,b,a)` with
/// `a` in `[0, 1]`, and `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
    Some(Color::rgb(r, g, b))
}

fn parse_functional(body: &str, with_alpha: bool) -> Option<Color> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }
    let channel = |s: &str| s.parse::<u8>().ok();
    let a = if with_alpha {
        let a: f32 = parts[3].parse().ok()?;
        if !(0.0..=1.0).contains(&a) {
            return None;
        }
        (a * 255.0).round() as u8
    } else {
        255
    };
    Some(Color::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        a,
    ))
}

impl FromStr for Color {
    type Err = FlowError;

    fn from_str(s: &str) -> FlowResult<Self> {
        let t = s.trim();
        let parsed = if let Some(hex) = t.strip_prefix('#') {
            parse_hex(hex)
        } else if let Some(body) = t.strip_prefix("rgba(").and_then(|b| b.strip_suffix(')')) {
            parse_functional(body, true)
        } else if let Some(body) = t.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            parse_functional(body, false)
        } else {
            None
        };
        parsed.ok_or_else(|| FlowError::config(format!("invalid colour '{}'", s)))
    }
}

impl TryFrom<String> for Color {
    type Error = FlowError;

    fn try_from(s: String) -> FlowResult<Self> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "rgb({},{},{})", self.r, self.g, self.b)
        } else {
            let a = self.a as f32 / 255.0;
            write!(f, "rgba({},{},{},{:.3})", self.r, self.g, self.b, a)
        }
    }
}

/// Blue to red ramp used when no colours are configured.
pub const DEFAULT_COLORS: [Color; 15] = [
    Color::rgb(36, 104, 180),
    Color::rgb(60, 157, 194),
    Color::rgb(128, 205, 193),
    Color::rgb(151, 218, 168),
    Color::rgb(198, 231, 181),
    Color::rgb(238, 247, 217),
    Color::rgb(255, 238, 159),
    Color::rgb(252, 217, 125),
    Color::rgb(255, 182, 100),
    Color::rgb(252, 150, 75),
    Color::rgb(250, 112, 52),
    Color::rgb(245, 64, 32),
    Color::rgb(237, 45, 28),
    Color::rgb(220, 24, 32),
    Color::rgb(180, 0, 35),
];

/// Ordered colours plus the velocity range they span.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    colors: Vec<Color>,
    min_velocity: f64,
    max_velocity: f64,
}

impl ColorScale {
    pub fn new(colors: Vec<Color>, min_velocity: f64, max_velocity: f64) -> FlowResult<Self> {
        if colors.is_empty() {
            return Err(FlowError::config("colour scale needs at least one colour"));
        }
        if !(max_velocity > min_velocity) {
            return Err(FlowError::config(format!(
                "max velocity {} must exceed min velocity {}",
                max_velocity, min_velocity
            )));
        }
        Ok(Self {
            colors,
            min_velocity,
            max_velocity,
        })
    }

    /// Bucket index for a wind speed: the speed is clamped to the velocity
    /// range and mapped linearly onto `[0, len - 1]`.
    pub fn index_for(&self, magnitude: f32) -> usize {
        let last = (self.colors.len() - 1) as f64;
        let t = (magnitude as f64 - self.min_velocity) / (self.max_velocity - self.min_velocity);
        let idx = (t * last).round();
        if idx.is_nan() {
            return 0;
        }
        idx.clamp(0.0, last) as usize
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS.to_vec(),
            min_velocity: 0.0,
            max_velocity: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notations() {
        assert_eq!("rgb(36,104,180)".parse::<Color>().unwrap(), Color::rgb(36, 104, 180));
        assert_eq!("rgba(0, 0, 0, 0.5)".parse::<Color>().unwrap(), Color::rgba(0, 0, 0, 128));
        assert_eq!("#FF8000".parse::<Color>().unwrap(), Color::rgb(255, 128, 0));
        assert!("#GGGGGG".parse::<Color>().is_err());
        assert!("rgb(300,0,0)".parse::<Color>().is_err());
        assert!("red".parse::<Color>().is_err());
    }

    #[test]
    fn test_serde_as_css_string() {
        let json = serde_json::to_string(&Color::rgb(1, 2, 3)).unwrap();
        assert_eq!(json, "\"rgb(1,2,3)\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(1, 2, 3));
        assert!(serde_json::from_str::<Color>("\"nope\"").is_err());
    }

    #[test]
    fn test_index_for_clamps() {
        let scale = ColorScale::default();
        assert_eq!(scale.index_for(-5.0), 0);
        assert_eq!(scale.index_for(0.0), 0);
        assert_eq!(scale.index_for(5.0), 7);
        assert_eq!(scale.index_for(10.0), 14);
        assert_eq!(scale.index_for(99.0), 14);
        assert_eq!(scale.index_for(f32::NAN), 0);
    }

    #[test]
    fn test_new_rejects_bad_ranges() {
        assert!(ColorScale::new(vec![], 0.0, 10.0).is_err());
        assert!(ColorScale::new(DEFAULT_COLORS.to_vec(), 10.0, 10.0).is_err());
        assert!(ColorScale::new(vec![Color::rgb(0, 0, 0)], 0.0, 1.0).is_ok());
    }
}
