//! Particle state.

use rand::Rng;
use renderer::VectorField;

/// One advected point.
///
/// `(x, y)` is where the particle is drawn from; `(xt, yt)` is the target of
/// the pending trail segment and only becomes the position once the segment
/// is drawn. `(ox, oy)` remembers the spawn point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub xt: f64,
    pub yt: f64,
    pub age: u32,
    pub ox: f64,
    pub oy: f64,
}

impl Particle {
    /// New particle at a random point of the field with the given age.
    pub fn spawn<R: Rng + ?Sized>(field: &VectorField, rng: &mut R, age: u32) -> Self {
        let mut particle = Self {
            age,
            ..Self::default()
        };
        particle.respawn(field, rng);
        particle.age = age;
        particle
    }

    /// Move to a fresh random point and reset the age.
    pub fn respawn<R: Rng + ?Sized>(&mut self, field: &VectorField, rng: &mut R) {
        let (x, y) = field.randomize(rng);
        self.x = x;
        self.y = y;
        self.xt = x;
        self.yt = y;
        self.ox = x;
        self.oy = y;
        self.age = 0;
    }

    /// Commit the pending segment.
    pub fn advance(&mut self) {
        self.x = self.xt;
        self.y = self.yt;
    }
}
