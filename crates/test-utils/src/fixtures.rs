//! Common test fixtures for the wind flow tests.
//!
//! Viewports and reference times that show up across the suite.

use flow_common::Viewport;

/// Common viewports, as a host map would report them.
pub mod viewports {
    use super::Viewport;

    /// Western Europe at zoom 4.
    pub fn europe() -> Viewport {
        Viewport::new(800, 600, [-10.0, 35.0], [30.0, 60.0], 4.0)
    }

    /// A small surface, cheap enough to build a field for in unit tests.
    pub fn small() -> Viewport {
        Viewport::new(64, 48, [0.0, 40.0], [16.0, 52.0], 6.0)
    }

    /// Whole world between the Mercator-safe latitudes.
    pub fn world() -> Viewport {
        Viewport::new(720, 600, [-180.0, -80.0], [180.0, 80.0], 1.0)
    }

    /// Pacific view straddling the antimeridian (east longitude > 180).
    pub fn pacific() -> Viewport {
        Viewport::new(400, 300, [160.0, -30.0], [220.0, 30.0], 3.0)
    }
}

/// Common reference times.
pub mod time {
    /// A fixed reference time for tests (2024-01-15T00:00:00Z)
    pub const REFERENCE_TIME: &str = "2024-01-15T00:00:00Z";

    /// Three hours after `REFERENCE_TIME`.
    pub const PLUS_3H: &str = "2024-01-15T03:00:00Z";

    /// Nine hours after `REFERENCE_TIME`.
    pub const PLUS_9H: &str = "2024-01-15T09:00:00Z";

    /// Dataset keys in compact dtg form matching the times above.
    pub const DTG_KEYS: [&str; 3] = ["202401150000", "202401150300", "202401150900"];
}
