//! Ocean Loop - particle simulation core for a generative audio-visual toy
//!
//! Core modules:
//! - `sim`: Deterministic simulation (particles, shapes, collisions, audio mapping, pools)
//! - `settings`: Configuration read by the simulation
//! - `persistence`: Scene snapshots for save/load
//! - `audio_worker`: Off-thread audio parameter mapping
//!
//! The core never draws or makes sound. Each tick produces a [`sim::Frame`] that an
//! external renderer and synthesizer consume.

#[cfg(not(target_arch = "wasm32"))]
pub mod audio_worker;
pub mod error;
pub mod persistence;
pub mod settings;
pub mod sim;

pub use error::{Error, Result};
pub use settings::Settings;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Simulation tuning constants
pub mod consts {
    /// Fixed simulation timestep (the toy runs at 30 frames per second)
    pub const SIM_DT: f32 = 1.0 / 30.0;

    /// Radius below which a particle is dead
    pub const DEATH_RADIUS: f32 = 0.5;
    /// Shrinking only subtracts while the radius is above this floor
    pub const SHRINK_FLOOR: f32 = 0.9;
    /// Divisor applied to the primary clock to get the shrink rate
    pub const SHRINK_CLOCK_DIVISOR: f32 = 180.0;
    /// Radius added per tick while growing
    pub const GROW_STEP: f32 = 3.0;
    /// Margin subtracted from (w+h)/3 to get the size cap
    pub const SIZE_CAP_MARGIN: f32 = 50.0;

    /// Primary clock range, sampled once per particle
    pub const PRIMARY_CLOCK_MIN: f32 = 140.0;
    pub const PRIMARY_CLOCK_MAX: f32 = 240.0;
    /// Particles with a primary clock below this roam from birth
    pub const FAST_CLOCK: f32 = 170.0;
    /// Particles with more collisions than this start roaming
    pub const ROAM_COLLISIONS: usize = 13;
    /// Age after which every particle roams (ms)
    pub const ROAM_DELAY_MS: f64 = 7000.0;

    /// Collisions closer than this are treated as coincident and ignored
    pub const MIN_COLLISION_DISTANCE: f32 = 5.0;

    /// Angular resolution of the procedural outline
    pub const SHAPE_ANGLE_STEP: f32 = 0.07;
    /// Secondary clock advance per outline step, scaled by primary/200
    pub const SECONDARY_CLOCK_RATE: f32 = 0.0002;
    /// Clamp for tan() in the tangent shape mode
    pub const TAN_LIMIT: f32 = 50.0;
    /// Largest magnitude a single shape offset may take
    pub const MAX_SHAPE_OFFSET: f32 = 10_000.0;

    /// Spawn batch size range (inclusive)
    pub const SPAWN_MIN: u32 = 1;
    pub const SPAWN_MAX: u32 = 10;
    /// Per-particle radius jitter around the requested base radius
    pub const SPAWN_RADIUS_JITTER: f32 = 20.0;
    /// Initial velocity component range at speed multiplier 1.0
    pub const SPAWN_SPEED: f32 = 3.0;

    /// Radius at which audio mapping starts (lower end of the lerp)
    pub const AUDIO_RADIUS_MIN: f32 = 50.0;
    /// Frequency spread added per voice index (Hz)
    pub const VOICE_FREQUENCY_SPREAD: f32 = 30.0;
    /// Volume multiplier while the pointer touches the particle
    pub const POINTER_VOLUME_BOOST: f32 = 1.5;
}

/// The rectangle particles live in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Strict containment, the edges themselves count as outside
    #[inline]
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x > 0.0 && pos.x < self.width && pos.y > 0.0 && pos.y < self.height
    }

    /// (w + h) / 3, the upper end of the audio radius mapping
    #[inline]
    pub fn audio_radius_max(&self) -> f32 {
        (self.width + self.height) / 3.0
    }

    /// Radius above which a particle is forced to shrink
    #[inline]
    pub fn size_cap(&self) -> f32 {
        self.audio_radius_max() - consts::SIZE_CAP_MARGIN
    }

    #[inline]
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Linearly remap `value` from [in_min, in_max] to [out_min, out_max] (no clamping)
#[inline]
pub fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let span = in_max - in_min;
    if span == 0.0 {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / span + out_min
}

/// Rotate a 2D offset by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_range() {
        assert!((map_range(50.0, 50.0, 150.0, 0.8, 1.5) - 0.8).abs() < 1e-6);
        assert!((map_range(150.0, 50.0, 150.0, 0.8, 1.5) - 1.5).abs() < 1e-6);
        assert!((map_range(100.0, 0.0, 200.0, -1.0, 1.0)).abs() < 1e-6);
        // Unclamped past the input range
        assert!(map_range(250.0, 50.0, 150.0, 0.0, 1.0) > 1.0);
        // Degenerate span
        assert_eq!(map_range(3.0, 1.0, 1.0, 7.0, 9.0), 7.0);
    }

    #[test]
    fn test_viewport_bounds() {
        let vp = Viewport::new(800.0, 600.0);
        assert!(vp.contains(Vec2::new(1.0, 1.0)));
        assert!(!vp.contains(Vec2::new(0.0, 300.0)));
        assert!(!vp.contains(Vec2::new(800.0, 300.0)));
        assert!(!vp.contains(Vec2::new(400.0, -1.0)));
        assert!(vp.is_landscape());
        assert!((vp.size_cap() - (1400.0 / 3.0 - 50.0)).abs() < 1e-4);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = rotate(Vec2::X, std::f32::consts::FRAC_PI_2);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
    }
}
