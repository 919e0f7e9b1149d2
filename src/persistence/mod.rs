//! Scene snapshots for save/load
//!
//! Features:
//! - Versioned JSON envelope
//! - Per-particle observable state only (no pool bookkeeping)
//! - Optional save time and live controls
//! - Validation before anything is restored
//!
//! Where the JSON ends up (LocalStorage, a file) is up to the front end.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::{Lifecycle, Particle};
use crate::{Error, Result, Settings};

/// Current scene format version
pub const SCENE_VERSION: &str = "2.0";

/// Everything needed to rebuild one particle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub initial_radius: f32,
    pub primary_clock: f32,
    pub secondary_clock: f32,
    pub growing: bool,
    pub shrinking: bool,
    /// Exact lifecycle; scenes without it fall back to the two flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
}

impl From<&Particle> for ParticleSnapshot {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.pos,
            velocity: p.vel,
            radius: p.radius,
            initial_radius: p.initial_radius,
            primary_clock: p.primary_clock,
            secondary_clock: p.secondary_clock,
            growing: p.is_growing(),
            shrinking: p.is_shrinking(),
            lifecycle: Some(p.lifecycle),
        }
    }
}

impl ParticleSnapshot {
    /// Lifecycle to restore with. Shrink wins when only conflicting flags are stored.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
            .unwrap_or_else(|| Lifecycle::from_flags(self.growing, self.shrinking))
    }

    fn check(&self, index: usize) -> Result<()> {
        let finite = self.position.is_finite()
            && self.velocity.is_finite()
            && self.radius.is_finite()
            && self.initial_radius.is_finite()
            && self.primary_clock.is_finite()
            && self.secondary_clock.is_finite();
        if !finite {
            return Err(Error::InvalidScene(format!("particle {index} has non-finite state")));
        }
        if self.radius < 0.0 || self.initial_radius < 0.0 {
            return Err(Error::InvalidScene(format!("particle {index} has a negative radius")));
        }
        Ok(())
    }
}

/// A saved scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub version: String,
    /// Wall-clock save time (Unix ms), stamped by the front end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at_ms: Option<u64>,
    /// Controls active when the scene was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    pub particles: Vec<ParticleSnapshot>,
}

impl Scene {
    pub fn with_timestamp(mut self, saved_at_ms: u64) -> Self {
        self.saved_at_ms = Some(saved_at_ms);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let scene: Scene = serde_json::from_str(json)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != SCENE_VERSION {
            return Err(Error::UnsupportedSceneVersion(self.version.clone()));
        }
        for (i, particle) in self.particles.iter().enumerate() {
            particle.check(i)?;
        }
        Ok(())
    }
}
