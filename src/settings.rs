//! Simulation settings
//!
//! Read-only to the simulation. A front end owns persistence of these (a control
//! panel, LocalStorage, a JSON file next to the binary) and hands them in.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::{Error, Result, Viewport};

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Viewport the particles live in
    pub viewport: Viewport,
    /// RNG and noise seed
    pub seed: u64,

    // === Pools ===
    /// Maximum number of live particles (pool capacity)
    pub max_particles: usize,
    /// Particles pre-allocated when the pool is created
    pub initial_pool_size: usize,
    /// Number of audio voices
    pub voice_count: usize,

    // === Audio ===
    /// Base oscillator frequency (Hz)
    pub base_frequency: f32,
    /// Master output volume (0.0 - 1.0), forwarded to the audio engine
    pub master_volume: f32,
    /// Reverb send (0.0 - 1.0), forwarded to the audio engine
    pub reverb_amount: f32,

    // === Particles ===
    /// Scales the random initial velocity
    pub speed_multiplier: f32,
    /// Divides the shrink rate (2.0 = twice as long to fade out)
    pub lifetime_multiplier: f32,
    /// Scales the per-tick growth step
    pub growth_multiplier: f32,
    /// Age after which every particle starts roaming (ms)
    pub roam_delay_ms: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            seed: 0x0CEA_4100,

            max_particles: 40,
            initial_pool_size: 20,
            voice_count: 40,

            base_frequency: 200.0,
            master_volume: 0.3,
            reverb_amount: 0.5,

            speed_multiplier: 1.0,
            lifetime_multiplier: 1.0,
            growth_multiplier: 1.0,
            roam_delay_ms: ROAM_DELAY_MS,
        }
    }
}

impl Settings {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the simulation cannot run with
    pub fn validate(&self) -> Result<()> {
        let Viewport { width, height } = self.viewport;
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "viewport must be positive, got {width}x{height}"
            )));
        }
        // Audio maps radius over [50, (w+h)/3], that range must not be empty
        if self.viewport.audio_radius_max() <= AUDIO_RADIUS_MIN {
            return Err(Error::InvalidConfig(format!(
                "viewport {width}x{height} is too small"
            )));
        }
        if self.max_particles == 0 {
            return Err(Error::InvalidConfig("max_particles must be > 0".into()));
        }
        if self.initial_pool_size > self.max_particles {
            return Err(Error::InvalidConfig(format!(
                "initial_pool_size {} exceeds max_particles {}",
                self.initial_pool_size, self.max_particles
            )));
        }
        if self.voice_count == 0 {
            return Err(Error::InvalidConfig("voice_count must be > 0".into()));
        }
        for (name, value) in [
            ("base_frequency", self.base_frequency),
            ("speed_multiplier", self.speed_multiplier),
            ("lifetime_multiplier", self.lifetime_multiplier),
            ("growth_multiplier", self.growth_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !self.roam_delay_ms.is_finite() || self.roam_delay_ms < 0.0 {
            return Err(Error::InvalidConfig("roam_delay_ms must be >= 0".into()));
        }
        Ok(())
    }

    /// These settings with `other`'s live controls
    ///
    /// Seed, pool capacity and voice count size the running simulation and are kept
    /// from `self`. Everything else (viewport, audio, multipliers, roam delay) comes
    /// from `other`. The result is not validated.
    pub fn with_controls_from(&self, other: &Settings) -> Settings {
        Settings {
            viewport: other.viewport,
            base_frequency: other.base_frequency,
            master_volume: other.master_volume,
            reverb_amount: other.reverb_amount,
            speed_multiplier: other.speed_multiplier,
            lifetime_multiplier: other.lifetime_multiplier,
            growth_multiplier: other.growth_multiplier,
            roam_delay_ms: other.roam_delay_ms,
            ..self.clone()
        }
    }

    /// Per-tick growth step after the multiplier
    pub fn growth_step(&self) -> f32 {
        GROW_STEP * self.growth_multiplier
    }

    /// Largest initial velocity component after the multiplier
    pub fn spawn_speed(&self) -> f32 {
        SPAWN_SPEED * self.speed_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_particles, 40);
        assert_eq!(settings.voice_count, 40);
        assert_eq!(settings.base_frequency, 200.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings = Settings::from_json(r#"{ "max_particles": 12, "initial_pool_size": 4 }"#)
            .unwrap();
        assert_eq!(settings.max_particles, 12);
        assert_eq!(settings.initial_pool_size, 4);
        assert_eq!(settings.voice_count, 40);
    }

    #[test]
    fn test_roundtrip_json() {
        let mut settings = Settings::default();
        settings.speed_multiplier = 2.5;
        let json = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.initial_pool_size = settings.max_particles + 1;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

        let mut settings = Settings::default();
        settings.viewport = Viewport::new(60.0, 60.0);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.lifetime_multiplier = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.growth_multiplier = f32::NAN;
        assert!(settings.validate().is_err());

        assert!(matches!(Settings::from_json("{ nope"), Err(Error::Json(_))));
    }

    #[test]
    fn test_controls_merge_keeps_sizing() {
        let current = Settings::default();
        let mut incoming = Settings::default();
        incoming.seed = 7;
        incoming.max_particles = 5;
        incoming.voice_count = 3;
        incoming.speed_multiplier = 2.0;
        incoming.base_frequency = 330.0;
        incoming.viewport = Viewport::new(800.0, 600.0);

        let merged = current.with_controls_from(&incoming);
        assert_eq!(merged.seed, current.seed);
        assert_eq!(merged.max_particles, 40);
        assert_eq!(merged.voice_count, 40);
        assert_eq!(merged.speed_multiplier, 2.0);
        assert_eq!(merged.base_frequency, 330.0);
        assert_eq!(merged.viewport, Viewport::new(800.0, 600.0));
    }
}
