//! Deterministic simulation module
//!
//! All particle logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG and seeded noise only
//! - Stable iteration order (pool acquisition order)
//! - No rendering or audio dependencies

pub mod audio_map;
pub mod collision;
pub mod particle;
pub mod pool;
pub mod preview;
pub mod shape;
pub mod state;
pub mod tick;

pub use audio_map::{AudioInput, AudioParams, map_audio, map_batch, should_play};
pub use collision::{CollisionIndex, Contact, circles_overlap};
pub use particle::{Lifecycle, Motion, Particle, ParticleId, SpawnParams};
pub use pool::{Acquired, Envelope, ParticlePool, PoolStats, Voice, VoicePool, Waveform};
pub use preview::RadiusPreview;
pub use shape::{NoiseField, ShapeFrame, ShapeInput, ShapeMode, StrokeStyle, sample_shape};
pub use state::{Command, SimState};
pub use tick::{Frame, TickInput, VoiceUpdate, tick};
