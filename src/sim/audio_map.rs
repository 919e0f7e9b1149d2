//! Particle state to voice parameters
//!
//! Pure functions of a snapshot. No smoothing lives here; envelopes belong to the
//! audio engine.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::particle::Particle;
use crate::consts::*;
use crate::{Viewport, map_range};

/// Everything the mapping reads, copied out of a particle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioInput {
    pub radius: f32,
    pub position: Vec2,
    pub collision_count: usize,
    pub primary_clock: f32,
    pub touching_pointer: bool,
    pub viewport: Viewport,
    /// Stable voice assigned to the particle
    pub voice_index: usize,
}

impl AudioInput {
    pub fn from_particle(particle: &Particle, viewport: Viewport, voice_index: usize) -> Self {
        Self {
            radius: particle.radius,
            position: particle.pos,
            collision_count: particle.collisions.len(),
            primary_clock: particle.primary_clock,
            touching_pointer: particle.touching_pointer,
            viewport,
            voice_index,
        }
    }
}

/// Voice parameters for one particle this tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    pub voice_index: usize,
    pub frequency: f32,
    pub volume: f32,
    pub pan: f32,
    pub should_play: bool,
}

/// Every third fresh collision on a slow-clock particle, or a pointer touch
#[inline]
pub fn should_play(collision_count: usize, primary_clock: f32, touching_pointer: bool) -> bool {
    (collision_count % 3 == 1 && primary_clock > 160.0) || touching_pointer
}

/// Map one particle snapshot to voice parameters
pub fn map_audio(input: &AudioInput, base_frequency: f32) -> AudioParams {
    let radius_max = input.viewport.audio_radius_max();

    let freq_mod = map_range(input.radius, AUDIO_RADIUS_MIN, radius_max, 0.8, 1.5);
    let frequency = base_frequency * freq_mod + input.voice_index as f32 * VOICE_FREQUENCY_SPREAD;

    let mut volume = map_range(input.radius, AUDIO_RADIUS_MIN, radius_max, 0.1, 0.5);
    if input.touching_pointer {
        volume *= POINTER_VOLUME_BOOST;
    }

    let (pan_value, pan_span) = if input.viewport.is_landscape() {
        (input.position.x, input.viewport.width)
    } else {
        (input.position.y, input.viewport.height)
    };
    let pan = map_range(pan_value, 0.0, pan_span, -1.0, 1.0).clamp(-1.0, 1.0);

    AudioParams {
        voice_index: input.voice_index,
        frequency,
        volume,
        pan,
        should_play: should_play(
            input.collision_count,
            input.primary_clock,
            input.touching_pointer,
        ),
    }
}

/// Map a batch in order
pub fn map_batch(inputs: &[AudioInput], base_frequency: f32) -> Vec<AudioParams> {
    inputs.iter().map(|i| map_audio(i, base_frequency)).collect()
}
