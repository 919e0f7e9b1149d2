//! Fixed timestep simulation tick
//!
//! One call per animation frame. Order within a tick:
//! 1. queued commands (spawn, reset, ...) are applied
//! 2. collision index over every active particle, folded into the particles
//! 3. physics and lifecycle update
//! 4. audio mapping
//! 5. shape sampling
//! 6. dead particles are released back to the pool

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::audio_map::{AudioInput, AudioParams, map_audio};
use super::collision::CollisionIndex;
use super::particle::ParticleId;
use super::shape::{OutlineContext, ShapeFrame, background_alpha};
use super::state::SimState;
use crate::consts::SIM_DT;

/// External inputs for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Pointer position, if a pointer is over the viewport
    pub pointer: Option<Vec2>,
    /// Pointer held down (grows the radius preview)
    pub pressed: bool,
    /// Current output level per voice, as reported by the audio engine
    pub voice_amplitudes: Vec<f32>,
    /// Sum of all voice levels, as reported by the audio engine
    pub total_amplitude: f32,
}

impl TickInput {
    fn amplitude_of(&self, voice: Option<usize>) -> f32 {
        voice
            .and_then(|v| self.voice_amplitudes.get(v).copied())
            .filter(|a| a.is_finite())
            .unwrap_or(0.0)
    }
}

/// Voice update for one particle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceUpdate {
    pub particle: ParticleId,
    pub params: AudioParams,
}

/// Everything renderers and the audio engine need from one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    pub tick: u64,
    pub shapes: Vec<ShapeFrame>,
    pub audio: Vec<VoiceUpdate>,
    /// Fade every voice out before applying `audio`
    pub silence_all: bool,
    pub background_alpha: f32,
    pub preview_radius: f32,
    /// Particles released this tick
    pub removed: Vec<ParticleId>,
}

/// Advance the simulation by one fixed timestep
pub fn tick(state: &mut SimState, input: &TickInput) -> Frame {
    for command in state.take_pending() {
        state.apply(command);
    }

    state.time_ticks += 1;
    state.now_ms += SIM_DT as f64 * 1000.0;

    let viewport = state.viewport;
    let now_ms = state.now_ms;
    let motion = state.motion();

    // Every collision is known before any particle consumes it
    let index = CollisionIndex::compute(state.pool.active(), input.pointer);
    index.apply(state.pool.active_mut());

    for particle in state.pool.active_mut() {
        particle.update(&viewport, &motion, now_ms);
    }

    let base_frequency = state.settings.base_frequency;
    let mut audio = Vec::with_capacity(state.pool.active_len());
    for particle in state.pool.active().iter().filter(|p| !p.is_dead()) {
        let Some(voice) = state.voices.voice_for(particle.id) else {
            continue;
        };
        let params = map_audio(&AudioInput::from_particle(particle, viewport, voice), base_frequency);
        audio.push(VoiceUpdate {
            particle: particle.id,
            params,
        });
    }

    let count = state.pool.active_len();
    let ctx = OutlineContext {
        noise: &state.noise,
        viewport: &viewport,
        particle_count: count,
        frame: state.time_ticks,
    };
    let mut shapes = Vec::with_capacity(count);
    let mut faulted = Vec::new();
    for particle in state.pool.active().iter().filter(|p| !p.is_dead()) {
        let amplitude = input.amplitude_of(state.voices.voice_for(particle.id));
        let shape = ShapeFrame::build(&ctx, particle, amplitude);
        if shape.is_finite() {
            shapes.push(shape);
        } else {
            log::warn!("particle {:?} produced a non-finite outline, recycling", particle.id);
            faulted.push(particle.id);
        }
    }

    let mut removed: Vec<ParticleId> = state
        .pool
        .active()
        .iter()
        .filter(|p| p.is_dead())
        .map(|p| p.id)
        .collect();
    removed.extend(faulted);
    for id in &removed {
        state.remove_particle(*id);
    }
    audio.retain(|u| !removed.contains(&u.particle));

    let preview_radius = state.preview.update(input.pressed, &viewport, &mut state.rng);

    Frame {
        tick: state.time_ticks,
        shapes,
        audio,
        silence_all: state.voices.take_silence(),
        background_alpha: background_alpha(input.total_amplitude, count),
        preview_radius,
        removed,
    }
}
