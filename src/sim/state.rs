//! Simulation state
//!
//! Owns every particle (through the pool), the voice map, the RNG and the command
//! queue. Consumers only get read-only views or the per-tick [`Frame`](super::Frame).

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::particle::{Motion, Particle, ParticleId, SpawnParams};
use super::pool::{ParticlePool, PoolStats, VoicePool};
use super::preview::RadiusPreview;
use super::shape::NoiseField;
use crate::consts::*;
use crate::persistence::{ParticleSnapshot, SCENE_VERSION, Scene};
use crate::{Error, Result, Settings, Viewport};

/// Requests from the outside world, applied at the start of the next tick
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Spawn 1-10 particles around `base_radius` at a point
    Spawn { x: f32, y: f32, base_radius: f32 },
    /// Spawn `groups` batches at random points
    ScatterRandom { groups: u32 },
    /// Every particle starts shrinking
    ShrinkAll,
    /// Particles under the pointer flip growth or shrink
    PointerDrag,
    /// Release every particle and silence all voices
    Reset,
    /// The viewport changed size
    Resize { width: f32, height: f32 },
    /// New live controls; seed and pool sizes stay as created
    UpdateSettings(Settings),
    /// Remove one particle in this tick's death check
    Despawn { id: ParticleId },
    /// Mouse wheel over the radius preview
    ScrollPreview { delta: f32 },
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct SimState {
    pub(crate) settings: Settings,
    pub(crate) viewport: Viewport,
    /// Simulated time (ms)
    pub(crate) now_ms: f64,
    /// Ticks run so far
    pub(crate) time_ticks: u64,
    /// Brush radius under the pointer
    pub(crate) preview: RadiusPreview,
    pub(crate) pool: ParticlePool,
    pub(crate) voices: VoicePool,
    pub(crate) noise: NoiseField,
    pub(crate) rng: Pcg32,
    pending: Vec<Command>,
}

impl SimState {
    /// Create a simulation; settings are validated first
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            viewport: settings.viewport,
            now_ms: 0.0,
            time_ticks: 0,
            preview: RadiusPreview::default(),
            pool: ParticlePool::new(settings.initial_pool_size, settings.max_particles),
            voices: VoicePool::new(settings.voice_count, settings.base_frequency),
            noise: NoiseField::new(settings.seed as u32),
            rng: Pcg32::seed_from_u64(settings.seed),
            pending: Vec::new(),
            settings,
        })
    }

    /// Queue a command for the next tick
    pub fn queue(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn pending(&self) -> &[Command] {
        &self.pending
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    pub fn preview_radius(&self) -> f32 {
        self.preview.radius
    }

    pub fn particles(&self) -> &[Particle] {
        self.pool.active()
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.pool.get(id)
    }

    pub(crate) fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.pool.get_mut(id)
    }

    pub fn particle_count(&self) -> usize {
        self.pool.active_len()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn voice_for(&self, id: ParticleId) -> Option<usize> {
        self.voices.voice_for(id)
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    pub fn motion(&self) -> Motion {
        Motion {
            growth_step: self.settings.growth_step(),
            lifetime_multiplier: self.settings.lifetime_multiplier,
            roam_delay_ms: self.settings.roam_delay_ms,
        }
    }

    /// Randomised spawn parameters around a point
    fn roll_spawn(&mut self, pos: Vec2, base_radius: f32) -> SpawnParams {
        let speed = self.settings.spawn_speed();
        let radius = base_radius + self.rng.random_range(-SPAWN_RADIUS_JITTER..SPAWN_RADIUS_JITTER);
        SpawnParams {
            pos,
            vel: Vec2::new(
                self.rng.random_range(-speed..speed),
                self.rng.random_range(-speed..speed),
            ),
            radius: radius.max(0.0),
            primary_clock: self.rng.random_range(PRIMARY_CLOCK_MIN..PRIMARY_CLOCK_MAX),
        }
    }

    /// Put one particle into the active set and give it a voice
    pub(crate) fn insert_particle(&mut self, spawn: &SpawnParams) -> ParticleId {
        let acquired = self.pool.acquire(spawn, self.now_ms);
        if let Some(evicted) = acquired.evicted {
            self.voices.unassign(evicted);
        }
        self.voices.assign(acquired.id);
        acquired.id
    }

    /// Remove one particle and free its voice
    pub(crate) fn remove_particle(&mut self, id: ParticleId) -> bool {
        self.voices.unassign(id);
        self.pool.release(id)
    }

    /// Spawn a batch of 1-10 particles at a point; returns their ids
    pub(crate) fn spawn_batch(&mut self, x: f32, y: f32, base_radius: f32) -> Vec<ParticleId> {
        let count = self.rng.random_range(SPAWN_MIN..=SPAWN_MAX);
        let pos = Vec2::new(x, y);
        let ids: Vec<ParticleId> = (0..count)
            .map(|_| {
                let spawn = self.roll_spawn(pos, base_radius);
                self.insert_particle(&spawn)
            })
            .collect();
        log::debug!(
            "spawned {} particles at ({x:.0}, {y:.0}), total {}",
            ids.len(),
            self.pool.active_len()
        );
        ids
    }

    /// Apply one command immediately
    pub(crate) fn apply(&mut self, command: Command) {
        match command {
            Command::Spawn { x, y, base_radius } => {
                self.spawn_batch(x, y, base_radius);
            }
            Command::ScatterRandom { groups } => {
                for _ in 0..groups {
                    let x = self.rng.random_range(0.0..self.viewport.width);
                    let y = self.rng.random_range(0.0..self.viewport.height);
                    let base_radius = self.rng.random_range(100.0..300.0);
                    self.spawn_batch(x, y, base_radius);
                }
            }
            Command::ShrinkAll => {
                for particle in self.pool.active_mut() {
                    particle.start_shrinking();
                }
                log::info!("shrinking all particles");
            }
            Command::PointerDrag => {
                let rng = &mut self.rng;
                for particle in self.pool.active_mut() {
                    if particle.touching_pointer {
                        if rng.random_bool(0.2) {
                            particle.toggle_growing();
                        } else {
                            particle.toggle_shrinking();
                        }
                    }
                }
            }
            Command::Reset => self.reset(),
            Command::Resize { width, height } => {
                let mut next = self.settings.clone();
                next.viewport = Viewport::new(width, height);
                match self.update_settings(&next) {
                    Ok(()) => log::info!("viewport resized to {width}x{height}"),
                    Err(err) => log::warn!("ignoring resize: {err}"),
                }
            }
            Command::UpdateSettings(settings) => match self.update_settings(&settings) {
                Ok(()) => log::info!("settings updated"),
                Err(err) => log::warn!("ignoring settings update: {err}"),
            },
            Command::Despawn { id } => match self.pool.get_mut(id) {
                Some(particle) => particle.kill(),
                None => log::debug!("despawn of inactive particle {id:?} ignored"),
            },
            Command::ScrollPreview { delta } => {
                self.preview.scroll(delta, &self.viewport);
            }
        }
    }

    /// Take over `incoming`'s live controls if the result validates
    ///
    /// On error nothing changes.
    fn update_settings(&mut self, incoming: &Settings) -> Result<()> {
        let next = self.settings.with_controls_from(incoming);
        next.validate()?;
        if next.base_frequency != self.settings.base_frequency {
            self.voices.retune(next.base_frequency);
        }
        self.viewport = next.viewport;
        self.settings = next;
        Ok(())
    }

    /// Release every particle and silence all voices
    pub(crate) fn reset(&mut self) {
        let released = self.pool.clear();
        self.voices.silence_all();
        log::info!("reset: released {} particles", released.len());
    }

    /// Serializable view of every active particle
    pub fn snapshot(&self) -> Scene {
        Scene {
            version: SCENE_VERSION.to_string(),
            saved_at_ms: None,
            settings: Some(self.settings.clone()),
            particles: self.pool.active().iter().map(ParticleSnapshot::from).collect(),
        }
    }

    /// Replace every particle with the scene's and take over its saved controls
    ///
    /// The scene is validated first; on error the current state is untouched.
    pub fn restore(&mut self, scene: &Scene) -> Result<()> {
        scene.validate()?;
        if let Some(saved) = &scene.settings {
            self.settings.with_controls_from(saved).validate()?;
        }
        if scene.particles.len() > self.pool.max_size() {
            return Err(Error::InvalidScene(format!(
                "{} particles exceed the pool capacity of {}",
                scene.particles.len(),
                self.pool.max_size()
            )));
        }

        self.reset();
        if let Some(saved) = &scene.settings {
            self.update_settings(saved)?;
        }
        for snap in &scene.particles {
            let id = self.insert_particle(&SpawnParams {
                pos: snap.position,
                vel: snap.velocity,
                radius: snap.initial_radius,
                primary_clock: snap.primary_clock,
            });
            if let Some(particle) = self.pool.get_mut(id) {
                particle.radius = snap.radius;
                particle.secondary_clock = snap.secondary_clock;
                particle.lifecycle = snap.lifecycle();
            }
        }
        log::info!("restored scene with {} particles", scene.particles.len());
        Ok(())
    }
}
