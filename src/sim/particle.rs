//! The particle ("loop"): physical state and lifecycle
//!
//! A particle grows, holds, shrinks and dies. Position, velocity and radius are
//! advanced once per tick by [`Particle::update`]; collisions are accumulated into
//! it by the collision pass that runs before.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::Viewport;
use crate::consts::*;

/// Stable particle identity. A recycled particle gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub u32);

/// Lifecycle state
///
/// Growing and shrinking are exclusive. `Dying` is entered when the particle leaves
/// the viewport, outgrows the size cap or goes non-finite, and never leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Steady,
    Growing,
    Shrinking,
    Dying,
}

impl Lifecycle {
    pub fn is_growing(self) -> bool {
        self == Lifecycle::Growing
    }

    pub fn is_shrinking(self) -> bool {
        matches!(self, Lifecycle::Shrinking | Lifecycle::Dying)
    }

    /// Build from the two persisted flags. Shrink wins when both are set.
    pub fn from_flags(growing: bool, shrinking: bool) -> Self {
        match (growing, shrinking) {
            (_, true) => Lifecycle::Shrinking,
            (true, false) => Lifecycle::Growing,
            (false, false) => Lifecycle::Steady,
        }
    }
}

/// Values a freshly acquired particle starts from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnParams {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub primary_clock: f32,
}

/// Per-tick physics tuning, derived from settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub growth_step: f32,
    pub lifetime_multiplier: f32,
    pub roam_delay_ms: f64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            growth_step: GROW_STEP,
            lifetime_multiplier: 1.0,
            roam_delay_ms: ROAM_DELAY_MS,
        }
    }
}

/// A particle entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub initial_radius: f32,
    pub lifecycle: Lifecycle,
    /// Fixed at birth, in [140, 240)
    pub primary_clock: f32,
    /// Starts at the primary clock and creeps upward every tick
    pub secondary_clock: f32,
    /// Particles this one has overlapped since it last shrank (insertion order, unique)
    pub collisions: Vec<ParticleId>,
    /// Pointer inside the radius this tick
    pub touching_pointer: bool,
    /// Simulation time of (re)birth
    pub birth_ms: f64,
}

impl Particle {
    /// A blank particle for pool pre-allocation
    pub fn new(id: ParticleId) -> Self {
        Self {
            id,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: 100.0,
            initial_radius: 100.0,
            lifecycle: Lifecycle::Steady,
            primary_clock: PRIMARY_CLOCK_MIN,
            secondary_clock: PRIMARY_CLOCK_MIN,
            collisions: Vec::new(),
            touching_pointer: false,
            birth_ms: 0.0,
        }
    }

    /// Reinitialise for reuse under a new identity
    pub fn reset(&mut self, id: ParticleId, spawn: &SpawnParams, now_ms: f64) {
        self.id = id;
        self.pos = spawn.pos;
        self.vel = spawn.vel;
        self.radius = spawn.radius.max(0.0);
        self.initial_radius = self.radius;
        self.lifecycle = Lifecycle::Steady;
        self.primary_clock = spawn.primary_clock;
        self.secondary_clock = spawn.primary_clock;
        self.collisions.clear();
        self.touching_pointer = false;
        self.birth_ms = now_ms;
    }

    /// Drop transient state before going back to the pool
    pub fn clean(&mut self) {
        self.collisions.clear();
        self.touching_pointer = false;
        self.lifecycle = Lifecycle::Steady;
    }

    pub fn age_ms(&self, now_ms: f64) -> f64 {
        now_ms - self.birth_ms
    }

    pub fn is_growing(&self) -> bool {
        self.lifecycle.is_growing()
    }

    pub fn is_shrinking(&self) -> bool {
        self.lifecycle.is_shrinking()
    }

    /// Dead particles must leave the active set this tick
    pub fn is_dead(&self) -> bool {
        self.radius.is_nan() || self.radius < DEATH_RADIUS
    }

    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite() && self.radius.is_finite()
    }

    /// Enter the terminal shrinking state
    pub fn force_dying(&mut self) {
        self.lifecycle = Lifecycle::Dying;
    }

    /// Start shrinking unless already on the way out
    pub fn start_shrinking(&mut self) {
        if self.lifecycle != Lifecycle::Dying {
            self.lifecycle = Lifecycle::Shrinking;
        }
    }

    /// Flip growth on or off. A shrinking particle switches to growing.
    pub fn toggle_growing(&mut self) {
        self.lifecycle = match self.lifecycle {
            Lifecycle::Growing => Lifecycle::Steady,
            Lifecycle::Steady | Lifecycle::Shrinking => Lifecycle::Growing,
            Lifecycle::Dying => Lifecycle::Dying,
        };
    }

    /// Flip shrinking on or off. A growing particle switches to shrinking.
    pub fn toggle_shrinking(&mut self) {
        self.lifecycle = match self.lifecycle {
            Lifecycle::Shrinking => Lifecycle::Steady,
            Lifecycle::Steady | Lifecycle::Growing => Lifecycle::Shrinking,
            Lifecycle::Dying => Lifecycle::Dying,
        };
    }

    /// Whether the particle translates this tick
    pub fn can_move(&self, now_ms: f64, roam_delay_ms: f64) -> bool {
        self.primary_clock < FAST_CLOCK
            || self.collisions.len() > ROAM_COLLISIONS
            || self.age_ms(now_ms) > roam_delay_ms
    }

    /// Per-tick secondary clock advance (one increment per outline step)
    pub fn secondary_clock_rate(&self) -> f32 {
        super::shape::outline_steps() as f32 * SECONDARY_CLOCK_RATE * self.primary_clock / 200.0
    }

    /// Advance one tick: bounds, size cap, shrink, grow, motion, clocks
    pub fn update(&mut self, viewport: &Viewport, motion: &Motion, now_ms: f64) {
        if !viewport.contains(self.pos) {
            self.force_dying();
        }

        if self.radius > viewport.size_cap() {
            self.force_dying();
        }

        if self.is_shrinking() {
            self.collisions.clear();
            self.touching_pointer = false;
            if self.radius > SHRINK_FLOOR {
                let decay = self.primary_clock / SHRINK_CLOCK_DIVISOR / motion.lifetime_multiplier;
                self.radius = (self.radius - decay).max(0.0);
            } else {
                self.radius = 0.0;
            }
        }

        if self.is_growing() {
            self.radius += motion.growth_step;
        }

        if self.can_move(now_ms, motion.roam_delay_ms) {
            self.pos += self.vel;
        }

        self.secondary_clock += self.secondary_clock_rate();

        if !self.is_finite() || !self.secondary_clock.is_finite() {
            log::warn!("particle {:?} went non-finite, recycling", self.id);
            self.recycle_fault();
        }
    }

    /// Mark dead so the next death check removes it
    pub fn kill(&mut self) {
        self.radius = 0.0;
        self.force_dying();
        self.collisions.clear();
        self.touching_pointer = false;
    }

    /// Mark dead after a numeric fault
    pub fn recycle_fault(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(pos: Vec2, radius: f32, primary_clock: f32) -> Particle {
        let mut p = Particle::new(ParticleId(1));
        p.reset(
            ParticleId(1),
            &SpawnParams {
                pos,
                vel: Vec2::new(1.0, -2.0),
                radius,
                primary_clock,
            },
            0.0,
        );
        p
    }

    fn viewport() -> Viewport {
        Viewport::new(800.0, 600.0)
    }

    #[test]
    fn test_fast_clock_moves_immediately() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 100.0, 150.0);
        p.update(&viewport(), &Motion::default(), 100.0);
        assert_eq!(p.pos, Vec2::new(401.0, 298.0));
    }

    #[test]
    fn test_slow_clock_waits_for_roam_delay() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 100.0, 200.0);
        p.update(&viewport(), &Motion::default(), 100.0);
        assert_eq!(p.pos, Vec2::new(400.0, 300.0));

        p.update(&viewport(), &Motion::default(), 7001.0);
        assert_eq!(p.pos, Vec2::new(401.0, 298.0));
    }

    #[test]
    fn test_many_collisions_start_roaming() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 100.0, 200.0);
        p.collisions = (10..24).map(ParticleId).collect();
        p.update(&viewport(), &Motion::default(), 100.0);
        assert_eq!(p.pos, Vec2::new(401.0, 298.0));
    }

    #[test]
    fn test_out_of_bounds_is_sticky_dying() {
        let mut p = spawn(Vec2::new(-10.0, 300.0), 100.0, 200.0);
        p.update(&viewport(), &Motion::default(), 0.0);
        assert_eq!(p.lifecycle, Lifecycle::Dying);

        p.pos = Vec2::new(400.0, 300.0);
        p.toggle_shrinking();
        p.update(&viewport(), &Motion::default(), 0.0);
        assert_eq!(p.lifecycle, Lifecycle::Dying);
    }

    #[test]
    fn test_size_cap_forces_shrink() {
        let vp = viewport();
        let mut p = spawn(Vec2::new(400.0, 300.0), vp.size_cap() + 1.0, 180.0);
        p.update(&vp, &Motion::default(), 0.0);
        assert!(p.is_shrinking());
        assert!((p.radius - (vp.size_cap() + 1.0 - 1.0)).abs() < 1e-3);
    }

    #[test]
    fn test_shrink_clears_collisions_and_decays_by_clock() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 10.0, 225.0);
        p.collisions = vec![ParticleId(7), ParticleId(8)];
        p.touching_pointer = true;
        p.start_shrinking();
        p.update(&viewport(), &Motion::default(), 0.0);
        assert!(p.collisions.is_empty());
        assert!(!p.touching_pointer);
        assert!((p.radius - (10.0 - 225.0 / 180.0)).abs() < 1e-5);
    }

    #[test]
    fn test_lifetime_multiplier_slows_decay() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 10.0, 180.0);
        p.start_shrinking();
        let motion = Motion {
            lifetime_multiplier: 2.0,
            ..Motion::default()
        };
        p.update(&viewport(), &motion, 0.0);
        assert!((p.radius - 9.5).abs() < 1e-5);
    }

    #[test]
    fn test_shrinking_always_reaches_death() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 30.0, 140.0);
        p.start_shrinking();
        for _ in 0..1000 {
            p.update(&viewport(), &Motion::default(), 0.0);
            assert!(p.radius >= 0.0);
            if p.is_dead() {
                break;
            }
        }
        assert!(p.is_dead());
    }

    #[test]
    fn test_growing_adds_step() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 100.0, 200.0);
        p.toggle_growing();
        p.update(&viewport(), &Motion::default(), 0.0);
        assert!((p.radius - 103.0).abs() < 1e-5);
    }

    #[test]
    fn test_toggles_are_exclusive() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 100.0, 200.0);
        p.toggle_growing();
        p.toggle_shrinking();
        assert_eq!(p.lifecycle, Lifecycle::Shrinking);
        p.toggle_growing();
        assert_eq!(p.lifecycle, Lifecycle::Growing);
        p.toggle_growing();
        assert_eq!(p.lifecycle, Lifecycle::Steady);
        p.force_dying();
        p.toggle_growing();
        assert_eq!(p.lifecycle, Lifecycle::Dying);
    }

    #[test]
    fn test_from_flags_shrink_dominates() {
        assert_eq!(Lifecycle::from_flags(true, true), Lifecycle::Shrinking);
        assert_eq!(Lifecycle::from_flags(true, false), Lifecycle::Growing);
        assert_eq!(Lifecycle::from_flags(false, false), Lifecycle::Steady);
    }

    #[test]
    fn test_non_finite_is_recycled() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 100.0, 150.0);
        p.vel = Vec2::new(f32::NAN, 0.0);
        p.update(&viewport(), &Motion::default(), 0.0);
        assert!(p.is_dead());
        assert_eq!(p.radius, 0.0);
    }

    #[test]
    fn test_secondary_clock_advances() {
        let mut p = spawn(Vec2::new(400.0, 300.0), 100.0, 200.0);
        let before = p.secondary_clock;
        p.update(&viewport(), &Motion::default(), 0.0);
        assert!(p.secondary_clock > before);
        assert_eq!(p.primary_clock, 200.0);
    }
}
