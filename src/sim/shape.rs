//! Procedural shape sampling
//!
//! Each particle draws an outline from one of six formulas. The formula is chosen by
//! the particle's primary clock and the current particle count, and is evaluated at
//! every `SHAPE_ANGLE_STEP` around the circle. Noise comes from a seeded coherent
//! field so the shapes flow instead of jittering.

use std::f32::consts::TAU;

use glam::Vec2;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use super::audio_map::should_play;
use super::particle::Particle;
use crate::consts::*;
use crate::{Viewport, map_range, rotate};

/// Seeded coherent noise in [0, 1]
#[derive(Debug, Clone)]
pub struct NoiseField {
    perlin: Perlin,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
        }
    }

    #[inline]
    pub fn sample1(&self, x: f32) -> f32 {
        self.sample2(x, 0.0)
    }

    #[inline]
    pub fn sample2(&self, x: f32, y: f32) -> f32 {
        let v = self.perlin.get([x as f64, y as f64]);
        ((v * 0.5 + 0.5) as f32).clamp(0.0, 1.0)
    }
}

/// The six outline formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeMode {
    /// Rotating sine-modulated circle, driven by the audio amplitude
    SpinningSine,
    /// Noise blended with radius, long thin spikes
    NoiseAntenna,
    /// Noise-scaled sine, dots and lines
    NoiseDots,
    /// Pure noise modulation
    PureNoise,
    /// Squared-radius noise term
    ComplexNoise,
    /// tan() of the secondary clock; clamped near its poles
    Tangent,
}

impl ShapeMode {
    /// floor(primary + count / 2) mod 6
    pub fn select(primary_clock: f32, particle_count: usize) -> Self {
        let index = (primary_clock + particle_count as f32 / 2.0).floor() as i64;
        match index.rem_euclid(6) {
            0 => ShapeMode::SpinningSine,
            1 => ShapeMode::NoiseAntenna,
            2 => ShapeMode::NoiseDots,
            3 => ShapeMode::PureNoise,
            4 => ShapeMode::ComplexNoise,
            _ => ShapeMode::Tangent,
        }
    }
}

/// Inputs to one shape sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeInput {
    pub radius: f32,
    pub angle: f32,
    pub primary_clock: f32,
    pub secondary_clock: f32,
    pub particle_count: usize,
    pub amplitude: f32,
    /// Frame counter; animates modes 0, 2 and 3
    pub frame: u64,
}

/// Number of outline steps per revolution
pub fn outline_steps() -> usize {
    (TAU / SHAPE_ANGLE_STEP).ceil() as usize
}

/// Angles sampled around one outline, starting at 0
pub fn outline_angles() -> impl Iterator<Item = f32> {
    (0..outline_steps()).map(|i| i as f32 * SHAPE_ANGLE_STEP)
}

/// tan(secondary + 1), clamped to ±TAN_LIMIT. The bool is set when clamping kicked in.
pub fn clamped_tangent(secondary_clock: f32) -> (f32, bool) {
    let t = (secondary_clock + 1.0).tan();
    if !t.is_finite() {
        return (0.0, true);
    }
    if t.abs() > TAN_LIMIT {
        (t.signum() * TAN_LIMIT, true)
    } else {
        (t, false)
    }
}

/// Outline offset for one angle. Pure; always finite.
pub fn sample_shape(noise: &NoiseField, input: &ShapeInput) -> f32 {
    let ShapeInput {
        radius: r,
        angle: a,
        primary_clock: primary,
        secondary_clock: clock,
        particle_count,
        amplitude,
        frame,
    } = *input;
    let count = particle_count as f32;
    let frame = frame as f32;

    let value = match ShapeMode::select(primary, particle_count) {
        ShapeMode::SpinningSine => {
            a / TAU * primary / 5.0
                + r * (frame / (800.0 * amplitude + 1.0) * count + clock).sin() * a.cos()
        }
        ShapeMode::NoiseAntenna => {
            a / TAU * primary / 5.0
                * r
                * noise.sample2(clock / 500.0, a / 50.0)
                * noise.sample1(a / 50.0)
        }
        ShapeMode::NoiseDots => {
            a / TAU * primary / 6.0
                + noise.sample1(clock / 5.0) * r * (frame / primary + clock).sin() * a.cos()
        }
        ShapeMode::PureNoise => noise.sample1(a) * r * (frame / 40.0 + clock).sin() * a.cos(),
        ShapeMode::ComplexNoise => {
            noise.sample2(a, clock) * (r / 2.0).powi(2) * (clock / 1000.0).cos() * a
        }
        ShapeMode::Tangent => {
            let (tan, _) = clamped_tangent(clock);
            noise.sample2(a.sin(), a.cos()) * (r / 4.0) * a.powi(2) * tan
        }
    };

    if value.is_finite() {
        value.clamp(-MAX_SHAPE_OFFSET, MAX_SHAPE_OFFSET)
    } else {
        0.0
    }
}

/// How the renderer should stroke a particle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Drawn in shifting colours instead of white
    pub highlighted: bool,
    /// Stroke alpha (0-255 scale, may overshoot)
    pub intensity: f32,
    /// Point size before the display's pixel density
    pub weight: f32,
    /// Faint fill for small particles
    pub filled: bool,
}

impl StrokeStyle {
    pub fn for_particle(particle: &Particle, amplitude: f32, viewport: &Viewport) -> Self {
        let primary = particle.primary_clock;
        let highlighted = should_play(
            particle.collisions.len(),
            primary,
            particle.touching_pointer,
        );
        let intensity = if highlighted {
            primary / 1.5 + 30.0 + amplitude * 150.0
        } else if particle.is_shrinking() {
            primary / 10.0 + 30.0
        } else {
            particle.radius / 2.0 + amplitude * 150.0 + 20.0
        };
        let weight = 1.5 / 1000.0 * (viewport.width + viewport.height) / 2.0 * primary / 255.0
            * map_range(primary, PRIMARY_CLOCK_MIN, PRIMARY_CLOCK_MAX, 0.7, 1.3);

        Self {
            highlighted,
            intensity,
            weight,
            filled: particle.radius < viewport.width / 6.0,
        }
    }
}

/// One particle's drawable contribution for a frame, offsets relative to `center`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeFrame {
    pub center: Vec2,
    pub mode: ShapeMode,
    pub points: Vec<Vec2>,
    pub vertices: Vec<Vec2>,
    pub stroke: StrokeStyle,
}

/// Context shared by every outline built in one tick
#[derive(Debug, Clone, Copy)]
pub struct OutlineContext<'a> {
    pub noise: &'a NoiseField,
    pub viewport: &'a Viewport,
    pub particle_count: usize,
    pub frame: u64,
}

impl ShapeFrame {
    /// Walk the outline once and collect points, vertices and stroke
    pub fn build(ctx: &OutlineContext<'_>, particle: &Particle, amplitude: f32) -> Self {
        let noise = ctx.noise;
        let primary = particle.primary_clock;
        let clock = particle.secondary_clock;
        let r = particle.radius;

        if ShapeMode::select(primary, ctx.particle_count) == ShapeMode::Tangent
            && clamped_tangent(clock).1
        {
            log::debug!("particle {:?}: tangent shape clamped near pole", particle.id);
        }

        let steps = outline_steps();
        let mut points = Vec::with_capacity(steps);
        let mut vertices = Vec::new();
        let mut spin = 0.0f32;

        for angle in outline_angles() {
            let x = sample_shape(
                noise,
                &ShapeInput {
                    radius: r,
                    angle,
                    primary_clock: primary,
                    secondary_clock: clock,
                    particle_count: ctx.particle_count,
                    amplitude,
                    frame: ctx.frame,
                },
            );
            let y = r * angle.sin();

            // High-clock particles spin, and the spin compounds along the outline
            if primary > 180.0 {
                spin += noise.sample2(clock / 5.0, angle) / 10.0 + primary / 3.0 + amplitude / 100.0;
            }

            if primary < 150.0 && noise.sample2(clock, angle) > 0.8 {
                vertices.push(rotate(Vec2::new(y, x), spin));
            }

            points.push(rotate(Vec2::new(x + angle, y + angle), spin));

            if primary > 200.0 {
                let v = Vec2::new(
                    y + noise.sample2(angle, clock) * 5.0,
                    x + noise.sample1(angle) * 100.0,
                );
                vertices.push(rotate(v, spin));
            }
        }

        Self {
            center: particle.pos,
            mode: ShapeMode::select(primary, ctx.particle_count),
            points,
            vertices,
            stroke: StrokeStyle::for_particle(particle, amplitude, ctx.viewport),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.center.is_finite()
            && self.points.iter().all(|p| p.is_finite())
            && self.vertices.iter().all(|v| v.is_finite())
    }
}

/// Background fade for the frame: busier and louder scenes leave shorter trails
pub fn background_alpha(total_amplitude: f32, particle_count: usize) -> f32 {
    20.0 + (total_amplitude * 30.0).clamp(0.0, 60.0) + particle_count as f32 / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::particle::{ParticleId, SpawnParams};
    use proptest::prelude::*;

    fn input(primary: f32, count: usize) -> ShapeInput {
        ShapeInput {
            radius: 120.0,
            angle: 1.3,
            primary_clock: primary,
            secondary_clock: primary + 0.4,
            particle_count: count,
            amplitude: 0.2,
            frame: 77,
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(ShapeMode::select(144.0, 0), ShapeMode::SpinningSine);
        assert_eq!(ShapeMode::select(144.9, 0), ShapeMode::SpinningSine);
        assert_eq!(ShapeMode::select(145.2, 0), ShapeMode::NoiseAntenna);
        // count / 2 shifts the mode: 144 + 3.5 -> 147 -> 3
        assert_eq!(ShapeMode::select(144.0, 7), ShapeMode::PureNoise);
        assert_eq!(ShapeMode::select(149.0, 0), ShapeMode::Tangent);
    }

    #[test]
    fn test_outline_steps_cover_circle() {
        assert_eq!(outline_steps(), 90);
        let last = outline_angles().last().unwrap();
        assert!(last < TAU);
        assert!(last + SHAPE_ANGLE_STEP >= TAU);
    }

    #[test]
    fn test_sampler_is_reproducible() {
        let noise = NoiseField::new(7);
        for primary in [144.0, 145.0, 146.0, 147.0, 148.0, 149.0] {
            let a = sample_shape(&noise, &input(primary, 3));
            let b = sample_shape(&NoiseField::new(7), &input(primary, 3));
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_noise_in_unit_range() {
        let noise = NoiseField::new(3);
        for i in 0..200 {
            let v = noise.sample2(i as f32 * 0.37, i as f32 * 0.11);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_tangent_pole_is_clamped() {
        // secondary + 1 = pi/2 puts tan() on its pole
        let pole = std::f32::consts::FRAC_PI_2 - 1.0;
        let (t, clamped) = clamped_tangent(pole);
        assert!(clamped);
        assert!(t.abs() <= TAN_LIMIT);

        let noise = NoiseField::new(1);
        let mut inp = input(149.0, 0);
        inp.secondary_clock = pole;
        inp.angle = 6.0;
        let v = sample_shape(&noise, &inp);
        assert!(v.is_finite());
        assert!(v.abs() <= MAX_SHAPE_OFFSET);
    }

    #[test]
    fn test_frame_matches_particle() {
        let mut p = Particle::new(ParticleId(1));
        p.reset(
            ParticleId(1),
            &SpawnParams {
                pos: Vec2::new(200.0, 200.0),
                vel: Vec2::ZERO,
                radius: 80.0,
                primary_clock: 210.0,
            },
            0.0,
        );
        let noise = NoiseField::new(11);
        let viewport = Viewport::new(800.0, 600.0);
        let ctx = OutlineContext {
            noise: &noise,
            viewport: &viewport,
            particle_count: 1,
            frame: 5,
        };
        let frame = ShapeFrame::build(&ctx, &p, 0.0);
        assert_eq!(frame.points.len(), outline_steps());
        // primary > 200 adds one noisy vertex per step
        assert_eq!(frame.vertices.len(), outline_steps());
        assert_eq!(frame.center, p.pos);
        assert!(frame.is_finite());
        assert!(!frame.stroke.highlighted);
        assert!(frame.stroke.filled);
        assert!((frame.stroke.intensity - (40.0 + 20.0)).abs() < 1e-4);
    }

    #[test]
    fn test_background_alpha() {
        assert_eq!(background_alpha(0.0, 0), 20.0);
        assert_eq!(background_alpha(10.0, 8), 20.0 + 60.0 + 2.0);
    }

    proptest! {
        #[test]
        fn prop_sampler_always_finite(
            radius in 0.0f32..2000.0,
            angle in 0.0f32..TAU,
            primary in PRIMARY_CLOCK_MIN..PRIMARY_CLOCK_MAX,
            secondary in 0.0f32..10_000.0,
            count in 0usize..100,
            amplitude in 0.0f32..2.0,
            frame in 0u64..1_000_000,
        ) {
            let noise = NoiseField::new(42);
            let v = sample_shape(&noise, &ShapeInput {
                radius, angle, primary_clock: primary, secondary_clock: secondary,
                particle_count: count, amplitude, frame,
            });
            prop_assert!(v.is_finite());
            prop_assert!(v.abs() <= MAX_SHAPE_OFFSET);
        }
    }
}
