//! Bounded reuse of particles and audio voices
//!
//! Continuous spawning and dying would otherwise allocate and free a particle (and
//! its collision list) every few frames. The particle pool owns every particle it
//! ever created; the voice pool hands out a fixed set of voice slots round-robin.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::particle::{Particle, ParticleId, SpawnParams};

/// Outcome of [`ParticlePool::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub id: ParticleId,
    /// Set when the pool was full and the oldest active particle was reused
    pub evicted: Option<ParticleId>,
}

/// Pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub available: usize,
    pub active: usize,
    pub total: usize,
    pub total_created: usize,
    /// Active share of capacity, in percent
    pub utilization: f32,
}

/// Reusable particle storage
///
/// A particle is always in exactly one of `available` or `active`, and the two
/// together never exceed `max_size`. `active` is kept in acquisition order, so the
/// front is the oldest.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    available: Vec<Particle>,
    active: Vec<Particle>,
    max_size: usize,
    total_created: usize,
    next_id: u32,
}

impl ParticlePool {
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        let initial_size = initial_size.min(max_size);
        let mut pool = Self {
            available: Vec::with_capacity(max_size),
            active: Vec::with_capacity(max_size),
            max_size,
            total_created: 0,
            next_id: 1,
        };
        for _ in 0..initial_size {
            let id = pool.next_id();
            pool.available.push(Particle::new(id));
            pool.total_created += 1;
        }
        log::info!("particle pool initialized with {initial_size} particles (max: {max_size})");
        pool
    }

    fn next_id(&mut self) -> ParticleId {
        let id = ParticleId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Take a particle and initialise it from `spawn`
    ///
    /// Reuses an available particle, else allocates while under capacity, else
    /// evicts the oldest active particle.
    pub fn acquire(&mut self, spawn: &SpawnParams, now_ms: f64) -> Acquired {
        let id = self.next_id();
        let mut evicted = None;

        let mut particle = if let Some(p) = self.available.pop() {
            p
        } else if self.active.len() < self.max_size {
            self.total_created += 1;
            Particle::new(id)
        } else {
            let oldest = self.active.remove(0);
            log::warn!(
                "particle pool exhausted ({} active), recycling oldest {:?}",
                self.active.len() + 1,
                oldest.id
            );
            evicted = Some(oldest.id);
            oldest
        };

        particle.reset(id, spawn, now_ms);
        self.active.push(particle);
        Acquired { id, evicted }
    }

    /// Return a particle to the pool. No-op (returns false) if it is not active.
    pub fn release(&mut self, id: ParticleId) -> bool {
        let Some(index) = self.active.iter().position(|p| p.id == id) else {
            return false;
        };
        let mut particle = self.active.remove(index);
        particle.clean();
        self.available.push(particle);
        true
    }

    pub fn release_many(&mut self, ids: &[ParticleId]) -> usize {
        ids.iter().filter(|&&id| self.release(id)).count()
    }

    /// Release every active particle, returning their ids
    pub fn clear(&mut self) -> Vec<ParticleId> {
        let mut released = Vec::with_capacity(self.active.len());
        while let Some(mut particle) = self.active.pop() {
            released.push(particle.id);
            particle.clean();
            self.available.push(particle);
        }
        released
    }

    pub fn active(&self) -> &[Particle] {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut [Particle] {
        &mut self.active
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.active.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.active.iter_mut().find(|p| p.id == id)
    }

    pub fn is_active(&self, id: ParticleId) -> bool {
        self.get(id).is_some()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.available.len(),
            active: self.active.len(),
            total: self.available.len() + self.active.len(),
            total_created: self.total_created,
            utilization: self.active.len() as f32 / self.max_size as f32 * 100.0,
        }
    }
}

/// Oscillator shape for a voice slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

impl Waveform {
    const CYCLE: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Triangle,
        Waveform::Sawtooth,
        Waveform::Square,
    ];

    pub fn for_index(index: usize) -> Self {
        Self::CYCLE[index % Self::CYCLE.len()]
    }
}

/// ADSR envelope for a voice (seconds, sustain level) plus its output range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub peak: f32,
    pub floor: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.5,
            decay: 0.3,
            sustain: 0.4,
            release: 1.0,
            peak: 0.3,
            floor: 0.0,
        }
    }
}

/// Description of one voice slot, for the audio engine to build its oscillator from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub index: usize,
    pub waveform: Waveform,
    /// Frequency the oscillator idles at before any particle drives it
    pub rest_frequency: f32,
    pub envelope: Envelope,
}

fn rest_frequency(base_frequency: f32, index: usize) -> f32 {
    base_frequency + ((index * 50) % 800) as f32
}

/// Fixed set of voices handed out round-robin, plus the particle to voice map
///
/// Assignment skips voices a live particle still holds. Only when every voice is
/// taken does the plain round-robin slot get shared; the audio engine then applies
/// the last update it receives for that slot.
#[derive(Debug, Clone)]
pub struct VoicePool {
    voices: Vec<Voice>,
    next_index: usize,
    assignments: BTreeMap<ParticleId, usize>,
    silence_pending: bool,
}

impl VoicePool {
    pub fn new(size: usize, base_frequency: f32) -> Self {
        let size = size.max(1);
        let voices = (0..size)
            .map(|index| Voice {
                index,
                waveform: Waveform::for_index(index),
                rest_frequency: rest_frequency(base_frequency, index),
                envelope: Envelope::default(),
            })
            .collect();
        log::info!("voice pool initialized with {size} voices");
        Self {
            voices,
            next_index: 0,
            assignments: BTreeMap::new(),
            silence_pending: false,
        }
    }

    /// Move every voice's idle pitch to a new base frequency
    pub fn retune(&mut self, base_frequency: f32) {
        for voice in &mut self.voices {
            voice.rest_frequency = rest_frequency(base_frequency, voice.index);
        }
    }

    /// Next voice in round-robin order
    pub fn get_next(&mut self) -> &Voice {
        let index = self.next_index;
        self.next_index = (self.next_index + 1) % self.voices.len();
        &self.voices[index]
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Give a particle the first free voice at or after the cursor
    pub fn assign(&mut self, particle: ParticleId) -> usize {
        let len = self.voices.len();
        let taken: BTreeSet<usize> = self
            .assignments
            .iter()
            .filter(|&(&owner, _)| owner != particle)
            .map(|(_, &v)| v)
            .collect();
        let free = (0..len)
            .map(|offset| (self.next_index + offset) % len)
            .find(|index| !taken.contains(index));

        let index = match free {
            Some(index) => {
                self.next_index = (index + 1) % len;
                index
            }
            None => {
                let index = self.get_next().index;
                log::debug!("voice {index} oversubscribed, shared with {particle:?}");
                index
            }
        };
        self.assignments.insert(particle, index);
        index
    }

    pub fn unassign(&mut self, particle: ParticleId) -> Option<usize> {
        self.assignments.remove(&particle)
    }

    pub fn voice_for(&self, particle: ParticleId) -> Option<usize> {
        self.assignments.get(&particle).copied()
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }

    /// Drop every assignment and ask the engine to fade all voices out
    pub fn silence_all(&mut self) {
        self.assignments.clear();
        self.silence_pending = true;
    }

    /// Whether a silence request is pending; clears it
    pub fn take_silence(&mut self) -> bool {
        std::mem::take(&mut self.silence_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use proptest::prelude::*;

    fn spawn(radius: f32) -> SpawnParams {
        SpawnParams {
            pos: Vec2::new(100.0, 100.0),
            vel: Vec2::ZERO,
            radius,
            primary_clock: 200.0,
        }
    }

    #[test]
    fn test_acquire_reuses_preallocated() {
        let mut pool = ParticlePool::new(5, 10);
        assert_eq!(pool.available_len(), 5);
        let a = pool.acquire(&spawn(100.0), 0.0);
        assert_eq!(a.evicted, None);
        assert_eq!(pool.available_len(), 4);
        assert_eq!(pool.active_len(), 1);
        assert_eq!(pool.stats().total_created, 5);
        assert_eq!(pool.get(a.id).map(|p| p.radius), Some(100.0));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut pool = ParticlePool::new(0, 4);
        let a = pool.acquire(&spawn(100.0), 0.0);
        assert!(pool.release(a.id));
        assert!(!pool.release(a.id));
        assert_eq!(pool.available_len(), 1);
        assert_eq!(pool.active_len(), 0);
    }

    #[test]
    fn test_exhaustion_evicts_oldest() {
        let mut pool = ParticlePool::new(20, 40);
        let ids: Vec<ParticleId> = (0..40).map(|_| pool.acquire(&spawn(100.0), 0.0).id).collect();
        assert_eq!(pool.active_len(), 40);

        let extra = pool.acquire(&spawn(42.0), 10.0);
        assert_eq!(extra.evicted, Some(ids[0]));
        assert_eq!(pool.active_len(), 40);
        assert!(!pool.is_active(ids[0]));
        assert_eq!(pool.active().last().map(|p| p.id), Some(extra.id));
        assert_eq!(pool.get(extra.id).map(|p| p.radius), Some(42.0));
        assert_eq!(pool.stats().total, 40);
    }

    #[test]
    fn test_released_particle_is_clean() {
        let mut pool = ParticlePool::new(0, 2);
        let a = pool.acquire(&spawn(100.0), 0.0);
        if let Some(p) = pool.get_mut(a.id) {
            p.collisions.push(ParticleId(99));
            p.toggle_growing();
        }
        pool.release(a.id);
        let b = pool.acquire(&spawn(100.0), 0.0);
        let p = pool.get(b.id).unwrap();
        assert!(p.collisions.is_empty());
        assert!(!p.is_growing());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_clear_releases_all() {
        let mut pool = ParticlePool::new(0, 8);
        for _ in 0..5 {
            pool.acquire(&spawn(100.0), 0.0);
        }
        assert_eq!(pool.clear().len(), 5);
        assert_eq!(pool.active_len(), 0);
        assert_eq!(pool.available_len(), 5);
        assert_eq!(pool.stats().utilization, 0.0);
    }

    #[test]
    fn test_voices_round_robin() {
        let mut voices = VoicePool::new(3, 200.0);
        let order: Vec<usize> = (0..7).map(|_| voices.get_next().index).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(voices.voice(1).map(|v| v.waveform), Some(Waveform::Triangle));
        assert_eq!(voices.voice(2).map(|v| v.rest_frequency), Some(300.0));
    }

    #[test]
    fn test_voice_assignment_survives_removal() {
        let mut voices = VoicePool::new(4, 200.0);
        let a = voices.assign(ParticleId(1));
        let b = voices.assign(ParticleId(2));
        voices.unassign(ParticleId(1));
        assert_eq!(voices.voice_for(ParticleId(2)), Some(b));
        assert_ne!(a, b);
        assert_eq!(voices.voice_for(ParticleId(1)), None);
    }

    #[test]
    fn test_voice_sharing_when_oversubscribed() {
        let mut voices = VoicePool::new(2, 200.0);
        voices.assign(ParticleId(1));
        voices.assign(ParticleId(2));
        let third = voices.assign(ParticleId(3));
        assert_eq!(third, 0);
        assert_eq!(voices.voice_for(ParticleId(1)), Some(0));
        voices.silence_all();
        assert!(voices.take_silence());
        assert!(!voices.take_silence());
        assert_eq!(voices.assigned_count(), 0);
    }

    #[test]
    fn test_assign_skips_held_voice_after_churn() {
        let mut voices = VoicePool::new(40, 200.0);
        let held = voices.assign(ParticleId(1));
        for n in 0..39 {
            let id = ParticleId(100 + n);
            voices.assign(id);
            voices.unassign(id);
        }
        let next = voices.assign(ParticleId(2));
        assert_ne!(next, held);
        assert_eq!(voices.voice_for(ParticleId(1)), Some(held));
        assert_eq!(voices.assigned_count(), 2);
    }

    #[test]
    fn test_assign_fills_free_voices_before_sharing() {
        let mut voices = VoicePool::new(4, 200.0);
        for n in 0..4 {
            voices.assign(ParticleId(n));
        }
        voices.unassign(ParticleId(2));
        // Cursor sits at 0, but the only free slot is 2
        assert_eq!(voices.assign(ParticleId(10)), 2);
        let mut held: Vec<usize> = (0..4)
            .filter_map(|n| voices.voice_for(ParticleId(n)))
            .chain(voices.voice_for(ParticleId(10)))
            .collect();
        held.sort();
        assert_eq!(held, vec![0, 1, 2, 3]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire,
        Release(usize),
        ReleaseTwice(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Acquire),
            (0usize..64).prop_map(Op::Release),
            (0usize..64).prop_map(Op::ReleaseTwice),
        ]
    }

    proptest! {
        #[test]
        fn prop_pool_invariants(initial in 0usize..10, max in 1usize..16, ops in prop::collection::vec(op(), 0..80)) {
            let mut pool = ParticlePool::new(initial, max);
            let mut seen: Vec<ParticleId> = Vec::new();
            for op in ops {
                match op {
                    Op::Acquire => seen.push(pool.acquire(&spawn(50.0), 0.0).id),
                    Op::Release(i) => {
                        if let Some(&id) = seen.get(i % seen.len().max(1)) {
                            pool.release(id);
                        }
                    }
                    Op::ReleaseTwice(i) => {
                        if let Some(&id) = seen.get(i % seen.len().max(1)) {
                            pool.release(id);
                            let before = pool.available_len();
                            prop_assert!(!pool.release(id));
                            prop_assert_eq!(pool.available_len(), before);
                        }
                    }
                }
                prop_assert!(pool.available_len() + pool.active_len() <= max);
                let mut ids: Vec<ParticleId> = pool.active().iter().map(|p| p.id).collect();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), pool.active_len());
            }
        }
    }
}
