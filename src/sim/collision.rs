//! Pairwise overlap detection
//!
//! Each tick the index is rebuilt from scratch over every ordered pair of active
//! particles (O(n²), n is bounded by the pool). The fresh result is symmetric; it
//! is then folded into each particle's accumulated collision list, which only a
//! shrink clears.

use glam::Vec2;

use super::particle::{Particle, ParticleId};
use crate::consts::MIN_COLLISION_DISTANCE;

/// Overlap test between two circles. Coincident centers do not count.
#[inline]
pub fn circles_overlap(a_pos: Vec2, a_radius: f32, b_pos: Vec2, b_radius: f32) -> bool {
    let distance = a_pos.distance(b_pos);
    distance < a_radius + b_radius && distance > MIN_COLLISION_DISTANCE
}

/// Pointer inside a particle's radius
#[inline]
pub fn pointer_inside(pos: Vec2, radius: f32, pointer: Vec2) -> bool {
    pos.distance(pointer) < radius
}

/// One particle's contacts this tick
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: ParticleId,
    /// Overlapping peers, in the order they appear in the active set
    pub peers: Vec<ParticleId>,
    pub touching_pointer: bool,
}

/// Result of one collision pass, aligned with the particle slice it was built from
#[derive(Debug, Clone, Default)]
pub struct CollisionIndex {
    contacts: Vec<Contact>,
}

impl CollisionIndex {
    /// Compute every overlap and pointer contact for this tick
    pub fn compute(particles: &[Particle], pointer: Option<Vec2>) -> Self {
        let mut contacts: Vec<Contact> = particles
            .iter()
            .map(|p| Contact {
                id: p.id,
                peers: Vec::new(),
                touching_pointer: pointer.is_some_and(|ptr| pointer_inside(p.pos, p.radius, ptr)),
            })
            .collect();

        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                let (a, b) = (&particles[i], &particles[j]);
                if circles_overlap(a.pos, a.radius, b.pos, b.radius) {
                    contacts[i].peers.push(b.id);
                    contacts[j].peers.push(a.id);
                }
            }
        }

        Self { contacts }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact(&self, id: ParticleId) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    /// Whether `a` and `b` overlapped this tick
    pub fn colliding(&self, a: ParticleId, b: ParticleId) -> bool {
        self.contact(a).is_some_and(|c| c.peers.contains(&b))
    }

    pub fn touches_pointer(&self, id: ParticleId) -> bool {
        self.contact(id).is_some_and(|c| c.touching_pointer)
    }

    /// Number of distinct overlapping pairs
    pub fn pair_count(&self) -> usize {
        self.contacts.iter().map(|c| c.peers.len()).sum::<usize>() / 2
    }

    /// Fold this tick's contacts into the particles' accumulated state
    ///
    /// `particles` must be the slice the index was computed from.
    pub fn apply(&self, particles: &mut [Particle]) {
        debug_assert_eq!(particles.len(), self.contacts.len());
        for (particle, contact) in particles.iter_mut().zip(&self.contacts) {
            debug_assert_eq!(particle.id, contact.id);
            for peer in &contact.peers {
                if !particle.collisions.contains(peer) {
                    particle.collisions.push(*peer);
                }
            }
            particle.touching_pointer = contact.touching_pointer;
        }
    }
}
