use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::engine::backend::{SlotId, VoiceBackend};

/// A fixed set of voice slots shared by every sound spawned into it.
///
/// There is no free list: liveness is queried from the backend at every
/// allocation, so slots released by the renderer (or lost to a backend
/// error, which reads as inactive) come back into rotation by themselves.
///
/// `allocate` never fails. When every slot is busy, a random one is stolen:
/// its current occupant is hard-stopped and the slot reused. Stealing is a
/// degraded condition, not an error -- a pool under pressure trades the
/// oldest ambience for the newest trigger.
#[derive(Debug, Clone)]
pub struct VoicePool {
    slots: Vec<SlotId>,
}

impl VoicePool {
    /// A pool over the given slots. Empty pools are a configuration error
    /// and rejected before construction reaches this point.
    pub fn new(slots: Vec<SlotId>) -> Self {
        assert!(!slots.is_empty(), "voice pool needs at least one slot");
        Self { slots }
    }

    /// A pool of `count` slots starting at id `first`.
    pub fn contiguous(first: u32, count: usize) -> Self {
        Self::new((0..count as u32).map(|i| SlotId(first + i)).collect())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    /// Pick a slot for a new sound, stealing one if none are free.
    pub fn allocate<B: VoiceBackend>(&self, backend: &mut B, rng: &mut impl Rng) -> SlotId {
        let free: Vec<SlotId> = self
            .slots
            .iter()
            .copied()
            .filter(|&slot| !backend.is_active(slot))
            .collect();

        if let Some(&slot) = free.choose(rng) {
            debug!(%slot, free = free.len(), "allocated free voice");
            return slot;
        }

        let slot = self.slots[rng.gen_range(0..self.slots.len())];
        warn!(%slot, "no free voice available; stealing");
        backend.stop(slot);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    /// Backend with a scripted set of active slots and a stop counter.
    struct FakeBackend {
        active: HashSet<SlotId>,
        stops: Vec<SlotId>,
    }

    impl FakeBackend {
        fn with_active(active: impl IntoIterator<Item = u32>) -> Self {
            Self {
                active: active.into_iter().map(SlotId).collect(),
                stops: Vec::new(),
            }
        }
    }

    impl VoiceBackend for FakeBackend {
        fn is_active(&self, slot: SlotId) -> bool {
            self.active.contains(&slot)
        }

        fn allocate(&mut self, _slot: SlotId, _sound: &str, _start_delay_ticks: u64) {}

        fn stop(&mut self, slot: SlotId) {
            self.stops.push(slot);
            self.active.remove(&slot);
        }

        fn set_gain(&mut self, _slot: SlotId, _gain_db: f64) {}
        fn set_pitch(&mut self, _slot: SlotId, _ratio: f64) {}
        fn set_position(&mut self, _slot: SlotId, _position: Vector3<f64>) {}
        fn set_velocity(&mut self, _slot: SlotId, _velocity: Vector3<f64>) {}
        fn set_filter_cutoff(&mut self, _slot: SlotId, _cutoff_hz: f64) {}
        fn set_mute(&mut self, _slot: SlotId, _muted: bool) {}

        fn now(&self) -> u64 {
            0
        }
    }

    #[test]
    fn allocates_a_free_slot_without_stopping_anything() {
        let pool = VoicePool::contiguous(0, 4);
        let mut backend = FakeBackend::with_active([0, 1, 3]);
        let mut rng = SmallRng::seed_from_u64(11);

        let slot = pool.allocate(&mut backend, &mut rng);
        assert_eq!(slot, SlotId(2));
        assert!(backend.stops.is_empty());
    }

    #[test]
    fn exhausted_pool_steals_exactly_one_slot() {
        let pool = VoicePool::contiguous(0, 4);
        let mut backend = FakeBackend::with_active([0, 1, 2, 3]);
        let mut rng = SmallRng::seed_from_u64(12);

        let slot = pool.allocate(&mut backend, &mut rng);
        assert!(pool.slots().contains(&slot));
        assert_eq!(backend.stops, vec![slot]);
    }

    #[test]
    fn allocation_always_returns_a_pool_slot() {
        let pool = VoicePool::contiguous(16, 3);
        let mut rng = SmallRng::seed_from_u64(13);
        for i in 0..200 {
            let mut backend = if i % 2 == 0 {
                FakeBackend::with_active([16, 17, 18])
            } else {
                FakeBackend::with_active([17])
            };
            let slot = pool.allocate(&mut backend, &mut rng);
            assert!(pool.slots().contains(&slot));
        }
    }

    #[test]
    fn free_choice_is_spread_across_slots() {
        // With everything free, allocation should not be pinned to one slot.
        let pool = VoicePool::contiguous(0, 8);
        let mut backend = FakeBackend::with_active([]);
        let mut rng = SmallRng::seed_from_u64(14);
        let chosen: HashSet<SlotId> = (0..200)
            .map(|_| pool.allocate(&mut backend, &mut rng))
            .collect();
        assert!(chosen.len() > 4, "expected spread, got {:?}", chosen);
    }

    #[test]
    #[should_panic(expected = "at least one slot")]
    fn empty_pool_is_a_construction_error() {
        let _ = VoicePool::new(Vec::new());
    }
}
