use std::fmt;

use nalgebra::Vector3;

/// Identifier of one unit of backend playback capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Capability the audio-rendering collaborator hands to the engine.
///
/// The engine treats every call as fast, synchronous and side-effect-only.
/// None of these methods can fail from the engine's point of view: an
/// adapter that hits a backend error must absorb it, and `is_active` must
/// report `false` for any slot it cannot query -- an unknowable slot is
/// treated as free rather than leaking out of the pool forever.
pub trait VoiceBackend {
    /// Is this slot currently producing (or scheduled to produce) sound?
    fn is_active(&self, slot: SlotId) -> bool;

    /// Bind `sound` to `slot`, scheduled `start_delay_ticks` clock ticks
    /// into the future, initially muted.
    fn allocate(&mut self, slot: SlotId, sound: &str, start_delay_ticks: u64);

    /// Hard-stop whatever occupies the slot.
    fn stop(&mut self, slot: SlotId);

    fn set_gain(&mut self, slot: SlotId, gain_db: f64);
    fn set_pitch(&mut self, slot: SlotId, ratio: f64);
    fn set_position(&mut self, slot: SlotId, position: Vector3<f64>);
    fn set_velocity(&mut self, slot: SlotId, velocity: Vector3<f64>);
    fn set_filter_cutoff(&mut self, slot: SlotId, cutoff_hz: f64);
    fn set_mute(&mut self, slot: SlotId, muted: bool);

    /// Monotonic hardware clock, in backend ticks. Start-delay jitter is
    /// expressed relative to this time base.
    fn now(&self) -> u64;
}

impl VoiceBackend for Box<dyn VoiceBackend> {
    fn is_active(&self, slot: SlotId) -> bool {
        (**self).is_active(slot)
    }

    fn allocate(&mut self, slot: SlotId, sound: &str, start_delay_ticks: u64) {
        (**self).allocate(slot, sound, start_delay_ticks)
    }

    fn stop(&mut self, slot: SlotId) {
        (**self).stop(slot)
    }

    fn set_gain(&mut self, slot: SlotId, gain_db: f64) {
        (**self).set_gain(slot, gain_db)
    }

    fn set_pitch(&mut self, slot: SlotId, ratio: f64) {
        (**self).set_pitch(slot, ratio)
    }

    fn set_position(&mut self, slot: SlotId, position: Vector3<f64>) {
        (**self).set_position(slot, position)
    }

    fn set_velocity(&mut self, slot: SlotId, velocity: Vector3<f64>) {
        (**self).set_velocity(slot, velocity)
    }

    fn set_filter_cutoff(&mut self, slot: SlotId, cutoff_hz: f64) {
        (**self).set_filter_cutoff(slot, cutoff_hz)
    }

    fn set_mute(&mut self, slot: SlotId, muted: bool) {
        (**self).set_mute(slot, muted)
    }

    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Backend that renders nothing. Every slot reads as inactive and every
/// call is a no-op, which lets the whole control core run (and be tested)
/// with no audio system attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl VoiceBackend for NullBackend {
    fn is_active(&self, _slot: SlotId) -> bool {
        false
    }

    fn allocate(&mut self, _slot: SlotId, _sound: &str, _start_delay_ticks: u64) {}

    fn stop(&mut self, _slot: SlotId) {}

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
