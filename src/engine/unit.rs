use nalgebra::Vector3;
use rand::Rng;

use crate::automation::{attr, AutomationGroup};
use crate::control::sgolay::VelocityEstimator;
use crate::control::Smoothed;
use crate::engine::backend::{SlotId, VoiceBackend};
use crate::FILTER_BYPASS_HZ;

/// Control state for one logical sound, pushed to one backend voice.
///
/// A unit is either *persistent* (bound to a voice for the life of the
/// engine) or *transient* (a prototype that is cloned per spawn; each clone
/// lives until its voice goes silent). All of its audible parameters are
/// smoothed, and automation contributions are added on top of the smoothed
/// base values each tick.
#[derive(Debug, Clone)]
pub struct SoundUnit {
    name: String,
    sound: String,
    group: Option<String>,
    slot: Option<SlotId>,
    transient: bool,
    finished: bool,
    /// Base gain in dB; fades ride a linear ramp so they end dead on time.
    gain: Smoothed<f64>,
    /// Playback rate ratio (1.0 = natural pitch).
    pitch: Smoothed<f64>,
    position: Smoothed<Vector3<f64>>,
    /// Lowpass cutoff in Hz, absent when the sound declares no filter.
    filter: Option<Smoothed<f64>>,
    automations: AutomationGroup,
    velocity: VelocityEstimator,
}

impl SoundUnit {
    pub fn new(name: impl Into<String>, sound: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sound: sound.into(),
            group: None,
            slot: None,
            transient: false,
            finished: false,
            gain: Smoothed::linear(0.0, 0.05),
            pitch: Smoothed::new(1.0, 0.05),
            position: Smoothed::new(Vector3::zeros(), 0.01),
            filter: None,
            automations: AutomationGroup::new(),
            velocity: VelocityEstimator::default(),
        }
    }

    pub fn with_gain(mut self, gain_db: f64) -> Self {
        self.gain = Smoothed::linear(gain_db, 0.05);
        self
    }

    pub fn with_pitch(mut self, ratio: f64) -> Self {
        self.pitch = Smoothed::new(ratio, 0.05);
        self
    }

    pub fn with_position(mut self, position: Vector3<f64>) -> Self {
        self.position = Smoothed::new(position, 0.01);
        self
    }

    pub fn with_filter(mut self, cutoff_hz: f64) -> Self {
        self.filter = Some(Smoothed::new(cutoff_hz, 0.01));
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn with_velocity_filter(mut self, estimator: VelocityEstimator) -> Self {
        self.velocity = estimator;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn sound(&self) -> &str {
        &self.sound
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn gain_db(&self) -> f64 {
        self.gain.state()
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position.state()
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity.velocity()
    }

    pub fn automations(&self) -> &AutomationGroup {
        &self.automations
    }

    pub fn automations_mut(&mut self) -> &mut AutomationGroup {
        &mut self.automations
    }

    /// Bind this unit to a backend voice slot.
    pub fn assign(&mut self, slot: SlotId) {
        self.slot = Some(slot);
        self.finished = false;
    }

    pub fn set_gain(&mut self, gain_db: f64, time: f64) {
        self.gain.set(gain_db, time);
    }

    pub fn set_pitch(&mut self, ratio: f64, time: f64) {
        self.pitch.set(ratio, time);
    }

    /// A zero-time move is a teleport: the velocity window restarts so the
    /// jump does not read as motion.
    pub fn set_position(&mut self, position: Vector3<f64>, time: f64) {
        self.position.set(position, time);
        if time == 0.0 {
            self.velocity.reset();
        }
    }

    pub fn set_filter(&mut self, cutoff_hz: f64, time: f64) {
        match &mut self.filter {
            Some(filter) => filter.set(cutoff_hz, time),
            None => self.filter = Some(Smoothed::new(cutoff_hz, time)),
        }
    }

    /// Advance all control state by `dt` and push the results to the voice.
    ///
    /// A unit whose voice has gone silent is marked finished and detached
    /// from its slot; the engine reaps finished transients after the tick.
    pub fn tick<B: VoiceBackend>(&mut self, dt: f64, rng: &mut impl Rng, backend: &mut B) {
        self.automations.tick(dt, rng);

        let Some(slot) = self.slot else { return };
        if !backend.is_active(slot) {
            self.finished = true;
            self.slot = None;
            return;
        }

        self.pitch.advance(dt);
        self.position.advance(dt);
        self.gain.advance(dt);
        if let Some(filter) = &mut self.filter {
            filter.advance(dt);
        }
        self.push(slot, backend);
    }

    /// Push current parameter values without advancing time. Used right
    /// after allocation so a voice starts life with sane parameters
    /// instead of whatever the slot last played.
    pub fn sync<B: VoiceBackend>(&mut self, backend: &mut B) {
        if let Some(slot) = self.slot {
            self.push(slot, backend);
        }
    }

    fn push<B: VoiceBackend>(&mut self, slot: SlotId, backend: &mut B) {
        backend.set_pitch(
            slot,
            self.pitch.state() + self.automations.get(attr::PITCH).scalar(),
        );

        let position = self
            .automations
            .get(attr::POSITION)
            .offset_vec3(self.position.state());
        backend.set_position(slot, position);
        backend.set_velocity(slot, self.velocity.feed(position));

        backend.set_gain(
            slot,
            self.gain.state() + self.automations.get(attr::GAIN).scalar(),
        );

        if let Some(filter) = &self.filter {
            let cutoff = filter.state() + self.automations.get(attr::FILTER).scalar();
            // Past 20 kHz the filter is inaudible; treat it as bypassed.
            if cutoff <= FILTER_BYPASS_HZ {
                backend.set_filter_cutoff(slot, cutoff);
            }
        }
    }
}
