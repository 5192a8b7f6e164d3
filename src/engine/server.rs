use std::collections::HashMap;

use nalgebra::Vector3;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::automation::Automation;
use crate::burst::{BurstEmitter, BurstState, Trigger};
use crate::control::Value;
use crate::engine::backend::{SlotId, VoiceBackend};
use crate::engine::command::{CommandReceiver, EngineCommand};
use crate::engine::pool::VoicePool;
use crate::engine::unit::SoundUnit;

/// A named set of sounds, one of which is chosen at random per spawn.
#[derive(Debug, Clone)]
pub struct SoundPool {
    name: String,
    sounds: Vec<String>,
}

impl SoundPool {
    pub fn new(name: impl Into<String>, sounds: Vec<String>) -> Self {
        Self {
            name: name.into(),
            sounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sounds(&self) -> &[String] {
        &self.sounds
    }
}

/// The control-rate brain: owns every sound unit, automation template,
/// burst emitter, sound pool and voice group, and advances them once per
/// `tick(dt)` against a [`VoiceBackend`].
///
/// All engine state is exclusively owned and never re-entered; external
/// commands must be applied between ticks (see [`Engine::drain`]).
/// Reference errors -- commands naming unknown sounds, pools, bursts or
/// automations -- are logged and ignored, never fatal.
pub struct Engine<B: VoiceBackend> {
    backend: B,
    rng: SmallRng,
    units: HashMap<String, SoundUnit>,
    automations: HashMap<String, Automation>,
    bursts: HashMap<String, BurstEmitter>,
    pools: HashMap<String, SoundPool>,
    /// Voice groups: slot capacity shared by the transient sounds that
    /// name them.
    groups: HashMap<String, VoicePool>,
    /// attachment name -> unit name, for detach-by-name.
    attachments: HashMap<String, String>,
    /// Upper bound for randomized start delays, in backend clock ticks.
    jitter_max: u64,
    next_slot: u32,
    counter: u64,
}

impl<B: VoiceBackend> Engine<B> {
    pub fn new(backend: B) -> Self {
        Self::from_rng(backend, SmallRng::from_entropy())
    }

    /// Engine with a deterministic random stream, for tests and replays.
    pub fn with_seed(backend: B, seed: u64) -> Self {
        Self::from_rng(backend, SmallRng::seed_from_u64(seed))
    }

    fn from_rng(backend: B, rng: SmallRng) -> Self {
        Self {
            backend,
            rng,
            units: HashMap::new(),
            automations: HashMap::new(),
            bursts: HashMap::new(),
            pools: HashMap::new(),
            groups: HashMap::new(),
            attachments: HashMap::new(),
            jitter_max: 0,
            next_slot: 0,
            counter: 0,
        }
    }

    pub fn set_start_jitter(&mut self, max_ticks: u64) {
        self.jitter_max = max_ticks;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    // ---- registration -------------------------------------------------

    /// Reserve `voices` slots under a named voice group.
    pub fn add_group(&mut self, name: impl Into<String>, voices: usize) {
        let pool = VoicePool::contiguous(self.next_slot, voices);
        self.next_slot += voices as u32;
        self.groups.insert(name.into(), pool);
    }

    /// Register a sound unit. Persistent units are bound to a fresh slot
    /// immediately (muted until started); transient units stay dormant as
    /// prototypes until spawned.
    pub fn add_sound(&mut self, mut unit: SoundUnit) {
        if !unit.is_transient() {
            let slot = SlotId(self.next_slot);
            self.next_slot += 1;
            unit.assign(slot);
            let delay = self.start_delay();
            self.backend.allocate(slot, unit.sound(), delay);
            unit.sync(&mut self.backend);
        }
        debug!(sound = unit.name(), transient = unit.is_transient(), "sound registered");
        self.units.insert(unit.name().to_string(), unit);
    }

    pub fn add_pool(&mut self, pool: SoundPool) {
        self.pools.insert(pool.name().to_string(), pool);
    }

    pub fn add_automation(&mut self, automation: Automation) {
        self.automations
            .insert(automation.name().to_string(), automation);
    }

    pub fn add_burst(&mut self, burst: BurstEmitter) {
        self.bursts.insert(burst.name().to_string(), burst);
    }

    // ---- per-tick -----------------------------------------------------

    /// Advance the whole engine by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let mut triggers: Vec<Trigger> = Vec::new();
        for burst in self.bursts.values_mut() {
            if let Some(trigger) = burst.tick(dt, &mut self.rng) {
                triggers.push(trigger);
            }
        }
        for trigger in triggers {
            self.fire(trigger);
        }

        for unit in self.units.values_mut() {
            unit.tick(dt, &mut self.rng, &mut self.backend);
        }

        let dead: Vec<String> = self
            .units
            .iter()
            .filter(|(_, unit)| unit.is_finished() && unit.is_transient())
            .map(|(name, _)| name.clone())
            .collect();
        for name in dead {
            debug!(sound = %name, "removing finished sound");
            self.units.remove(&name);
            self.attachments.retain(|_, target| target != &name);
        }
    }

    fn fire(&mut self, trigger: Trigger) {
        let Some(instance) = self.spawn_from_pool(&trigger.pool) else {
            return;
        };
        if let Some(unit) = self.units.get_mut(&instance) {
            unit.set_gain(trigger.gain_db, 0.0);
            unit.set_position(trigger.position, 0.0);
            unit.sync(&mut self.backend);
        }
    }

    // ---- spawning -----------------------------------------------------

    /// Spawn by name, resolving sounds first, then pools. Returns the slot
    /// the new instance occupies.
    pub fn spawn(&mut self, name: &str) -> Option<SlotId> {
        let instance = if self.units.contains_key(name) {
            self.spawn_sound(name)
        } else if self.pools.contains_key(name) {
            self.spawn_from_pool(name)
        } else {
            warn!(name, "tried to spawn non-existent sound/pool");
            None
        }?;
        self.units.get(&instance).and_then(|unit| unit.slot())
    }

    fn spawn_from_pool(&mut self, pool: &str) -> Option<String> {
        let Some(entry) = self.pools.get(pool) else {
            warn!(pool, "tried to spawn from non-existent pool");
            return None;
        };
        let Some(sound) = entry.sounds.choose(&mut self.rng).cloned() else {
            warn!(pool, "pool has no sounds");
            return None;
        };
        self.spawn_sound(&sound)
    }

    fn spawn_sound(&mut self, name: &str) -> Option<String> {
        let proto = match self.units.get(name) {
            Some(proto) => proto,
            None => {
                warn!(sound = name, "tried to spawn non-existent sound");
                return None;
            }
        };
        if !proto.is_transient() {
            warn!(sound = name, "tried to spawn a non-transient sound");
            return None;
        }
        let Some(group) = proto.group().map(str::to_string) else {
            warn!(sound = name, "sound tried to spawn without a voice group");
            return None;
        };
        let mut unit = proto.clone();

        let Some(voices) = self.groups.get(&group) else {
            warn!(sound = name, group = %group, "unknown voice group");
            return None;
        };
        let slot = voices.allocate(&mut self.backend, &mut self.rng);

        let instance = self.unique_name();
        unit.rename(&instance);
        unit.assign(slot);

        let delay = self.start_delay();
        self.backend.allocate(slot, unit.sound(), delay);
        unit.sync(&mut self.backend);
        self.backend.set_mute(slot, false);
        debug!(sound = name, instance = %instance, %slot, delay, "sound spawned");

        self.units.insert(instance.clone(), unit);
        Some(instance)
    }

    /// Randomized start delay in backend clock ticks, so simultaneous
    /// triggers don't land on the exact same mix frame and machine-gun.
    fn start_delay(&mut self) -> u64 {
        if self.jitter_max > 0 {
            self.rng.gen_range(0..=self.jitter_max)
        } else {
            0
        }
    }

    fn unique_name(&mut self) -> String {
        self.counter += 1;
        format!("name_{:06}", self.counter)
    }

    // ---- commands -----------------------------------------------------

    /// Attach automation template `template` to `target` under the unique
    /// attachment name `attachment`.
    pub fn attach_automation(&mut self, target: &str, template: &str, attachment: &str) {
        let Some(automation) = self.automations.get(template) else {
            warn!(template, "tried to attach non-existent automation");
            return;
        };
        let Some(unit) = self.units.get_mut(target) else {
            warn!(target, "tried to add automation to non-existent sound");
            return;
        };
        unit.automations_mut().attach(attachment, automation);
        self.attachments
            .insert(attachment.to_string(), target.to_string());
    }

    pub fn detach_automation(&mut self, attachment: &str) {
        match self.attachments.remove(attachment) {
            Some(target) => {
                if let Some(unit) = self.units.get_mut(&target) {
                    unit.automations_mut().detach(attachment);
                }
            }
            None => warn!(attachment, "tried to remove non-existent automation"),
        }
    }

    pub fn set_burst_enabled(&mut self, name: &str, enabled: bool) {
        match self.bursts.get_mut(name) {
            Some(burst) => burst.set_enabled(enabled),
            None => warn!(name, "tried to enable/disable non-existent burst"),
        }
    }

    pub fn set_gain(&mut self, target: &str, gain_db: f64, time: f64) {
        match self.units.get_mut(target) {
            Some(unit) => unit.set_gain(gain_db, time),
            None => warn!(target, "tried to set gain of non-existent sound"),
        }
    }

    pub fn set_pitch(&mut self, target: &str, ratio: f64, time: f64) {
        match self.units.get_mut(target) {
            Some(unit) => unit.set_pitch(ratio, time),
            None => warn!(target, "tried to set pitch of non-existent sound"),
        }
    }

    pub fn set_position(&mut self, target: &str, position: Vector3<f64>, time: f64) {
        match self.units.get_mut(target) {
            Some(unit) => unit.set_position(position, time),
            None => warn!(target, "tried to set position of non-existent sound"),
        }
    }

    pub fn set_filter(&mut self, target: &str, cutoff_hz: f64, time: f64) {
        match self.units.get_mut(target) {
            Some(unit) => unit.set_filter(cutoff_hz, time),
            None => warn!(target, "tried to set filter of non-existent sound"),
        }
    }

    pub fn set_mute(&mut self, target: &str, muted: bool) {
        match self.units.get(target).and_then(|unit| unit.slot()) {
            Some(slot) => self.backend.set_mute(slot, muted),
            None => warn!(target, "tried to mute non-playing sound"),
        }
    }

    /// Apply every queued command. Call between ticks.
    pub fn drain(&mut self, rx: &mut impl CommandReceiver) {
        while let Some(command) = rx.pop() {
            self.apply(command);
        }
    }

    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Spawn { name } => {
                self.spawn(&name);
            }
            EngineCommand::SetGain {
                target,
                gain_db,
                time,
            } => self.set_gain(&target, gain_db, time),
            EngineCommand::SetPitch {
                target,
                ratio,
                time,
            } => self.set_pitch(&target, ratio, time),
            EngineCommand::SetPosition {
                target,
                position,
                time,
            } => self.set_position(&target, position, time),
            EngineCommand::SetFilter {
                target,
                cutoff_hz,
                time,
            } => self.set_filter(&target, cutoff_hz, time),
            EngineCommand::SetMute { target, muted } => self.set_mute(&target, muted),
            EngineCommand::AttachAutomation {
                target,
                template,
                attachment,
            } => self.attach_automation(&target, &template, &attachment),
            EngineCommand::DetachAutomation { attachment } => {
                self.detach_automation(&attachment)
            }
            EngineCommand::SetBurstEnabled { burst, enabled } => {
                self.set_burst_enabled(&burst, enabled)
            }
        }
    }

    // ---- diagnostics --------------------------------------------------

    pub fn unit(&self, name: &str) -> Option<&SoundUnit> {
        self.units.get(name)
    }

    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Current summed automation contribution for one attribute of one
    /// sound.
    pub fn attribute(&self, target: &str, attribute: &str) -> Option<Value> {
        self.units
            .get(target)
            .map(|unit| unit.automations().get(attribute))
    }

    pub fn burst_state(&self, name: &str) -> Option<BurstState> {
        self.bursts.get(name).map(|burst| burst.state())
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn has_pool(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    pub fn has_automation(&self, name: &str) -> bool {
        self.automations.contains_key(name)
    }

    pub fn has_burst(&self, name: &str) -> bool {
        self.bursts.contains_key(name)
    }

    pub fn active_voices(&self) -> usize {
        self.units
            .values()
            .filter_map(|unit| unit.slot())
            .filter(|&slot| self.backend.is_active(slot))
            .count()
    }
}
