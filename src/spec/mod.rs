//! Declarative entity descriptors and engine construction.
//!
//! A server configuration is a tree of named records -- sounds, voice
//! groups, pools, automations, bursts -- deserialized from one or more TOML
//! documents (later documents override earlier ones, table by table).
//! Construction is entity-by-entity: a malformed record produces a
//! [`SpecError`], lands on the build report's skip list, and the rest of
//! the configuration still comes up. Nothing in a spec is a required
//! resource.

use nalgebra::Vector3;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::automation::source::{RandomWalk, Sine, SplineTrack};
use crate::automation::{Automation, AutomationSource};
use crate::burst::{BurstEmitter, EmissionProfile};
use crate::control::sgolay::{DesignError, VelocityEstimator};
use crate::control::spline::CardinalSpline;
use crate::control::Value;
use crate::engine::{Engine, SoundPool, SoundUnit, VoiceBackend};

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse spec document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("automation `{name}`: spline needs at least one control point")]
    EmptySpline { name: String },
    #[error("automation `{name}`: time modulation must be scalar-valued")]
    VectorTimeModulation { name: String },
    #[error("burst `{name}`: {field} must be a probability in [0, 1], got {value}")]
    ProbabilityRange {
        name: String,
        field: &'static str,
        value: f64,
    },
    #[error("burst `{name}`: needs one or two states, got {count}")]
    BurstStates { name: String, count: usize },
    #[error("voice group `{name}`: needs at least one voice")]
    EmptyGroup { name: String },
    #[error("pool `{name}`: no usable sounds")]
    EmptyPool { name: String },
    #[error("sound `{name}`: velocity filter: {source}")]
    VelocityFilter { name: String, source: DesignError },
}

/// A parameter that may be a scalar or a 3-vector, decided by the config.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Vector([f64; 3]),
}

impl ParamValue {
    pub fn is_scalar(&self) -> bool {
        matches!(self, ParamValue::Scalar(_))
    }
}

impl From<ParamValue> for Value {
    fn from(p: ParamValue) -> Self {
        match p {
            ParamValue::Scalar(s) => Value::Scalar(s),
            ParamValue::Vector(v) => Value::Vec3(Vector3::from(v)),
        }
    }
}

/// Global engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigSpec {
    /// Backend clock ticks per second.
    pub clock_rate: f64,
    /// Maximum randomized start delay, in seconds.
    pub start_jitter: f64,
    /// Velocity filter window, in samples.
    pub velocity_filter: usize,
}

impl Default for ConfigSpec {
    fn default() -> Self {
        Self {
            clock_rate: 48_000.0,
            start_jitter: 0.01,
            velocity_filter: VelocityEstimator::DEFAULT_TAPS,
        }
    }
}

/// A pool of voice slots shared by the transient sounds that name it.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default = "default_voices")]
    pub voices: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoundSpec {
    pub name: String,
    /// Reference handed to the backend at allocation (typically a file name).
    pub sound: String,
    /// Base gain in dB.
    #[serde(default)]
    pub gain: f64,
    #[serde(default = "default_pitch")]
    pub pitch: f64,
    #[serde(default)]
    pub position: [f64; 3],
    /// Lowpass cutoff in Hz; absent means no filter on this sound.
    #[serde(default)]
    pub filter: Option<f64>,
    #[serde(default)]
    pub transient: bool,
    /// Voice group transient instances draw their slots from.
    #[serde(default)]
    pub group: Option<String>,
    /// Automation templates attached at startup.
    #[serde(default)]
    pub automation: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    pub sounds: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationSpec {
    pub name: String,
    /// Attribute tag the output is summed into.
    #[serde(default = "default_attr")]
    pub attr: String,
    #[serde(flatten)]
    pub kind: AutomationKind,
    /// Optional nested automation that scales this one's clock.
    #[serde(default)]
    pub time: Option<Box<AutomationSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AutomationKind {
    Sine {
        frequency: ParamValue,
        min: ParamValue,
        max: ParamValue,
        #[serde(default)]
        phase: f64,
    },
    Spline {
        points: Vec<ParamValue>,
        #[serde(default = "default_rate")]
        rate: f64,
        #[serde(default, rename = "loop")]
        looping: bool,
        #[serde(default = "default_tension")]
        tension: f64,
        #[serde(default)]
        continuity: f64,
        #[serde(default)]
        bias: f64,
    },
    Random {
        range: [ParamValue; 2],
        rate: f64,
    },
}

impl AutomationKind {
    /// Does every parameter stay scalar? Time modulators must.
    pub fn is_scalar(&self) -> bool {
        match self {
            AutomationKind::Sine {
                frequency, min, max, ..
            } => frequency.is_scalar() && min.is_scalar() && max.is_scalar(),
            AutomationKind::Spline { points, .. } => points.iter().all(ParamValue::is_scalar),
            AutomationKind::Random { range, .. } => range.iter().all(ParamValue::is_scalar),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BurstSpec {
    pub name: String,
    pub pool: String,
    /// Per-unit-time switching probabilities: idle->active, active->idle.
    #[serde(default = "default_switching")]
    pub switching: [f64; 2],
    pub states: Vec<BurstStateSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BurstStateSpec {
    /// Per-unit-time emission probability while in this state.
    pub rate: f64,
    /// Gain range in dB.
    pub gain: [f64; 2],
    /// Spatial bounding box `[min_xyz, max_xyz]`; the last state that
    /// declares one defines the (shared) box.
    pub space: Option<[[f64; 3]; 2]>,
}

/// A full engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSpec {
    #[serde(default)]
    pub config: ConfigSpec,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub sounds: Vec<SoundSpec>,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub automations: Vec<AutomationSpec>,
    #[serde(default)]
    pub bursts: Vec<BurstSpec>,
}

fn default_voices() -> usize {
    8
}

fn default_pitch() -> f64 {
    1.0
}

fn default_attr() -> String {
    "time".to_string()
}

fn default_rate() -> f64 {
    1.0
}

fn default_tension() -> f64 {
    -0.5
}

fn default_switching() -> [f64; 2] {
    [0.0, 1.0]
}

/// One entity that failed to construct, with the reason. The rest of the
/// configuration is unaffected.
#[derive(Debug)]
pub struct SkippedEntity {
    pub kind: &'static str,
    pub name: String,
    pub error: SpecError,
}

/// Outcome of an engine build: which entities were skipped and why,
/// aggregated and reported once instead of swallowed at each call site.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub skipped: Vec<SkippedEntity>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, kind: &'static str, name: &str, error: SpecError) {
        self.skipped.push(SkippedEntity {
            kind,
            name: name.to_string(),
            error,
        });
    }
}

impl AutomationSpec {
    pub fn build(&self, rng: &mut impl Rng) -> Result<Automation, SpecError> {
        let source = match &self.kind {
            AutomationKind::Sine {
                frequency,
                min,
                max,
                phase,
            } => AutomationSource::Sine(Sine::new(
                (*frequency).into(),
                (*min).into(),
                (*max).into(),
                *phase,
            )),
            AutomationKind::Spline {
                points,
                rate,
                looping,
                tension,
                continuity,
                bias,
            } => {
                if points.is_empty() {
                    return Err(SpecError::EmptySpline {
                        name: self.name.clone(),
                    });
                }
                let points: Vec<Value> = points.iter().map(|&p| p.into()).collect();
                let curve = CardinalSpline::with_shape(points, *tension, *continuity, *bias);
                AutomationSource::Spline(SplineTrack::new(curve, *rate, *looping))
            }
            AutomationKind::Random { range, rate } => AutomationSource::RandomWalk(
                RandomWalk::new(range[0].into(), range[1].into(), *rate, rng),
            ),
        };

        let mut automation = Automation::new(&self.name, &self.attr, source);
        if let Some(time) = &self.time {
            if !time.kind.is_scalar() {
                return Err(SpecError::VectorTimeModulation {
                    name: self.name.clone(),
                });
            }
            automation = automation.with_time_modulation(time.build(rng)?);
        }
        Ok(automation)
    }
}

fn probability(name: &str, field: &'static str, value: f64) -> Result<f64, SpecError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SpecError::ProbabilityRange {
            name: name.to_string(),
            field,
            value,
        })
    }
}

impl BurstSpec {
    pub fn build(&self) -> Result<BurstEmitter, SpecError> {
        let p_activate = probability(&self.name, "switching", self.switching[0])?;
        let p_deactivate = probability(&self.name, "switching", self.switching[1])?;

        if self.states.is_empty() || self.states.len() > 2 {
            return Err(SpecError::BurstStates {
                name: self.name.clone(),
                count: self.states.len(),
            });
        }

        let mut profiles = Vec::with_capacity(2);
        for state in &self.states {
            profiles.push(EmissionProfile {
                rate: probability(&self.name, "rate", state.rate)?,
                gain_lo: state.gain[0],
                gain_hi: state.gain[1],
            });
        }
        // A single declared state serves both regimes.
        if profiles.len() == 1 {
            profiles.push(profiles[0]);
        }

        let space = self
            .states
            .iter()
            .filter_map(|state| state.space)
            .last()
            .map(|[lo, hi]| (Vector3::from(lo), Vector3::from(hi)))
            .unwrap_or((Vector3::zeros(), Vector3::zeros()));

        Ok(BurstEmitter::new(
            &self.name,
            &self.pool,
            (p_activate, p_deactivate),
            [profiles[0], profiles[1]],
            space,
        ))
    }
}

impl SoundSpec {
    pub fn build(&self, velocity_taps: usize) -> Result<SoundUnit, SpecError> {
        let estimator =
            VelocityEstimator::new(velocity_taps).map_err(|source| SpecError::VelocityFilter {
                name: self.name.clone(),
                source,
            })?;

        let mut unit = SoundUnit::new(&self.name, &self.sound)
            .with_gain(self.gain)
            .with_pitch(self.pitch)
            .with_position(Vector3::from(self.position))
            .with_transient(self.transient)
            .with_velocity_filter(estimator);
        if let Some(cutoff) = self.filter {
            unit = unit.with_filter(cutoff);
        }
        if let Some(group) = &self.group {
            unit = unit.with_group(group);
        }
        Ok(unit)
    }
}

impl EngineSpec {
    /// Parse a single TOML document.
    pub fn from_toml_str(doc: &str) -> Result<Self, SpecError> {
        Ok(toml::from_str(doc)?)
    }

    /// Parse several TOML documents, with later ones layered over earlier
    /// ones table-by-table (leaf values, including arrays, replace).
    pub fn from_toml_layers(docs: &[&str]) -> Result<Self, SpecError> {
        let mut merged = toml::Value::Table(Default::default());
        for doc in docs {
            let value: toml::Value = toml::from_str(doc)?;
            merge_value(&mut merged, value);
        }
        Ok(merged.try_into()?)
    }

    /// Build a fresh engine over `backend` from this configuration.
    pub fn build<B: VoiceBackend>(&self, backend: B) -> (Engine<B>, BuildReport) {
        let mut engine = Engine::new(backend);
        let report = self.populate(&mut engine);
        (engine, report)
    }

    /// Populate an existing (typically seeded) engine from this
    /// configuration, entity by entity.
    pub fn populate<B: VoiceBackend>(&self, engine: &mut Engine<B>) -> BuildReport {
        let mut report = BuildReport::default();

        engine.set_start_jitter((self.config.start_jitter * self.config.clock_rate) as u64);

        for group in &self.groups {
            if group.voices == 0 {
                report.skip(
                    "group",
                    &group.name,
                    SpecError::EmptyGroup {
                        name: group.name.clone(),
                    },
                );
                continue;
            }
            engine.add_group(&group.name, group.voices);
        }

        for sound in &self.sounds {
            if let Some(group) = &sound.group {
                if !engine.has_group(group) {
                    warn!(
                        sound = %sound.name,
                        group = %group,
                        "sound references non-existent voice group"
                    );
                }
            }
            match sound.build(self.config.velocity_filter) {
                Ok(unit) => engine.add_sound(unit),
                Err(error) => report.skip("sound", &sound.name, error),
            }
        }

        for pool in &self.pools {
            let sounds: Vec<String> = pool
                .sounds
                .iter()
                .filter(|sound| {
                    let known = engine.unit(sound).is_some();
                    if !known {
                        warn!(pool = %pool.name, sound = %sound, "tried to add non-existent sound to pool");
                    }
                    known
                })
                .cloned()
                .collect();
            if sounds.is_empty() {
                report.skip(
                    "pool",
                    &pool.name,
                    SpecError::EmptyPool {
                        name: pool.name.clone(),
                    },
                );
                continue;
            }
            engine.add_pool(SoundPool::new(&pool.name, sounds));
        }

        for automation in &self.automations {
            match automation.build(engine.rng_mut()) {
                Ok(built) => engine.add_automation(built),
                Err(error) => report.skip("automation", &automation.name, error),
            }
        }

        for burst in &self.bursts {
            match burst.build() {
                Ok(built) => engine.add_burst(built),
                Err(error) => report.skip("burst", &burst.name, error),
            }
        }

        // Startup attachments declared on the sounds themselves.
        let mut attachment_seq = 0usize;
        for sound in &self.sounds {
            for automation in &sound.automation {
                attachment_seq += 1;
                let attachment = format!("{automation}_{attachment_seq:06}");
                debug!(sound = %sound.name, automation = %automation, "attaching startup automation");
                engine.attach_automation(&sound.name, automation, &attachment);
            }
        }

        if !report.is_clean() {
            warn!(
                skipped = report.skipped.len(),
                "configuration entities were skipped"
            );
            for skipped in &report.skipped {
                warn!(kind = skipped.kind, name = %skipped.name, error = %skipped.error, "skipped entity");
            }
        }
        report
    }
}

fn merge_value(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn minimal_document_parses_with_defaults() {
        let spec = EngineSpec::from_toml_str("").unwrap();
        assert_eq!(spec.config.clock_rate, 48_000.0);
        assert_eq!(spec.config.velocity_filter, 13);
        assert!(spec.sounds.is_empty());
    }

    #[test]
    fn automation_kinds_deserialize_from_flat_tables() {
        let spec = EngineSpec::from_toml_str(
            r#"
            [[automations]]
            name = "wobble"
            attr = "gain"
            type = "sine"
            frequency = 0.25
            min = -6.0
            max = 0.0

            [[automations]]
            name = "drift"
            attr = "position"
            type = "random"
            range = [[-10.0, 0.0, -10.0], [10.0, 5.0, 10.0]]
            rate = 2.0

            [[automations]]
            name = "sweep"
            attr = "filter"
            type = "spline"
            points = [200.0, 2000.0, 400.0]
            rate = 0.5
            loop = true
            "#,
        )
        .unwrap();
        assert_eq!(spec.automations.len(), 3);
        assert!(matches!(
            spec.automations[0].kind,
            AutomationKind::Sine { .. }
        ));
        assert!(!spec.automations[1].kind.is_scalar());
        assert!(spec.automations[2].kind.is_scalar());
    }

    #[test]
    fn nested_time_modulation_parses() {
        let spec = EngineSpec::from_toml_str(
            r#"
            [[automations]]
            name = "breathing"
            attr = "gain"
            type = "sine"
            frequency = 1.0
            min = -12.0
            max = 0.0
            time = { name = "clock", type = "sine", frequency = 0.1, min = 0.5, max = 2.0 }
            "#,
        )
        .unwrap();
        let automation = &spec.automations[0];
        assert!(automation.time.is_some());
        let built = automation.build(&mut SmallRng::seed_from_u64(1)).unwrap();
        assert_eq!(built.name(), "breathing");
    }

    #[test]
    fn vector_time_modulation_is_rejected() {
        let spec = AutomationSpec {
            name: "bad".into(),
            attr: "gain".into(),
            kind: AutomationKind::Sine {
                frequency: ParamValue::Scalar(1.0),
                min: ParamValue::Scalar(0.0),
                max: ParamValue::Scalar(1.0),
                phase: 0.0,
            },
            time: Some(Box::new(AutomationSpec {
                name: "clock".into(),
                attr: "time".into(),
                kind: AutomationKind::Random {
                    range: [
                        ParamValue::Vector([0.0; 3]),
                        ParamValue::Vector([1.0, 1.0, 1.0]),
                    ],
                    rate: 1.0,
                },
                time: None,
            })),
        };
        let err = spec.build(&mut SmallRng::seed_from_u64(2)).unwrap_err();
        assert!(matches!(err, SpecError::VectorTimeModulation { .. }));
    }

    #[test]
    fn empty_spline_is_rejected() {
        let spec = AutomationSpec {
            name: "flat".into(),
            attr: "gain".into(),
            kind: AutomationKind::Spline {
                points: Vec::new(),
                rate: 1.0,
                looping: false,
                tension: -0.5,
                continuity: 0.0,
                bias: 0.0,
            },
            time: None,
        };
        let err = spec.build(&mut SmallRng::seed_from_u64(3)).unwrap_err();
        assert!(matches!(err, SpecError::EmptySpline { .. }));
    }

    #[test]
    fn burst_probabilities_are_validated() {
        let spec = BurstSpec {
            name: "storm".into(),
            pool: "rain".into(),
            switching: [0.5, 1.5],
            states: vec![BurstStateSpec::default()],
        };
        assert!(matches!(
            spec.build(),
            Err(SpecError::ProbabilityRange { value, .. }) if value == 1.5
        ));
    }

    #[test]
    fn single_burst_state_serves_both_regimes() {
        let spec = BurstSpec {
            name: "storm".into(),
            pool: "rain".into(),
            switching: [0.1, 0.2],
            states: vec![BurstStateSpec {
                rate: 0.5,
                gain: [-20.0, -10.0],
                space: Some([[-1.0, 0.0, -1.0], [1.0, 0.0, 1.0]]),
            }],
        };
        let burst = spec.build().unwrap();
        assert_eq!(burst.pool(), "rain");
    }

    #[test]
    fn layered_documents_override_scalars_and_keep_the_rest() {
        let base = r#"
            [config]
            clock_rate = 44100.0
            start_jitter = 0.02

            [[sounds]]
            name = "wind"
            sound = "wind.wav"
        "#;
        let overlay = r#"
            [config]
            start_jitter = 0.5
        "#;
        let spec = EngineSpec::from_toml_layers(&[base, overlay]).unwrap();
        assert_eq!(spec.config.clock_rate, 44100.0);
        assert_eq!(spec.config.start_jitter, 0.5);
        assert_eq!(spec.sounds.len(), 1);
    }

    #[test]
    fn parse_errors_surface_as_spec_errors() {
        let err = EngineSpec::from_toml_str("this is not toml at all [").unwrap_err();
        assert!(matches!(err, SpecError::Parse(_)));
    }
}
