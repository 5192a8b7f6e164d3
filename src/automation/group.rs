use std::collections::HashMap;

use rand::Rng;

use crate::automation::source::AutomationSource;
use crate::control::value::{ControlValue, Value};

/// A named automation: one source writing into one attribute tag, with an
/// optional nested automation that warps its sense of time.
///
/// Time modulation is recursive but acyclic by construction: the modulator
/// is owned by value, so a cycle cannot be expressed.
#[derive(Debug, Clone)]
pub struct Automation {
    name: String,
    attribute: String,
    source: AutomationSource,
    time_modulation: Option<Box<Automation>>,
}

impl Automation {
    pub fn new(
        name: impl Into<String>,
        attribute: impl Into<String>,
        source: AutomationSource,
    ) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
            source,
            time_modulation: None,
        }
    }

    /// Drive this automation's clock with another automation's output:
    /// the modulator advances on real time, this source advances by
    /// `dt * modulator_output`.
    pub fn with_time_modulation(mut self, modulator: Automation) -> Self {
        self.time_modulation = Some(Box::new(modulator));
        self
    }

    pub fn advance(&mut self, dt: f64, rng: &mut impl Rng) {
        match &mut self.time_modulation {
            None => self.source.advance(dt, rng),
            Some(modulator) => {
                modulator.advance(dt, rng);
                let scale = modulator.output().scalar();
                self.source.advance(dt * scale, rng);
            }
        }
    }

    pub fn output(&self) -> Value {
        self.source.output()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

/// The set of automations attached to one controlled entity, plus the
/// per-attribute sums recomputed each tick.
#[derive(Debug, Clone, Default)]
pub struct AutomationGroup {
    attachments: HashMap<String, Automation>,
    sums: HashMap<String, Value>,
}

impl AutomationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a clone of `template` under `name`. Attaching the same name
    /// twice replaces the previous attachment.
    pub fn attach(&mut self, name: impl Into<String>, template: &Automation) {
        self.attachments.insert(name.into(), template.clone());
    }

    /// Remove an attachment. Detaching a name that is not attached is a
    /// no-op.
    pub fn detach(&mut self, name: &str) {
        self.attachments.remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attachments.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// Advance every attachment and rebuild the per-attribute sums.
    pub fn tick(&mut self, dt: f64, rng: &mut impl Rng) {
        self.sums.clear();
        for automation in self.attachments.values_mut() {
            automation.advance(dt, rng);
            let entry = self
                .sums
                .entry(automation.attribute().to_string())
                .or_insert_with(Value::zero);
            *entry = *entry + automation.output();
        }
    }

    /// Summed contribution for an attribute; zero if nothing writes it.
    pub fn get(&self, attribute: &str) -> Value {
        self.sums.get(attribute).copied().unwrap_or_else(Value::zero)
    }
}
