#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use nalgebra::Vector3;

/// A control command from the external command layer (OSC bridge, script,
/// UI). Commands are queued while a tick is in flight and applied strictly
/// between ticks.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Spawn from a sound or pool name.
    Spawn { name: String },
    SetGain { target: String, gain_db: f64, time: f64 },
    SetPitch { target: String, ratio: f64, time: f64 },
    SetPosition {
        target: String,
        position: Vector3<f64>,
        time: f64,
    },
    SetFilter { target: String, cutoff_hz: f64, time: f64 },
    SetMute { target: String, muted: bool },
    AttachAutomation {
        target: String,
        template: String,
        attachment: String,
    },
    DetachAutomation { attachment: String },
    SetBurstEnabled { burst: String, enabled: bool },
}

pub trait CommandReceiver {
    fn pop(&mut self) -> Option<EngineCommand>;
}

#[cfg(feature = "rtrb")]
impl CommandReceiver for Consumer<EngineCommand> {
    fn pop(&mut self) -> Option<EngineCommand> {
        Consumer::pop(self).ok()
    }
}

impl CommandReceiver for std::collections::VecDeque<EngineCommand> {
    fn pop(&mut self) -> Option<EngineCommand> {
        self.pop_front()
    }
}
