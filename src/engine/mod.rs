//! The tick-driven control engine and its collaborators.
//!
//! The engine owns every sound unit, burst emitter and voice pool, advances
//! them once per `tick(dt)`, and pushes the resulting parameter values to a
//! [`VoiceBackend`](backend::VoiceBackend). External commands are applied
//! strictly between ticks, so nothing here locks or re-enters.

/// The narrow capability the audio renderer exposes to the engine.
pub mod backend;
/// Command enum and queue-drain plumbing.
pub mod command;
/// Fixed-capacity voice slot allocation and stealing.
pub mod pool;
/// The engine itself.
pub mod server;
/// Per-sound control state pushed to one voice.
pub mod unit;

pub use backend::{NullBackend, SlotId, VoiceBackend};
pub use command::{CommandReceiver, EngineCommand};
pub use pool::VoicePool;
pub use server::{Engine, SoundPool};
pub use unit::SoundUnit;
