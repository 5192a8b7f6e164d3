//! Stochastic burst triggering.
//!
//! A two-state (Gilbert) Markov chain flips an emitter between a quiet and a
//! busy regime; each regime carries its own emission rate and gain range.
//! The result is the clustered, bursty triggering of natural ambiences
//! (rain squalls, insect choruses, distant traffic) rather than a flat
//! Poisson drizzle.

/// The two-state Markov chain.
pub mod chain;
/// Trigger generation on top of the chain.
pub mod emitter;

pub use chain::{per_tick_probability, BurstState, GilbertChain};
pub use emitter::{BurstEmitter, EmissionProfile, Trigger};
