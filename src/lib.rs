pub mod automation; // Named automation signals and per-attribute aggregation
pub mod burst; // Two-state Markov burst triggering
pub mod control; // Control-rate interpolation and filtering primitives
pub mod engine;
pub mod spec; // Declarative entity descriptors and construction

/// Hard floor for any gain pushed to a voice, in dB.
pub const MIN_GAIN_DB: f64 = -120.0;
/// Gains are never allowed above unity.
pub const MAX_GAIN_DB: f64 = 0.0;
/// Cutoffs above this are treated as "filter bypassed" and not sent to voices.
pub const FILTER_BYPASS_HZ: f64 = 20_000.0;
