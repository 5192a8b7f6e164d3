//! Named, time-varying control signals and their aggregation.
//!
//! An [`Automation`](group::Automation) wraps one signal source (sine,
//! spline, random walk) under a name and an attribute tag; an
//! [`AutomationGroup`](group::AutomationGroup) owns a set of attachments and
//! sums their outputs per attribute every tick. Attaching a template clones
//! it, so each attachment evolves independently.

/// Attachment registry and per-attribute summing.
pub mod group;
/// The signal-producing source variants.
pub mod source;

pub use group::{Automation, AutomationGroup};
pub use source::AutomationSource;

/// Attribute tags with engine-defined meaning. Automations may target any
/// string tag; these are the ones the sound units actually consume.
pub mod attr {
    pub const GAIN: &str = "gain";
    pub const POSITION: &str = "position";
    pub const FILTER: &str = "filter";
    pub const PITCH: &str = "pitch";
}
