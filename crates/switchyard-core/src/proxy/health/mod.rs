//! Channel health checking.
//!
//! Two inputs drive a channel's `HealthState`: the outcome signals the
//! request path publishes on the live feed, and periodic probes.
//! A streak of `failure_threshold` failures marks a channel unhealthy; one
//! success (after the optional cooldown) marks it healthy again.

mod monitor;
mod probe;
mod types;

#[cfg(test)]
mod tests;

pub use monitor::HealthChecker;
pub use probe::{ChannelProbe, UpstreamProbe};
pub use types::{HealthFeed, HealthSignal, ProbeResult};
