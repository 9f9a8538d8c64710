//! Proxy engine.
//!
//! Request path: quota pre-check, channel selection, adapter translation,
//! upstream dispatch, relay, then one settlement per call (metrics, health
//! signal, quota debit).

pub mod common;
pub mod health;
pub mod mappers;
pub mod metrics;
pub mod orchestrator;
pub mod prometheus;
pub mod quota;
pub mod registry;
pub mod selector;
pub mod upstream;

pub use health::{HealthChecker, ProbeResult};
pub use metrics::MetricsStore;
pub use quota::QuotaEnforcer;
pub use registry::Registry;
pub use selector::{Selection, Selector};
