//! # Switchyard Core
//!
//! Routing and resilience engine of the Switchyard multi-tenant LLM gateway.
//!
//! ```text
//! switchyard-core/src/proxy/
//! ├── registry/      # providers, channels, credential cache
//! ├── metrics/       # per-channel counters, in-flight guards
//! ├── health/        # health checker, probes, live outcome feed
//! ├── selector/      # eligibility + load-balancing strategies
//! ├── quota/         # tenant quota enforcement
//! ├── mappers/       # protocol adapters (OpenAI, Anthropic, Gemini)
//! ├── upstream/      # HTTP dispatch
//! ├── orchestrator/  # Gateway: complete / test_channel
//! └── prometheus.rs  # process-wide metrics export
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "DashMap guards are dropped explicitly before awaiting"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![cfg_attr(
    test,
    allow(clippy::panic, clippy::float_cmp, clippy::unwrap_used, clippy::expect_used)
)]

pub mod error;
pub mod modules;
pub mod proxy;

pub use error::{AppError, AppResult};
pub use proxy::orchestrator::{Completion, CompletionStream, Gateway, GatewayBuilder};
