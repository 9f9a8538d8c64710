//! HTTP dispatch to upstream providers.

mod client;

#[cfg(test)]
mod tests;

pub(crate) use client::map_transport_error;
pub use client::{build_http_client, resolve_base_url, UpstreamClient};
