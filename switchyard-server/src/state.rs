//! Application State
//!
//! Shared handle to the gateway for every handler.

use std::sync::Arc;
use std::time::Instant;

use switchyard_core::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub gateway: Arc<Gateway>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { inner: Arc::new(AppStateInner { gateway, started_at: Instant::now() }) }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
