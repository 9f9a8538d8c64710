//! Read-through cache of a tenant's active channels.
//!
//! Keyed by (tenant, provider filter). Entries expire after the TTL and are
//! dropped eagerly on every registry write that touches the tenant. Each
//! entry remembers the generation it was fetched under; an entry from an
//! older generation is a miss even if a racing insert landed it after the
//! invalidation.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_types::{Channel, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    tenant_id: String,
    provider_id: Option<String>,
}

struct CacheEntry {
    channels: Arc<[Channel]>,
    fetched_at: Instant,
    generation: u64,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, generation: u64) -> bool {
        self.generation == generation && self.fetched_at.elapsed() < ttl
    }
}

pub struct CredentialCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    /// Bumped by every invalidation
    generation: AtomicU64,
}

impl CredentialCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl, generation: AtomicU64::new(0) }
    }

    fn key(tenant_id: &str, provider_id: Option<&str>) -> CacheKey {
        CacheKey { tenant_id: tenant_id.to_string(), provider_id: provider_id.map(str::to_string) }
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Fresh entry of the current generation, if any.
    pub fn get(&self, tenant_id: &str, provider_id: Option<&str>) -> Option<Arc<[Channel]>> {
        let key = Self::key(tenant_id, provider_id);
        let generation = self.generation();
        let entry = self.entries.get(&key)?;
        if entry.is_fresh(self.ttl, generation) {
            return Some(Arc::clone(&entry.channels));
        }
        drop(entry);
        self.entries.remove_if(&key, |_, e| !e.is_fresh(self.ttl, generation));
        None
    }

    /// Store a list fetched under `generation`.
    pub(super) fn store(
        &self,
        tenant_id: &str,
        provider_id: Option<&str>,
        channels: Arc<[Channel]>,
        generation: u64,
    ) {
        self.entries.insert(
            Self::key(tenant_id, provider_id),
            CacheEntry { channels, fetched_at: Instant::now(), generation },
        );
    }

    /// Return the cached list or run `fetch` and store its result.
    /// Failed fetches are not cached.
    pub fn get_or_fetch<F>(
        &self,
        tenant_id: &str,
        provider_id: Option<&str>,
        fetch: F,
    ) -> Result<Arc<[Channel]>, GatewayError>
    where
        F: FnOnce() -> Result<Vec<Channel>, GatewayError>,
    {
        if let Some(hit) = self.get(tenant_id, provider_id) {
            return Ok(hit);
        }

        let generation = self.generation();
        let channels: Arc<[Channel]> = fetch()?.into();
        if self.generation() == generation {
            self.store(tenant_id, provider_id, Arc::clone(&channels), generation);
        }
        Ok(channels)
    }

    /// Drop the provider-specific and the unfiltered entry of a tenant.
    pub fn invalidate(&self, tenant_id: &str, provider_id: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.remove(&Self::key(tenant_id, Some(provider_id)));
        self.entries.remove(&Self::key(tenant_id, None));
    }

    pub fn invalidate_tenant(&self, tenant_id: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.retain(|k, _| k.tenant_id != tenant_id);
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
