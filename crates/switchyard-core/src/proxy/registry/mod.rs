//! Provider and channel registry.
//!
//! Channels live in a `DashMap` keyed by id; lookups by tenant go through
//! the credential cache. Every write invalidates the affected cache entries
//! before it returns, so a disabled channel is invisible to the next
//! selection.

mod credential_cache;


use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::models::ChannelStatus;
use switchyard_types::{Channel, ConfigError, Credential, GatewayError, Provider};
use tracing::{debug, info};
use validator::Validate;

use super::mappers::{adapter_for, AdapterSet, ProtocolAdapter};

pub use credential_cache::CredentialCache;

/// Short, stable, non-reversible credential identifier for logs.
pub fn fingerprint(credential: &Credential) -> String {
    let digest = Sha256::digest(credential.expose().as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

pub struct Registry {
    providers: DashMap<String, Arc<Provider>>,
    adapters: AdapterSet,
    channels: DashMap<String, Channel>,
    cache: CredentialCache,
}

impl Registry {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            providers: DashMap::new(),
            adapters: AdapterSet::new(),
            channels: DashMap::new(),
            cache: CredentialCache::new(cache_ttl),
        }
    }

    // ------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------

    /// Register a provider with the adapter of its family.
    pub fn register_provider(&self, provider: Provider) -> Result<(), ConfigError> {
        let adapter = adapter_for(provider.family);
        self.register_provider_with_adapter(provider, adapter)
    }

    /// Register a provider with a specific adapter. Providers are immutable
    /// once registered.
    pub fn register_provider_with_adapter(
        &self,
        provider: Provider,
        adapter: Arc<dyn ProtocolAdapter>,
    ) -> Result<(), ConfigError> {
        provider.validate().map_err(|e| ConfigError::InvalidValue {
            field: format!("providers[{}]", provider.id),
            reason: e.to_string(),
        })?;

        match self.providers.entry(provider.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ConfigError::Duplicate { kind: "provider".into(), id: provider.id })
            },
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                info!("🔌 Registered provider {} ({})", provider.id, provider.family);
                self.adapters.insert(&provider.id, adapter);
                slot.insert(Arc::new(provider));
                Ok(())
            },
        }
    }

    pub fn get_provider(&self, provider_id: &str) -> Result<Arc<Provider>, GatewayError> {
        self.providers
            .get(provider_id)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| GatewayError::not_found(format!("Provider {} not found", provider_id)))
    }

    pub fn adapter(&self, provider_id: &str) -> Result<Arc<dyn ProtocolAdapter>, GatewayError> {
        self.adapters
            .get(provider_id)
            .ok_or_else(|| GatewayError::not_found(format!("No adapter for provider {}", provider_id)))
    }

    pub fn providers(&self) -> Vec<Arc<Provider>> {
        let mut providers: Vec<_> = self.providers.iter().map(|p| Arc::clone(p.value())).collect();
        providers.sort_by(|a, b| a.id.cmp(&b.id));
        providers
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Insert or replace a channel. Its provider must be registered.
    pub fn upsert_channel(&self, channel: Channel) -> Result<(), ConfigError> {
        channel.validate().map_err(|e| ConfigError::InvalidValue {
            field: format!("channels[{}]", channel.id),
            reason: e.to_string(),
        })?;
        if !self.providers.contains_key(&channel.provider_id) {
            return Err(ConfigError::UnknownProvider {
                channel_id: channel.id,
                provider_id: channel.provider_id,
            });
        }

        debug!(
            "Upserting channel {} (tenant {}, provider {}, key {})",
            channel.id,
            channel.tenant_id,
            channel.provider_id,
            fingerprint(&channel.credential)
        );

        let tenant_id = channel.tenant_id.clone();
        let provider_id = channel.provider_id.clone();
        if let Some(previous) = self.channels.insert(channel.id.clone(), channel) {
            self.cache.invalidate(&previous.tenant_id, &previous.provider_id);
        }
        self.cache.invalidate(&tenant_id, &provider_id);
        Ok(())
    }

    pub fn remove_channel(&self, channel_id: &str) -> Option<Channel> {
        let (_, removed) = self.channels.remove(channel_id)?;
        self.cache.invalidate(&removed.tenant_id, &removed.provider_id);
        info!("🗑️ Removed channel {}", channel_id);
        Some(removed)
    }

    pub fn set_channel_status(&self, channel_id: &str, status: ChannelStatus) -> Result<(), GatewayError> {
        let (tenant_id, provider_id) = {
            let mut channel = self
                .channels
                .get_mut(channel_id)
                .ok_or_else(|| GatewayError::not_found(format!("Channel {} not found", channel_id)))?;
            channel.status = status;
            (channel.tenant_id.clone(), channel.provider_id.clone())
        };
        self.cache.invalidate(&tenant_id, &provider_id);
        info!("Channel {} is now {}", channel_id, status);
        Ok(())
    }

    pub fn channel(&self, channel_id: &str) -> Result<Channel, GatewayError> {
        self.channels
            .get(channel_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| GatewayError::not_found(format!("Channel {} not found", channel_id)))
    }

    /// Active channels of a tenant, optionally for one provider, sorted by
    /// id. `NotFound` when there are none.
    pub fn list_channels(&self, tenant_id: &str, provider_id: Option<&str>) -> Result<Vec<Channel>, GatewayError> {
        let mut channels: Vec<Channel> = self
            .channels
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.is_active())
            .filter(|c| provider_id.map_or(true, |p| c.provider_id == p))
            .map(|c| c.value().clone())
            .collect();

        if channels.is_empty() {
            return Err(GatewayError::not_found(match provider_id {
                Some(p) => format!("No active channel for tenant {} and provider {}", tenant_id, p),
                None => format!("No active channel for tenant {}", tenant_id),
            }));
        }
        channels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(channels)
    }

    /// `list_channels` through the credential cache.
    pub fn cached_channels(&self, tenant_id: &str, provider_id: Option<&str>) -> Result<Arc<[Channel]>, GatewayError> {
        self.cache
            .get_or_fetch(tenant_id, provider_id, || self.list_channels(tenant_id, provider_id))
    }

    /// Every channel regardless of tenant or status.
    pub fn channels_snapshot(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.channels.iter().map(|c| c.value().clone()).collect();
        channels.sort_by(|a, b| a.id.cmp(&b.id));
        channels
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }
}
