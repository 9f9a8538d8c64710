//! Test helpers for switchyard-server unit tests.

use std::collections::BTreeSet;

use switchyard_core::Gateway;
use switchyard_types::models::{ChannelStatus, QuotaLimits, TenantQuota};
use switchyard_types::{Channel, Credential, GatewayConfig, Provider, ProviderFamily};

use crate::state::AppState;

/// One OpenAI provider and one channel `c1` for tenant `t1` at `endpoint`.
pub fn test_config(endpoint: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.providers.push(Provider {
        id: "openai".into(),
        name: "OpenAI".into(),
        family: ProviderFamily::OpenAI,
        base_url: "https://api.openai.com/v1".into(),
        models: BTreeSet::from(["gpt-x".to_string()]),
    });
    config.channels.push(Channel {
        id: "c1".into(),
        tenant_id: "t1".into(),
        provider_id: "openai".into(),
        credential: Credential::new("sk-test"),
        endpoint: Some(endpoint.into()),
        models: vec![],
        weight: 1,
        priority: 0,
        rate_limit_per_minute: None,
        status: ChannelStatus::Active,
    });
    config.quotas.push(TenantQuota::new("t1", QuotaLimits::default()));
    config
}

/// Create an `AppState` around a freshly built gateway.
pub fn test_app_state(endpoint: &str) -> AppState {
    let gateway = Gateway::builder(test_config(endpoint)).build().expect("failed to build test gateway");
    AppState::new(gateway)
}
