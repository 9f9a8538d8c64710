//! Gateway configuration loading.
//!
//! The file is JSON (same layout as `GatewayConfig`). A missing file yields
//! defaults; `SWITCHYARD_*` environment variables override the server and
//! selector basics.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use switchyard_types::models::{GatewayConfig, StrategyKind};
use switchyard_types::ConfigError;
use validator::Validate;

use crate::error::AppResult;

pub const ENV_HOST: &str = "SWITCHYARD_HOST";
pub const ENV_PORT: &str = "SWITCHYARD_PORT";
pub const ENV_LOG_LEVEL: &str = "SWITCHYARD_LOG_LEVEL";
pub const ENV_STRATEGY: &str = "SWITCHYARD_STRATEGY";

/// Load, override and validate the configuration at `path`.
pub fn load_config(path: &Path) -> AppResult<GatewayConfig> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_json::from_str::<GatewayConfig>(&content)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.display());
        GatewayConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

/// Apply overrides from a variable lookup (injected for tests).
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
        config.server.host = host.trim().to_string();
    }
    if let Some(raw) = lookup(ENV_PORT) {
        match raw.trim().parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!("{} is not a valid port: {}", ENV_PORT, raw),
        }
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
        config.server.log_level = level.trim().to_string();
    }
    if let Some(raw) = lookup(ENV_STRATEGY) {
        match serde_json::from_value::<StrategyKind>(serde_json::Value::String(raw.trim().into())) {
            Ok(kind) => config.selector.strategy = kind,
            Err(_) => tracing::warn!("{} names an unknown strategy: {}", ENV_STRATEGY, raw),
        }
    }
}

/// Field validation plus cross-record checks.
pub fn validate_config(config: &GatewayConfig) -> AppResult<()> {
    config.validate()?;

    let mut provider_ids = HashSet::new();
    for provider in &config.providers {
        if !provider_ids.insert(provider.id.as_str()) {
            return Err(ConfigError::Duplicate { kind: "provider".into(), id: provider.id.clone() }
                .into());
        }
    }

    let mut channel_ids = HashSet::new();
    for channel in &config.channels {
        if !channel_ids.insert(channel.id.as_str()) {
            return Err(ConfigError::Duplicate { kind: "channel".into(), id: channel.id.clone() }
                .into());
        }
        if !provider_ids.contains(channel.provider_id.as_str()) {
            return Err(ConfigError::UnknownProvider {
                channel_id: channel.id.clone(),
                provider_id: channel.provider_id.clone(),
            }
            .into());
        }
        if channel.credential.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("channels[{}].credential", channel.id),
                reason: "must not be empty".into(),
            }
            .into());
        }
    }

    let mut tenant_ids = HashSet::new();
    for quota in &config.quotas {
        if !tenant_ids.insert(quota.tenant_id.as_str()) {
            return Err(
                ConfigError::Duplicate { kind: "quota".into(), id: quota.tenant_id.clone() }.into()
            );
        }
    }

    Ok(())
}
