use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use switchyard_types::models::UpstreamConfig;
use switchyard_types::{Channel, ErrorKind, GatewayError, Provider, ProxyRequest, ProxyResponse};

use crate::error::AppResult;
use crate::proxy::common::sanitize_error::{sanitize_upstream_error, truncate_for_log};
use crate::proxy::mappers::{Origin, ProtocolAdapter};
use crate::proxy::registry::fingerprint;

/// Raw upstream bodies are logged up to this many characters.
const LOG_BODY_LIMIT: usize = 500;

/// Shared client with connect timeout; per-call deadlines are applied per
/// request.
pub fn build_http_client(config: &UpstreamConfig) -> AppResult<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?)
}

/// Base URL for a call: the channel override when it parses, the provider
/// URL otherwise. No trailing slash.
pub fn resolve_base_url(provider: &Provider, channel: &Channel) -> String {
    if let Some(endpoint) = channel.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if url::Url::parse(endpoint).is_ok() {
            return endpoint.trim_end_matches('/').to_string();
        }
        tracing::warn!("Channel {} has an invalid endpoint override, using provider URL", channel.id);
    }
    provider.base_url.trim_end_matches('/').to_string()
}

pub(crate) fn map_transport_error(err: &reqwest::Error, channel_id: &str) -> GatewayError {
    tracing::warn!("Upstream transport error on channel {}: {}", channel_id, err);
    if err.is_timeout() {
        GatewayError::new(ErrorKind::UpstreamTimeout, "Upstream request timed out")
    } else if err.is_decode() {
        GatewayError::translation("Upstream body could not be decoded")
    } else {
        GatewayError::new(ErrorKind::UpstreamUnavailable, "Upstream unreachable")
    }
}

pub struct UpstreamClient {
    http_client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> AppResult<Self> {
        let http_client = build_http_client(&config)?;
        Ok(Self { http_client, config })
    }

    /// Use a pre-built client (shared pools, tests).
    pub fn with_client(http_client: Client, config: UpstreamConfig) -> Self {
        Self { http_client, config }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.stream_idle_timeout_secs)
    }

    /// Send the translated request; resolves once response headers arrive.
    /// Non-success answers are classified and returned as errors.
    async fn send(
        &self,
        adapter: &dyn ProtocolAdapter,
        provider: &Provider,
        channel: &Channel,
        request: &ProxyRequest,
    ) -> Result<Response, GatewayError> {
        let url = adapter.endpoint_url(&resolve_base_url(provider, channel), request);
        let headers = adapter.auth_headers(&channel.credential)?;
        let body = adapter.translate_request(request)?;

        tracing::debug!(
            "→ {} channel={} key={} model={} stream={}",
            provider.id,
            channel.id,
            fingerprint(&channel.credential),
            request.model,
            request.stream
        );

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, &channel.id))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        Err(classify_failure(adapter, channel, status, &raw))
    }

    /// Buffered call: send, read the whole body, translate. `timeout` bounds
    /// the entire exchange.
    pub async fn execute(
        &self,
        adapter: &dyn ProtocolAdapter,
        provider: &Provider,
        channel: &Channel,
        request: &ProxyRequest,
        timeout: Duration,
    ) -> Result<ProxyResponse, GatewayError> {
        let exchange = async {
            let response = self.send(adapter, provider, channel, request).await?;
            let status = response.status().as_u16();
            let raw = response.text().await.map_err(|e| map_transport_error(&e, &channel.id))?;
            Ok::<_, GatewayError>((status, raw))
        };

        let (status, raw) = tokio::time::timeout(timeout, exchange).await.map_err(|_| {
            tracing::warn!("Upstream call on channel {} exceeded {:?}", channel.id, timeout);
            GatewayError::new(ErrorKind::UpstreamTimeout, "Upstream request timed out")
        })??;

        if adapter.is_error_response(status, &raw).is_some() {
            return Err(classify_failure(adapter, channel, status, &raw));
        }

        let body: Value = serde_json::from_str(&raw).map_err(|e| {
            tracing::warn!(
                "Unparseable body from channel {}: {} ({})",
                channel.id,
                e,
                truncate_for_log(&raw, LOG_BODY_LIMIT)
            );
            GatewayError::translation("Upstream returned a malformed body")
        })?;

        let origin = Origin { provider: provider.id.clone(), channel_id: channel.id.clone() };
        adapter.translate_response(&body, &origin)
    }

    /// Streaming call: returns the response once headers arrive within
    /// `timeout`. The body is consumed by the caller.
    pub async fn open_stream(
        &self,
        adapter: &dyn ProtocolAdapter,
        provider: &Provider,
        channel: &Channel,
        request: &ProxyRequest,
        timeout: Duration,
    ) -> Result<Response, GatewayError> {
        tokio::time::timeout(timeout, self.send(adapter, provider, channel, request))
            .await
            .map_err(|_| {
                tracing::warn!("Upstream stream on channel {} did not open within {:?}", channel.id, timeout);
                GatewayError::new(ErrorKind::UpstreamTimeout, "Upstream request timed out")
            })?
    }
}

fn classify_failure(adapter: &dyn ProtocolAdapter, channel: &Channel, status: u16, raw: &str) -> GatewayError {
    let kind = adapter
        .is_error_response(status, raw)
        .or_else(|| ErrorKind::from_status_code(status))
        .unwrap_or(ErrorKind::UpstreamServerError);

    tracing::warn!(
        "Upstream error on channel {} (HTTP {}, {}): {}",
        channel.id,
        status,
        kind,
        truncate_for_log(raw, LOG_BODY_LIMIT)
    );

    GatewayError::new(kind, sanitize_upstream_error(status, raw))
}
