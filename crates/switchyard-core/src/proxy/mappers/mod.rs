//! Protocol adapters.
//!
//! One adapter per provider family translates canonical requests into the
//! provider's wire JSON and maps responses, stream frames and error bodies
//! back. Adapters are pure: they never perform I/O.

mod anthropic;
mod gemini;
mod openai;

#[cfg(test)]
mod tests;

use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use switchyard_types::models::Credential;
use switchyard_types::{ErrorKind, GatewayError, ProviderFamily, ProxyRequest, ProxyResponse, ProxyResponseChunk};

use super::common::SseEvent;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

/// Attribution stamped onto every translated response and chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub provider: String,
    pub channel_id: String,
}

pub trait ProtocolAdapter: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Full URL for the call. `base_url` has no trailing slash.
    fn endpoint_url(&self, base_url: &str, request: &ProxyRequest) -> String;

    fn auth_headers(&self, credential: &Credential) -> Result<HeaderMap, GatewayError>;

    fn translate_request(&self, request: &ProxyRequest) -> Result<Value, GatewayError>;

    fn translate_response(&self, body: &Value, origin: &Origin) -> Result<ProxyResponse, GatewayError>;

    /// `Ok(None)` for control frames that carry nothing for the caller.
    fn translate_stream_chunk(
        &self,
        event: &SseEvent,
        origin: &Origin,
    ) -> Result<Option<ProxyResponseChunk>, GatewayError>;

    /// Classify an upstream answer as a failure. Also catches providers that
    /// report errors inside a 2xx body.
    fn is_error_response(&self, status: u16, body: &str) -> Option<ErrorKind>;

    fn is_stream_terminal(&self, event: &SseEvent) -> bool {
        event.data.trim() == "[DONE]"
    }

    /// Whether a stream must end with a terminal event; without one the
    /// response was cut off.
    fn requires_terminal(&self) -> bool {
        true
    }
}

/// Adapter for a provider family.
pub fn adapter_for(family: ProviderFamily) -> Arc<dyn ProtocolAdapter> {
    match family {
        ProviderFamily::OpenAI => Arc::new(OpenAiAdapter::openai()),
        ProviderFamily::DeepSeek => Arc::new(OpenAiAdapter::deepseek()),
        ProviderFamily::Anthropic => Arc::new(AnthropicAdapter),
        ProviderFamily::Gemini => Arc::new(GeminiAdapter),
    }
}

/// Provider-id → adapter lookup.
#[derive(Default)]
pub struct AdapterSet {
    adapters: DashMap<String, Arc<dyn ProtocolAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, provider_id: &str, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert(provider_id.to_string(), adapter);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProtocolAdapter>> {
        self.adapters.get(provider_id).map(|a| Arc::clone(a.value()))
    }

    pub fn remove(&self, provider_id: &str) {
        self.adapters.remove(provider_id);
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) fn header(name: &'static str, value: &str) -> Result<(HeaderName, HeaderValue), GatewayError> {
    let value = HeaderValue::from_str(value).map_err(|_| {
        GatewayError::new(ErrorKind::InvalidCredential, "Credential contains invalid header characters")
    })?;
    Ok((HeaderName::from_static(name), value))
}

pub(crate) fn parse_event_json(event: &SseEvent) -> Result<Value, GatewayError> {
    serde_json::from_str(&event.data)
        .map_err(|e| GatewayError::translation(format!("Malformed stream frame: {}", e)))
}

pub(crate) fn json_u64(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Status classification shared by all families; adapters refine it.
pub(crate) fn classify_status(status: u16, body: &str) -> Option<ErrorKind> {
    let kind = ErrorKind::from_status_code(status)?;
    if kind == ErrorKind::UpstreamClientError
        && (body.contains("API_KEY_INVALID") || body.contains("invalid_api_key"))
    {
        return Some(ErrorKind::InvalidCredential);
    }
    Some(kind)
}

/// Chars/4 estimate used when a provider reports no usage.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

pub fn estimate_prompt_tokens(request: &ProxyRequest) -> u64 {
    request.messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}
