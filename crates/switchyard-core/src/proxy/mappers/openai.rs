//! OpenAI chat-completions adapter. DeepSeek speaks the same wire format.

use reqwest::header::HeaderMap;
use serde_json::{json, Map, Value};
use switchyard_types::models::Credential;
use switchyard_types::protocol::FinishReason;
use switchyard_types::{
    ErrorKind, GatewayError, ProviderFamily, ProxyRequest, ProxyResponse, ProxyResponseChunk, Usage,
};

use super::{classify_status, header, json_u64, parse_event_json, Origin, ProtocolAdapter};
use crate::proxy::common::SseEvent;

pub struct OpenAiAdapter {
    family: ProviderFamily,
}

impl OpenAiAdapter {
    pub fn openai() -> Self {
        Self { family: ProviderFamily::OpenAI }
    }

    pub fn deepseek() -> Self {
        Self { family: ProviderFamily::DeepSeek }
    }
}

fn map_finish_reason(raw: &str) -> FinishReason {
    match raw {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        _ => FinishReason::Other,
    }
}

fn parse_usage(value: &Value) -> Option<Usage> {
    let usage = value.get("usage").filter(|u| u.is_object())?;
    let prompt = json_u64(usage, "prompt_tokens");
    let completion = json_u64(usage, "completion_tokens");
    let mut parsed = Usage::new(prompt, completion);
    parsed.total_tokens = parsed.total_tokens.max(json_u64(usage, "total_tokens"));
    Some(parsed)
}

/// Error object embedded in a body (`{"error": {...}}`).
fn embedded_error_kind(body: &Value) -> Option<ErrorKind> {
    let error = body.get("error").filter(|e| !e.is_null())?;
    let code = error.get("code").and_then(Value::as_str).unwrap_or_default();
    let kind = error.get("type").and_then(Value::as_str).unwrap_or_default();
    Some(match (code, kind) {
        ("invalid_api_key", _) | (_, "authentication_error") => ErrorKind::InvalidCredential,
        (_, "server_error") => ErrorKind::UpstreamServerError,
        _ => ErrorKind::UpstreamClientError,
    })
}

impl ProtocolAdapter for OpenAiAdapter {
    fn family(&self) -> ProviderFamily {
        self.family
    }

    fn endpoint_url(&self, base_url: &str, _request: &ProxyRequest) -> String {
        format!("{}/chat/completions", base_url)
    }

    fn auth_headers(&self, credential: &Credential) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        let (name, value) = header("authorization", &format!("Bearer {}", credential.expose()))?;
        headers.insert(name, value);
        Ok(headers)
    }

    fn translate_request(&self, request: &ProxyRequest) -> Result<Value, GatewayError> {
        let mut body = Map::new();
        body.insert("model".into(), json!(request.model));
        body.insert("messages".into(), serde_json::to_value(&request.messages).map_err(|e| {
            GatewayError::translation(format!("Failed to encode messages: {}", e))
        })?);
        if let Some(temperature) = request.temperature {
            body.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            body.insert("max_tokens".into(), json!(max_tokens));
        }
        body.insert("stream".into(), json!(request.stream));
        if request.stream {
            body.insert("stream_options".into(), json!({ "include_usage": true }));
        }
        Ok(Value::Object(body))
    }

    fn translate_response(&self, body: &Value, origin: &Origin) -> Result<ProxyResponse, GatewayError> {
        let choice = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| GatewayError::translation("Response has no choices"))?;

        let content = choice
            .pointer("/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let finish_reason =
            choice.get("finish_reason").and_then(Value::as_str).map(map_finish_reason);

        Ok(ProxyResponse {
            content,
            finish_reason,
            usage: parse_usage(body).unwrap_or_default(),
            provider: origin.provider.clone(),
            channel_id: origin.channel_id.clone(),
        })
    }

    fn translate_stream_chunk(
        &self,
        event: &SseEvent,
        origin: &Origin,
    ) -> Result<Option<ProxyResponseChunk>, GatewayError> {
        let value = parse_event_json(event)?;
        if let Some(kind) = embedded_error_kind(&value) {
            return Err(GatewayError::new(kind, "Upstream reported an error mid-stream"));
        }

        let choice = value.get("choices").and_then(Value::as_array).and_then(|c| c.first());
        let delta = choice
            .and_then(|c| c.pointer("/delta/content"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let finish_reason = choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(Value::as_str)
            .map(map_finish_reason);
        let usage = parse_usage(&value);

        if delta.is_empty() && finish_reason.is_none() && usage.is_none() {
            return Ok(None);
        }

        Ok(Some(ProxyResponseChunk {
            delta: delta.to_string(),
            finish_reason,
            usage,
            provider: origin.provider.clone(),
            channel_id: origin.channel_id.clone(),
        }))
    }

    fn is_error_response(&self, status: u16, body: &str) -> Option<ErrorKind> {
        if let Some(kind) = classify_status(status, body) {
            return Some(kind);
        }
        serde_json::from_str::<Value>(body).ok().as_ref().and_then(embedded_error_kind)
    }
}
