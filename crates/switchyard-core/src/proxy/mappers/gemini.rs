//! Gemini generateContent adapter.

use reqwest::header::HeaderMap;
use serde_json::{json, Map, Value};
use switchyard_types::models::Credential;
use switchyard_types::protocol::{FinishReason, Role};
use switchyard_types::{
    ErrorKind, GatewayError, ProviderFamily, ProxyRequest, ProxyResponse, ProxyResponseChunk, Usage,
};

use super::{classify_status, header, json_u64, parse_event_json, Origin, ProtocolAdapter};
use crate::proxy::common::SseEvent;

pub struct GeminiAdapter;

fn map_finish_reason(raw: &str) -> FinishReason {
    match raw {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

fn parse_usage(body: &Value) -> Option<Usage> {
    let meta = body.get("usageMetadata")?;
    let mut usage = Usage::new(json_u64(meta, "promptTokenCount"), json_u64(meta, "candidatesTokenCount"));
    usage.total_tokens = usage.total_tokens.max(json_u64(meta, "totalTokenCount"));
    Some(usage)
}

/// Visible text of the first candidate; thought parts are skipped.
fn candidate_text(body: &Value) -> (String, Option<FinishReason>) {
    let candidate = body.get("candidates").and_then(Value::as_array).and_then(|c| c.first());
    let text = candidate
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    let finish = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(Value::as_str)
        .map(map_finish_reason);
    (text, finish)
}

fn embedded_error_kind(body: &Value) -> Option<ErrorKind> {
    let error = body.get("error")?;
    match error.get("status").and_then(Value::as_str) {
        Some("UNAUTHENTICATED" | "PERMISSION_DENIED") => return Some(ErrorKind::InvalidCredential),
        Some("DEADLINE_EXCEEDED") => return Some(ErrorKind::UpstreamTimeout),
        _ => {},
    }
    let code = error.get("code").and_then(Value::as_u64).unwrap_or(500);
    let code = u16::try_from(code).unwrap_or(500);
    Some(ErrorKind::from_status_code(code).unwrap_or(ErrorKind::UpstreamServerError))
}

impl ProtocolAdapter for GeminiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
    }

    fn endpoint_url(&self, base_url: &str, request: &ProxyRequest) -> String {
        if request.stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", base_url, request.model)
        } else {
            format!("{}/models/{}:generateContent", base_url, request.model)
        }
    }

    fn auth_headers(&self, credential: &Credential) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        let (name, value) = header("x-goog-api-key", credential.expose())?;
        headers.insert(name, value);
        Ok(headers)
    }

    fn translate_request(&self, request: &ProxyRequest) -> Result<Value, GatewayError> {
        let system: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| json!({ "text": m.content }))
            .collect();
        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = Map::new();
        body.insert("contents".into(), Value::Array(contents));
        if !system.is_empty() {
            body.insert("systemInstruction".into(), json!({ "parts": system }));
        }

        let mut generation = Map::new();
        if let Some(temperature) = request.temperature {
            generation.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            generation.insert("maxOutputTokens".into(), json!(max_tokens));
        }
        if !generation.is_empty() {
            body.insert("generationConfig".into(), Value::Object(generation));
        }
        Ok(Value::Object(body))
    }

    fn translate_response(&self, body: &Value, origin: &Origin) -> Result<ProxyResponse, GatewayError> {
        if body.get("candidates").and_then(Value::as_array).is_none() {
            return Err(GatewayError::translation("Response has no candidates"));
        }
        let (content, finish_reason) = candidate_text(body);
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

        let (delta, finish_reason) = candidate_text(&value);
        let usage = parse_usage(&value);
        if delta.is_empty() && finish_reason.is_none() && usage.is_none() {
            return Ok(None);
        }
        Ok(Some(ProxyResponseChunk {
            delta,
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

    // streamGenerateContent closes the body after the final candidate.
    fn requires_terminal(&self) -> bool {
        false
    }
}
