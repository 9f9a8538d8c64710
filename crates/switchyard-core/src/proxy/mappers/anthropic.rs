//! Anthropic messages adapter.
//!
//! Streams are typed events: `message_start` carries input usage,
//! `content_block_delta` text, `message_delta` the stop reason and output
//! usage, `message_stop` ends the stream.

use reqwest::header::HeaderMap;
use serde_json::{json, Map, Value};
use switchyard_types::models::Credential;
use switchyard_types::protocol::{FinishReason, Role};
use switchyard_types::{
    ErrorKind, GatewayError, ProviderFamily, ProxyRequest, ProxyResponse, ProxyResponseChunk, Usage,
};

use super::{classify_status, header, json_u64, parse_event_json, Origin, ProtocolAdapter};
use crate::proxy::common::SseEvent;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The messages API requires `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter;

fn map_stop_reason(raw: &str) -> FinishReason {
    match raw {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

fn parse_usage(usage: &Value) -> Usage {
    Usage::new(json_u64(usage, "input_tokens"), json_u64(usage, "output_tokens"))
}

fn error_type_kind(error_type: &str) -> ErrorKind {
    match error_type {
        "authentication_error" | "permission_error" => ErrorKind::InvalidCredential,
        "overloaded_error" | "api_error" => ErrorKind::UpstreamServerError,
        "timeout_error" => ErrorKind::UpstreamTimeout,
        _ => ErrorKind::UpstreamClientError,
    }
}

fn embedded_error_kind(body: &Value) -> Option<ErrorKind> {
    if body.get("type").and_then(Value::as_str) != Some("error") {
        return None;
    }
    let error_type = body.pointer("/error/type").and_then(Value::as_str).unwrap_or_default();
    Some(error_type_kind(error_type))
}

impl ProtocolAdapter for AnthropicAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Anthropic
    }

    fn endpoint_url(&self, base_url: &str, _request: &ProxyRequest) -> String {
        format!("{}/messages", base_url)
    }

    fn auth_headers(&self, credential: &Credential) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        let (name, value) = header("x-api-key", credential.expose())?;
        headers.insert(name, value);
        let (name, value) = header("anthropic-version", ANTHROPIC_VERSION)?;
        headers.insert(name, value);
        Ok(headers)
    }

    fn translate_request(&self, request: &ProxyRequest) -> Result<Value, GatewayError> {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::Assistant { "assistant" } else { "user" };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        if messages.is_empty() {
            return Err(GatewayError::new(
                ErrorKind::InvalidRequest,
                "Anthropic requires at least one non-system message",
            ));
        }

        let mut body = Map::new();
        body.insert("model".into(), json!(request.model));
        body.insert("messages".into(), Value::Array(messages));
        body.insert("max_tokens".into(), json!(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)));
        if !system.is_empty() {
            body.insert("system".into(), json!(system.join("\n\n")));
        }
        if let Some(temperature) = request.temperature {
            body.insert("temperature".into(), json!(temperature));
        }
        if request.stream {
            body.insert("stream".into(), json!(true));
        }
        Ok(Value::Object(body))
    }

    fn translate_response(&self, body: &Value, origin: &Origin) -> Result<ProxyResponse, GatewayError> {
        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::translation("Response has no content blocks"))?;

        let content: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();

        Ok(ProxyResponse {
            content,
            finish_reason: body.get("stop_reason").and_then(Value::as_str).map(map_stop_reason),
            usage: body.get("usage").map(parse_usage).unwrap_or_default(),
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
        let event_type = event
            .event
            .as_deref()
            .or_else(|| value.get("type").and_then(Value::as_str))
            .unwrap_or_default();

        let chunk = |delta: String, finish_reason: Option<FinishReason>, usage: Option<Usage>| {
            ProxyResponseChunk {
                delta,
                finish_reason,
                usage,
                provider: origin.provider.clone(),
                channel_id: origin.channel_id.clone(),
            }
        };

        match event_type {
            "message_start" => {
                let usage = value.pointer("/message/usage").map(parse_usage);
                Ok(usage.map(|u| chunk(String::new(), None, Some(u))))
            },
            "content_block_delta" => {
                let text = value.pointer("/delta/text").and_then(Value::as_str).unwrap_or_default();
                if text.is_empty() {
                    return Ok(None);
                }
                Ok(Some(chunk(text.to_string(), None, None)))
            },
            "message_delta" => {
                let finish = value.pointer("/delta/stop_reason").and_then(Value::as_str).map(map_stop_reason);
                let usage = value.get("usage").map(parse_usage);
                if finish.is_none() && usage.is_none() {
                    return Ok(None);
                }
                Ok(Some(chunk(String::new(), finish, usage)))
            },
            "error" => {
                let error_type = value.pointer("/error/type").and_then(Value::as_str).unwrap_or_default();
                Err(GatewayError::new(error_type_kind(error_type), "Upstream reported an error mid-stream"))
            },
            _ => Ok(None),
        }
    }

    fn is_error_response(&self, status: u16, body: &str) -> Option<ErrorKind> {
        if let Some(kind) = classify_status(status, body) {
            return Some(kind);
        }
        serde_json::from_str::<Value>(body).ok().as_ref().and_then(embedded_error_kind)
    }

    fn is_stream_terminal(&self, event: &SseEvent) -> bool {
        event.event.as_deref() == Some("message_stop")
            || event.data.contains("\"type\":\"message_stop\"")
    }
}
