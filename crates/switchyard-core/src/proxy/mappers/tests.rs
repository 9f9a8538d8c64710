use super::*;
use serde_json::json;
use switchyard_types::protocol::FinishReason;
use switchyard_types::{ChatMessage, Usage};

fn origin() -> Origin {
    Origin { provider: "p1".to_string(), channel_id: "c1".to_string() }
}

fn event(data: Value) -> SseEvent {
    SseEvent { event: None, data: data.to_string() }
}

fn named(name: &str, data: Value) -> SseEvent {
    SseEvent { event: Some(name.to_string()), data: data.to_string() }
}

fn request() -> ProxyRequest {
    ProxyRequest::new("m1", vec![ChatMessage::system("be brief"), ChatMessage::user("hello")])
}

// ============================================================================
// OpenAI / DeepSeek
// ============================================================================

#[test]
fn openai_request_shape() {
    let adapter = OpenAiAdapter::openai();
    let mut req = request().streaming();
    req.max_tokens = Some(16);

    let body = adapter.translate_request(&req).unwrap();
    assert_eq!(body["model"], "m1");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["max_tokens"], 16);
    assert_eq!(body["stream_options"]["include_usage"], true);
    assert_eq!(adapter.endpoint_url("https://api.example.com/v1", &req), "https://api.example.com/v1/chat/completions");
}

#[test]
fn openai_bearer_auth() {
    let headers = OpenAiAdapter::deepseek().auth_headers(&Credential::new("sk-1")).unwrap();
    assert_eq!(headers["authorization"], "Bearer sk-1");
}

#[test]
fn openai_response_translation() {
    let body = json!({
        "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    });
    let resp = OpenAiAdapter::openai().translate_response(&body, &origin()).unwrap();
    assert_eq!(resp.content, "hi");
    assert_eq!(resp.finish_reason, Some(FinishReason::Stop));
    assert_eq!(resp.usage.total_tokens, 7);
    assert_eq!(resp.channel_id, "c1");
}

#[test]
fn openai_missing_choices_is_translation_error() {
    let err = OpenAiAdapter::openai().translate_response(&json!({"id": "x"}), &origin()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TranslationError);
}

#[test]
fn openai_stream_frames() {
    let adapter = OpenAiAdapter::openai();
    let role_only = event(json!({"choices": [{"delta": {"role": "assistant"}}]}));
    assert!(adapter.translate_stream_chunk(&role_only, &origin()).unwrap().is_none());

    let text = event(json!({"choices": [{"delta": {"content": "A"}}]}));
    assert_eq!(adapter.translate_stream_chunk(&text, &origin()).unwrap().unwrap().delta, "A");

    let usage = event(json!({"choices": [], "usage": {"prompt_tokens": 3, "completion_tokens": 4}}));
    let chunk = adapter.translate_stream_chunk(&usage, &origin()).unwrap().unwrap();
    assert_eq!(chunk.usage.unwrap().total_tokens, 7);

    assert!(adapter.is_stream_terminal(&SseEvent { event: None, data: "[DONE]".into() }));
}

#[test]
fn openai_error_in_success_body() {
    let adapter = OpenAiAdapter::openai();
    let body = json!({"error": {"code": "invalid_api_key", "message": "bad"}}).to_string();
    assert_eq!(adapter.is_error_response(200, &body), Some(ErrorKind::InvalidCredential));
    assert_eq!(adapter.is_error_response(200, "{\"choices\":[]}"), None);
    assert_eq!(adapter.is_error_response(503, ""), Some(ErrorKind::UpstreamServerError));
}

// ============================================================================
// Anthropic
// ============================================================================

#[test]
fn anthropic_request_hoists_system() {
    let body = AnthropicAdapter.translate_request(&request()).unwrap();
    assert_eq!(body["system"], "be brief");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["max_tokens"], 4096);
}

#[test]
fn anthropic_system_only_rejected() {
    let req = ProxyRequest::new("m1", vec![ChatMessage::system("x")]);
    let err = AnthropicAdapter.translate_request(&req).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
}

#[test]
fn anthropic_headers() {
    let headers = AnthropicAdapter.auth_headers(&Credential::new("ak-1")).unwrap();
    assert_eq!(headers["x-api-key"], "ak-1");
    assert_eq!(headers["anthropic-version"], "2023-06-01");
}

#[test]
fn anthropic_stream_usage_split_across_events() {
    let adapter = AnthropicAdapter;
    let start = named("message_start", json!({"type": "message_start", "message": {"usage": {"input_tokens": 12, "output_tokens": 1}}}));
    let delta = named("content_block_delta", json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "Hi"}}));
    let end = named("message_delta", json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 30}}));
    let stop = named("message_stop", json!({"type": "message_stop"}));

    let mut usage = Usage::default();
    for ev in [&start, &delta, &end] {
        if let Some(u) = adapter.translate_stream_chunk(ev, &origin()).unwrap().and_then(|c| c.usage) {
            usage.merge_max(&u);
        }
    }
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.completion_tokens, 30);
    assert_eq!(usage.total_tokens, 42);
    assert!(adapter.is_stream_terminal(&stop));
    assert!(!adapter.is_stream_terminal(&delta));
}

#[test]
fn anthropic_stream_error_event() {
    let ev = named("error", json!({"type": "error", "error": {"type": "overloaded_error"}}));
    let err = AnthropicAdapter.translate_stream_chunk(&ev, &origin()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamServerError);
}

#[test]
fn anthropic_response_joins_text_blocks() {
    let body = json!({
        "content": [{"type": "text", "text": "a"}, {"type": "tool_use"}, {"type": "text", "text": "b"}],
        "stop_reason": "max_tokens",
        "usage": {"input_tokens": 2, "output_tokens": 3}
    });
    let resp = AnthropicAdapter.translate_response(&body, &origin()).unwrap();
    assert_eq!(resp.content, "ab");
    assert_eq!(resp.finish_reason, Some(FinishReason::Length));
    assert_eq!(resp.usage.total_tokens, 5);
}

// ============================================================================
// Gemini
// ============================================================================

#[test]
fn gemini_endpoint_depends_on_stream() {
    let req = request();
    assert_eq!(GeminiAdapter.endpoint_url("https://g.example.com/v1beta", &req), "https://g.example.com/v1beta/models/m1:generateContent");
    let req = req.streaming();
    assert_eq!(GeminiAdapter.endpoint_url("https://g.example.com/v1beta", &req), "https://g.example.com/v1beta/models/m1:streamGenerateContent?alt=sse");
}

#[test]
fn gemini_request_roles() {
    let mut req = request();
    req.messages.push(ChatMessage { role: switchyard_types::protocol::Role::Assistant, content: "yo".into() });
    let body = GeminiAdapter.translate_request(&req).unwrap();
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
    assert_eq!(body["contents"][1]["role"], "model");
    assert!(body.get("generationConfig").is_none());
}

#[test]
fn gemini_response_skips_thoughts() {
    let body = json!({
        "candidates": [{"content": {"parts": [{"text": "thinking", "thought": true}, {"text": "answer"}]}, "finishReason": "STOP"}],
        "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10}
    });
    let resp = GeminiAdapter.translate_response(&body, &origin()).unwrap();
    assert_eq!(resp.content, "answer");
    assert_eq!(resp.usage.total_tokens, 10);
}

#[test]
fn gemini_bad_key_is_invalid_credential() {
    let body = json!({"error": {"code": 400, "status": "INVALID_ARGUMENT", "details": [{"reason": "API_KEY_INVALID"}]}}).to_string();
    assert_eq!(GeminiAdapter.is_error_response(400, &body), Some(ErrorKind::InvalidCredential));
}

#[test]
fn adapter_set_lookup() {
    let set = AdapterSet::new();
    set.insert("p1", adapter_for(ProviderFamily::Gemini));
    assert_eq!(set.get("p1").unwrap().family(), ProviderFamily::Gemini);
    assert!(set.get("p2").is_none());
}

#[test]
fn token_estimate_rounds_up() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("abcde"), 2);
}

#[test]
fn only_gemini_streams_end_without_marker() {
    assert!(adapter_for(ProviderFamily::OpenAI).requires_terminal());
    assert!(adapter_for(ProviderFamily::DeepSeek).requires_terminal());
    assert!(adapter_for(ProviderFamily::Anthropic).requires_terminal());
    assert!(!adapter_for(ProviderFamily::Gemini).requires_terminal());
}
