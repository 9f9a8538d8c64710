//! OpenAI-compatible chat completions for tenants.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use switchyard_core::{Completion, CompletionStream};
use switchyard_types::{ProxyRequest, ProxyResponse, ProxyResponseChunk};

use super::ApiError;
use crate::state::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";

pub(crate) fn tenant_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingTenant)
}

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ProxyRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant_id(&headers)?;
    let model = request.model.clone();
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());
    let created = chrono::Utc::now().timestamp();

    match state.gateway().complete(&tenant_id, request).await? {
        Completion::Full(response) => Ok(Json(completion_body(&id, created, &model, &response)).into_response()),
        Completion::Stream(stream) => Ok(sse_response(stream, id, created, model)),
    }
}

fn completion_body(id: &str, created: i64, model: &str, response: &ProxyResponse) -> Value {
    json!({
        "id": id,
        "object": "chat.completion",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": response.content},
            "finish_reason": response.finish_reason,
        }],
        "usage": response.usage,
        "provider": response.provider,
        "channel_id": response.channel_id,
    })
}

fn chunk_body(id: &str, created: i64, model: &str, chunk: &ProxyResponseChunk) -> Value {
    let mut body = json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": {"content": chunk.delta},
            "finish_reason": chunk.finish_reason,
        }],
        "provider": chunk.provider,
        "channel_id": chunk.channel_id,
    });
    if let Some(usage) = &chunk.usage {
        body["usage"] = json!(usage);
    }
    body
}

fn sse_response(stream: CompletionStream, id: String, created: i64, model: String) -> Response {
    let frames = stream
        .map(move |item| {
            let payload = match item {
                Ok(chunk) => chunk_body(&id, created, &model, &chunk),
                Err(err) => ApiError::from(err).body(),
            };
            Ok::<Bytes, Infallible>(Bytes::from(format!("data: {}\n\n", payload)))
        })
        .chain(futures::stream::once(async { Ok(Bytes::from_static(b"data: [DONE]\n\n")) }));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream"), (header::CACHE_CONTROL, "no-cache")],
        Body::from_stream(frames),
    )
        .into_response()
}
