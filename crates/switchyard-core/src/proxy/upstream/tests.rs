use super::*;
use std::collections::BTreeSet;
use std::time::Duration;
use switchyard_types::models::{ChannelStatus, UpstreamConfig};
use switchyard_types::{ChatMessage, Channel, Credential, ErrorKind, Provider, ProviderFamily, ProxyRequest};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::proxy::mappers::OpenAiAdapter;

fn provider(base_url: &str) -> Provider {
    Provider {
        id: "openai".into(),
        name: "OpenAI".into(),
        family: ProviderFamily::OpenAI,
        base_url: base_url.into(),
        models: BTreeSet::from(["m1".to_string()]),
    }
}

fn channel() -> Channel {
    Channel {
        id: "c1".into(),
        tenant_id: "t1".into(),
        provider_id: "openai".into(),
        credential: Credential::new("sk-test"),
        endpoint: None,
        models: vec![],
        weight: 1,
        priority: 0,
        rate_limit_per_minute: None,
        status: ChannelStatus::Active,
    }
}

fn request() -> ProxyRequest {
    ProxyRequest::new("m1", vec![ChatMessage::user("hi")])
}

#[test]
fn test_endpoint_override() {
    let mut ch = channel();
    let p = provider("https://api.example.com/v1/");
    assert_eq!(resolve_base_url(&p, &ch), "https://api.example.com/v1");

    ch.endpoint = Some("https://proxy.example.com/v1".into());
    assert_eq!(resolve_base_url(&p, &ch), "https://proxy.example.com/v1");

    ch.endpoint = Some("not a url".into());
    assert_eq!(resolve_base_url(&p, &ch), "https://api.example.com/v1");
}

#[tokio::test]
async fn test_execute_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "pong"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        })))
        .mount(&server)
        .await;

    let client = UpstreamClient::new(UpstreamConfig::default()).unwrap();
    let resp = client
        .execute(&OpenAiAdapter::openai(), &provider(&server.uri()), &channel(), &request(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(resp.content, "pong");
    assert_eq!(resp.channel_id, "c1");
}

#[tokio::test]
async fn test_execute_classifies_and_sanitizes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string("Incorrect API key provided: sk-test for org-secret"),
        )
        .mount(&server)
        .await;

    let client = UpstreamClient::new(UpstreamConfig::default()).unwrap();
    let err = client
        .execute(&OpenAiAdapter::openai(), &provider(&server.uri()), &channel(), &request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCredential);
    assert!(!err.message.contains("org-secret"));
}

#[tokio::test]
async fn test_execute_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = UpstreamClient::new(UpstreamConfig::default()).unwrap();
    let err = client
        .execute(&OpenAiAdapter::openai(), &provider(&server.uri()), &channel(), &request(), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamTimeout);
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base = format!("http://127.0.0.1:{}", port);
    let client = UpstreamClient::new(UpstreamConfig::default()).unwrap();
    let err = client
        .execute(&OpenAiAdapter::openai(), &provider(&base), &channel(), &request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
}

#[tokio::test]
async fn test_malformed_body_is_translation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = UpstreamClient::new(UpstreamConfig::default()).unwrap();
    let err = client
        .execute(&OpenAiAdapter::openai(), &provider(&server.uri()), &channel(), &request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TranslationError);
}
