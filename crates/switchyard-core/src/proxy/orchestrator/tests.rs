use super::*;
use std::collections::BTreeSet;
use switchyard_types::models::{ChannelStatus, QuotaLimits, TenantQuota};
use switchyard_types::{ChatMessage, Credential, HealthState, Provider, ProviderFamily, StrategyKind};

fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.providers.push(Provider {
        id: "openai".into(),
        name: "OpenAI".into(),
        family: ProviderFamily::OpenAI,
        base_url: "http://127.0.0.1:9/v1".into(),
        models: ["gpt-x".to_string()].into_iter().collect::<BTreeSet<_>>(),
    });
    config.channels.push(Channel {
        id: "c1".into(),
        tenant_id: "t1".into(),
        provider_id: "openai".into(),
        credential: Credential::new("sk-1"),
        endpoint: None,
        models: vec![],
        weight: 1,
        priority: 0,
        rate_limit_per_minute: None,
        status: ChannelStatus::Active,
    });
    config.quotas.push(TenantQuota::new("t1", QuotaLimits::default()));
    config
}

fn context(prompt_estimate: u64) -> CallContext {
    CallContext {
        tenant_id: "t1".into(),
        channel_id: "c1".into(),
        provider_id: "openai".into(),
        model: "gpt-x".into(),
        strategy: StrategyKind::BestPerformance,
        prompt_estimate,
    }
}

fn chunk(delta: &str, usage: Option<Usage>) -> ProxyResponseChunk {
    ProxyResponseChunk {
        delta: delta.into(),
        finish_reason: None,
        usage,
        provider: "openai".into(),
        channel_id: "c1".into(),
    }
}

fn settlement(gateway: &Gateway, prompt_estimate: u64) -> Settlement {
    let guard = gateway.metrics.record_dispatch("c1");
    Settlement::new(context(prompt_estimate), gateway.sinks.clone(), guard)
}

fn used_tokens(gateway: &Gateway) -> (u64, u64) {
    let quota = gateway.quota.usage("t1").unwrap();
    (quota.used.daily_requests, quota.used.daily_tokens)
}

#[tokio::test]
async fn test_settles_exactly_once() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let mut s = settlement(&gateway, 0);
    assert_eq!(gateway.metrics.in_flight("c1"), 1);
    s.succeed_with(Usage::new(10, 5));
    s.fail(&GatewayError::new(ErrorKind::UpstreamServerError, "late"));
    drop(s);

    let snapshot = gateway.metrics.snapshot("c1");
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.successes, 1);
    assert_eq!(snapshot.failures, 0);
    assert_eq!(snapshot.in_flight, 0);
    assert_eq!(used_tokens(&gateway), (1, 15));
}

#[tokio::test]
async fn test_cancel_before_output_is_free() {
    let gateway = Gateway::builder(config()).build().unwrap();

    drop(settlement(&gateway, 12));

    let snapshot = gateway.metrics.snapshot("c1");
    assert_eq!(snapshot.requests, 0);
    assert_eq!(snapshot.in_flight, 0);
    assert_eq!(used_tokens(&gateway), (0, 0));
}

#[tokio::test]
async fn test_cancel_after_output_debits_estimate() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let mut s = settlement(&gateway, 3);
    s.observe(&chunk("abcdefgh", None));
    drop(s);

    // 3 prompt + ceil(8 / 4) completion, and no health verdict.
    assert_eq!(used_tokens(&gateway), (1, 5));
    let snapshot = gateway.metrics.snapshot("c1");
    assert_eq!(snapshot.failures, 0);
    assert_eq!(snapshot.health, HealthState::Checking);
}

#[tokio::test]
async fn test_reported_usage_wins_over_estimate() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let mut s = settlement(&gateway, 3);
    s.observe(&chunk("A", Some(Usage { prompt_tokens: 12, completion_tokens: 1, total_tokens: 13 })));
    s.observe(&chunk("B", None));
    s.observe(&chunk("", Some(Usage { prompt_tokens: 12, completion_tokens: 40, total_tokens: 52 })));
    s.succeed();

    assert_eq!(used_tokens(&gateway), (1, 52));
    assert_eq!(gateway.metrics.snapshot("c1").tokens, 52);
}

#[tokio::test]
async fn test_partial_stream_failure_debits_and_counts() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let mut s = settlement(&gateway, 0);
    s.observe(&chunk("abcd", None));
    s.fail(&GatewayError::new(ErrorKind::UpstreamTimeout, "stalled"));

    assert_eq!(used_tokens(&gateway), (1, 1));
    let snapshot = gateway.metrics.snapshot("c1");
    assert_eq!(snapshot.failures, 1);
    assert_eq!(snapshot.consecutive_failures, 1);
}

#[tokio::test]
async fn test_non_channel_failure_leaves_metrics() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let mut s = settlement(&gateway, 0);
    s.fail(&GatewayError::new(ErrorKind::InvalidRequest, "bad"));

    let snapshot = gateway.metrics.snapshot("c1");
    assert_eq!(snapshot.requests, 0);
    assert_eq!(snapshot.in_flight, 0);
    assert_eq!(used_tokens(&gateway), (0, 0));
}

#[tokio::test]
async fn test_rejects_malformed_request() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let err = gateway.complete("t1", ProxyRequest::new("gpt-x", vec![])).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);

    let err = gateway.complete("t1", ProxyRequest::new(" ", vec![ChatMessage::user("hi")])).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_unknown_tenant_fails_closed() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let err = gateway.complete("stranger", ProxyRequest::new("gpt-x", vec![ChatMessage::user("hi")])).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::QuotaExceeded);
    assert_eq!(gateway.metrics.snapshot("c1").requests, 0);
}

#[tokio::test]
async fn test_channel_admin_tracks_metrics() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let mut extra = gateway.registry.channel("c1").unwrap();
    extra.id = "c2".into();
    gateway.upsert_channel(extra).unwrap();
    assert!(gateway.metrics.tracked_channels().contains(&"c2".to_string()));
    assert!(gateway.channel_metrics("c2").is_ok());

    assert!(gateway.remove_channel("c2").is_some());
    assert!(!gateway.metrics.tracked_channels().contains(&"c2".to_string()));
    assert_eq!(gateway.channel_metrics("c2").unwrap_err().kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_removed_channel_stays_removed_after_in_flight_call_settles() {
    let gateway = Gateway::builder(config()).build().unwrap();

    let mut s = settlement(&gateway, 0);
    assert!(gateway.remove_channel("c1").is_some());
    s.fail(&GatewayError::new(ErrorKind::UpstreamServerError, "late"));
    drop(s);

    assert!(gateway.metrics.tracked_channels().is_empty());
    assert_eq!(gateway.metrics.snapshot("c1").requests, 0);
}
