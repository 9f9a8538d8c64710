use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{Channel, ChatMessage, ErrorKind, GatewayError, ProxyRequest};

use crate::proxy::registry::Registry;
use crate::proxy::upstream::UpstreamClient;

/// Minimal liveness call against one channel. Returns tokens consumed.
#[async_trait]
pub trait ChannelProbe: Send + Sync {
    async fn probe(&self, channel: &Channel) -> Result<u64, GatewayError>;
}

/// One-token completion through the channel's adapter.
pub struct UpstreamProbe {
    registry: Arc<Registry>,
    upstream: Arc<UpstreamClient>,
    timeout: Duration,
}

impl UpstreamProbe {
    pub fn new(registry: Arc<Registry>, upstream: Arc<UpstreamClient>, timeout: Duration) -> Self {
        Self { registry, upstream, timeout }
    }
}

#[async_trait]
impl ChannelProbe for UpstreamProbe {
    async fn probe(&self, channel: &Channel) -> Result<u64, GatewayError> {
        let provider = self.registry.get_provider(&channel.provider_id)?;
        let adapter = self.registry.adapter(&channel.provider_id)?;

        let model = channel
            .models
            .first()
            .or_else(|| provider.models.iter().next())
            .ok_or_else(|| {
                GatewayError::new(
                    ErrorKind::InvalidRequest,
                    format!("Channel {} has no model to probe", channel.id),
                )
            })?;

        let mut request = ProxyRequest::new(model.clone(), vec![ChatMessage::user("ping")]);
        request.max_tokens = Some(1);

        let response =
            self.upstream.execute(adapter.as_ref(), &provider, channel, &request, self.timeout).await?;
        Ok(response.usage.total_tokens)
    }
}
