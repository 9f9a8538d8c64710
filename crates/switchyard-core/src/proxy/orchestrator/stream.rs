//! Streaming relay: upstream SSE bytes to canonical chunks.
//!
//! Chunks are pulled before the stream is handed to the caller until one
//! carries text or a finish reason. Content-free chunks seen on the way (usage
//! preambles) are held back, so a failure before the first real output can
//! still be retried on another channel. Once output is committed, failures
//! end the stream instead.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{ErrorKind, GatewayError, ProxyResponseChunk};

use super::settlement::Settlement;
use super::CompletionStream;
use crate::proxy::common::{SseDecoder, SseEvent};
use crate::proxy::mappers::{Origin, ProtocolAdapter};
use crate::proxy::upstream::map_transport_error;

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

pub(super) struct StreamRelay {
    upstream: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    adapter: Arc<dyn ProtocolAdapter>,
    origin: Origin,
    idle_timeout: Duration,
    /// Upstream body is exhausted
    finished: bool,
    /// The provider's end-of-stream marker was seen
    terminated: bool,
    settlement: Settlement,
}

impl StreamRelay {
    pub fn new(
        response: reqwest::Response,
        adapter: Arc<dyn ProtocolAdapter>,
        origin: Origin,
        idle_timeout: Duration,
        settlement: Settlement,
    ) -> Self {
        Self {
            upstream: Box::pin(response.bytes_stream()),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            adapter,
            origin,
            idle_timeout,
            finished: false,
            terminated: false,
            settlement,
        }
    }

    /// Next translated chunk; `Ok(None)` once the upstream finished cleanly.
    /// A body that ends without the terminal marker, for families that send
    /// one, is a truncated response.
    async fn next_chunk(&mut self) -> Result<Option<ProxyResponseChunk>, GatewayError> {
        loop {
            while let Some(event) = self.pending.pop_front() {
                if self.adapter.is_stream_terminal(&event) {
                    self.finished = true;
                    self.terminated = true;
                    self.pending.clear();
                    return Ok(None);
                }
                if let Some(chunk) = self.adapter.translate_stream_chunk(&event, &self.origin)? {
                    self.settlement.observe(&chunk);
                    return Ok(Some(chunk));
                }
            }
            if self.finished {
                if !self.terminated && self.adapter.requires_terminal() {
                    tracing::warn!(
                        "Stream on channel {} ended without a terminal event",
                        self.settlement.channel_id()
                    );
                    return Err(GatewayError::new(
                        ErrorKind::UpstreamServerError,
                        "Upstream stream ended before completion",
                    ));
                }
                return Ok(None);
            }

            match tokio::time::timeout(self.idle_timeout, self.upstream.next()).await {
                Err(_) => {
                    tracing::warn!(
                        "Stream on channel {} idle for {:?}",
                        self.settlement.channel_id(),
                        self.idle_timeout
                    );
                    return Err(GatewayError::new(ErrorKind::UpstreamTimeout, "Upstream stream stalled"));
                },
                Ok(None) => {
                    self.finished = true;
                    let tail = self.decoder.finish();
                    self.pending.extend(tail);
                },
                Ok(Some(Err(e))) => {
                    return Err(map_transport_error(&e, self.settlement.channel_id()));
                },
                Ok(Some(Ok(bytes))) => {
                    let events = self.decoder.push(&bytes);
                    self.pending.extend(events);
                },
            }
        }
    }

    /// Pull chunks until the first one with output. On error the call is
    /// settled as failed and the error returned so the caller may retry
    /// elsewhere.
    pub async fn open(mut self) -> Result<CompletionStream, GatewayError> {
        let mut head = Vec::new();
        loop {
            match self.next_chunk().await {
                Ok(Some(chunk)) => {
                    let commits = !chunk.delta.is_empty() || chunk.finish_reason.is_some();
                    head.push(chunk);
                    if commits {
                        return Ok(self.into_stream(head, false));
                    }
                },
                Ok(None) => return Ok(self.into_stream(head, true)),
                Err(err) => {
                    tracing::warn!(
                        "Stream on channel {} failed before the first output: {}",
                        self.settlement.channel_id(),
                        err
                    );
                    self.settlement.fail(&err);
                    return Err(err);
                },
            }
        }
    }

    fn into_stream(self, head: Vec<ProxyResponseChunk>, ended: bool) -> CompletionStream {
        let mut relay = self;
        Box::pin(async_stream::stream! {
            for chunk in head {
                yield Ok(chunk);
            }
            if ended {
                relay.settlement.succeed();
            } else {
                loop {
                    match relay.next_chunk().await {
                        Ok(Some(chunk)) => yield Ok(chunk),
                        Ok(None) => {
                            relay.settlement.succeed();
                            break;
                        },
                        Err(err) => {
                            tracing::warn!(
                                "Stream on channel {} failed mid-flight: {}",
                                relay.settlement.channel_id(),
                                err
                            );
                            relay.settlement.fail(&err);
                            yield Err(err);
                            break;
                        },
                    }
                }
            }
        })
    }
}
