//! RAII guard for cancellation-safe in-flight counting.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::ChannelCounters;

/// Holds one in-flight slot on a channel. Decrements on drop, so a caller
/// that abandons a request mid-stream cannot leak the count.
pub struct InFlightGuard {
    counters: Arc<ChannelCounters>,
}

impl InFlightGuard {
    pub(super) fn new(counters: Arc<ChannelCounters>) -> Self {
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { counters }
    }

    pub fn channel_id(&self) -> &str {
        &self.counters.channel_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let _ = self.counters.in_flight.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            if v > 0 {
                Some(v - 1)
            } else {
                None
            }
        });
    }
}
