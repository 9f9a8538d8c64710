//! One-minute rolling dispatch counter.
//!
//! Two fixed buckets (current and previous minute); the previous bucket is
//! weighted by how much of it still overlaps the sliding window.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

pub const WINDOW_MS: i64 = 60_000;

#[derive(Debug, Default)]
pub struct RollingCounter {
    bucket_start_ms: AtomicI64,
    current: AtomicU32,
    previous: AtomicU32,
}

impl RollingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn rotate(&self, now_ms: i64) {
        let start = self.bucket_start_ms.load(Ordering::Acquire);
        let elapsed = now_ms - start;
        if elapsed < WINDOW_MS {
            return;
        }
        let aligned = now_ms - now_ms.rem_euclid(WINDOW_MS);
        if self
            .bucket_start_ms
            .compare_exchange(start, aligned, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let finished = self.current.swap(0, Ordering::AcqRel);
            let carried = if elapsed < 2 * WINDOW_MS { finished } else { 0 };
            self.previous.store(carried, Ordering::Release);
        }
    }

    pub fn record(&self, now_ms: i64) {
        self.rotate(now_ms);
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    /// Estimated events in the last minute.
    pub fn count(&self, now_ms: i64) -> u32 {
        self.rotate(now_ms);
        let start = self.bucket_start_ms.load(Ordering::Acquire);
        let into_bucket = (now_ms - start).clamp(0, WINDOW_MS);
        let overlap = (WINDOW_MS - into_bucket) as f64 / WINDOW_MS as f64;
        let previous = f64::from(self.previous.load(Ordering::Acquire)) * overlap;
        self.current.load(Ordering::Acquire) + previous.floor() as u32
    }
}
