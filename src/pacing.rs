use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Minimum spacing between request start times for a given requests-per-minute rate.
///
/// Returns `None` when the rate is zero, meaning no pacing.
pub fn interval_for_rate(requests_per_minute: u32) -> Option<Duration> {
    if requests_per_minute == 0 {
        return None;
    }
    let millis = 60_000u64.div_ceil(u64::from(requests_per_minute));
    Some(Duration::from_millis(millis))
}

/// Enforces a minimum interval between successive requests.
///
/// Each caller reserves the next free start slot under the lock and then
/// sleeps outside of it, so callers sharing one pacer are spaced out even
/// when they arrive concurrently.
#[derive(Debug, Default)]
pub struct Pacer {
    interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a pacer with an explicit interval; `None` disables pacing
    pub fn new(interval: Option<Duration>) -> Self {
        Pacer {
            interval: interval.filter(|d| !d.is_zero()),
            last_request: Mutex::new(None),
        }
    }

    /// Create a pacer from a requests-per-minute rate
    pub fn with_rate(requests_per_minute: Option<u32>) -> Self {
        Pacer::new(requests_per_minute.and_then(interval_for_rate))
    }

    /// Change the rate; the last request time is kept
    pub fn set_rate(&mut self, requests_per_minute: u32) {
        self.interval = interval_for_rate(requests_per_minute);
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Block until this request may start
    pub fn wait(&self) {
        if let Some(delay) = self.reserve() {
            std::thread::sleep(delay);
        }
    }

    /// Wait for this request's slot without blocking the runtime thread
    #[cfg(feature = "async")]
    pub async fn wait_async(&self) {
        if let Some(delay) = self.reserve() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Record this request's start slot and return how long to wait for it
    fn reserve(&self) -> Option<Duration> {
        let mut last = self.last_request.lock();
        let now = Instant::now();

        let start = match (self.interval, *last) {
            (Some(interval), Some(previous)) => (previous + interval).max(now),
            _ => now,
        };
        *last = Some(start);

        let delay = start.saturating_duration_since(now);
        if delay.is_zero() {
            return None;
        }
        debug!(delay_ms = delay.as_millis() as u64, "pacing request");
        Some(delay)
    }
}
