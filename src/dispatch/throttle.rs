//! Minimum-spacing throttle shared by every outbound request

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests
///
/// The first request goes out immediately. Each later request waits until
/// `last + min_interval`, plus a small safety margin, before recording itself as the
/// new `last`.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    safety_margin: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration, safety_margin: Duration) -> Self {
        Self {
            min_interval,
            safety_margin,
            last_request: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time left before the next request may start, if any
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        let next_allowed = self.last_request? + self.min_interval;
        (now < next_allowed).then(|| next_allowed - now)
    }

    /// Waits until a request is allowed, then records it
    pub async fn wait(&mut self) {
        if let Some(remaining) = self.time_until_next(Instant::now()) {
            let delay = remaining + self.safety_margin;
            tracing::trace!("Throttling next request for {:?}", delay);
            tokio::time::sleep(delay).await;
        }
        self.last_request = Some(Instant::now());
    }
}
