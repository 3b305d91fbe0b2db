//! Adaptive backoff on blocked responses
//!
//! Wraps any [`Fetch`] implementation. A blocked response puts the wrapper into
//! backoff: it sleeps, retries, and doubles the sleep after every further block, until
//! either a fetch succeeds or the sleep interval reaches the ceiling.
//!
//! ```text
//!            Blocked                     Blocked (interval *= 2)
//!  Normal ───────────▶ Backoff(interval) ──────┐
//!    ▲                    │   ▲                │
//!    │   success / other  │   └────────────────┘
//!    └────────────────────┘
//!                         │ interval >= max_sleep
//!                         ▼
//!                     Exhausted
//! ```

use crate::config::DispatcherConfig;
use crate::dispatch::Fetch;
use crate::{ConfigError, ConfigResult, FetchError, FetchResult};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Current state of the backoff machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffMode {
    /// Requests are delegated straight through
    Normal,
    /// Sleeping before the next retry
    Backoff { interval: Duration },
}

/// Retries blocked fetches with exponentially growing sleeps
pub struct BackoffDispatcher<F> {
    inner: F,
    min_sleep: Duration,
    max_sleep: Duration,
    mode: BackoffMode,
}

impl<F: Fetch> BackoffDispatcher<F> {
    /// Wraps a fetcher
    ///
    /// # Errors
    ///
    /// `min_sleep` must be non-zero, otherwise the interval could never grow.
    pub fn new(inner: F, min_sleep: Duration, max_sleep: Duration) -> ConfigResult<Self> {
        if min_sleep.is_zero() {
            return Err(ConfigError::Validation(
                "backoff min_sleep must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            inner,
            min_sleep,
            max_sleep,
            mode: BackoffMode::Normal,
        })
    }

    /// Wraps a fetcher with the configured sleep bounds
    pub fn from_config(inner: F, config: &DispatcherConfig) -> ConfigResult<Self> {
        Self::new(inner, config.min_sleep(), config.max_sleep())
    }

    pub fn mode(&self) -> BackoffMode {
        self.mode
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

#[async_trait]
impl<F: Fetch> Fetch for BackoffDispatcher<F> {
    async fn fetch(&mut self, target: &Url) -> FetchResult<String> {
        match self.inner.fetch(target).await {
            Err(e) if e.is_blocked() => {}
            other => return other,
        }

        let mut interval = self.min_sleep;
        let mut last_sleep = Duration::ZERO;

        while interval < self.max_sleep {
            self.mode = BackoffMode::Backoff { interval };
            tracing::info!("Blocked at {}, sleeping for {:?}", target, interval);
            tokio::time::sleep(interval).await;
            last_sleep = interval;

            match self.inner.fetch(target).await {
                Err(e) if e.is_blocked() => {
                    interval = interval.saturating_mul(2);
                }
                other => {
                    self.mode = BackoffMode::Normal;
                    if other.is_ok() {
                        tracing::info!("Unblocked at {} after sleeping {:?}", target, interval);
                    }
                    return other;
                }
            }
        }

        self.mode = BackoffMode::Normal;
        tracing::warn!("Giving up on {} after backing off to {:?}", target, last_sleep);
        Err(FetchError::Exhausted {
            url: target.to_string(),
            last_sleep,
        })
    }
}
