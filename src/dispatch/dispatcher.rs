//! Rate-limited HTTP dispatcher
//!
//! Every outbound request of a run goes through one [`RequestDispatcher`]. It owns the
//! throttle, so the spacing between requests holds across both crawl stages.

use crate::config::DispatcherConfig;
use crate::dispatch::{BlockDetector, Fetch, MarkerDetector, Throttle};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Builds the HTTP client used for every request
pub fn build_http_client(config: &DispatcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs single fetches with global spacing and response classification
///
/// # Classification
///
/// | Response | Result |
/// |----------|--------|
/// | Non-2xx status | `FetchError::FetchFailed` |
/// | 2xx, body flagged by the block detector | `FetchError::Blocked` |
/// | 2xx otherwise | body text |
/// | Transport failure | `FetchError::Http` |
pub struct RequestDispatcher {
    client: Client,
    throttle: Throttle,
    detector: Box<dyn BlockDetector>,
    headers: HeaderMap,
    user_agents: Vec<HeaderValue>,
    next_agent: usize,
}

impl RequestDispatcher {
    pub fn new(client: Client, throttle: Throttle, detector: impl BlockDetector + 'static) -> Self {
        Self {
            client,
            throttle,
            detector: Box::new(detector),
            headers: HeaderMap::new(),
            user_agents: Vec::new(),
            next_agent: 0,
        }
    }

    /// Builds a dispatcher from configuration
    ///
    /// Header names and values are checked during config validation; any that still
    /// fail to convert are skipped with a warning.
    pub fn from_config(config: &DispatcherConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        let throttle = Throttle::new(config.min_interval(), config.safety_margin());
        let detector = MarkerDetector::new(&config.block_markers);

        let mut headers = HeaderMap::new();
        for (name, value) in &config.disguise_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!("Skipping invalid disguise header '{}'", name),
            }
        }

        let user_agents = config
            .user_agents
            .iter()
            .filter_map(|agent| HeaderValue::from_str(agent).ok())
            .collect();

        Ok(Self::new(client, throttle, detector)
            .with_headers(headers)
            .with_user_agents(user_agents))
    }

    /// Sets the disguise headers sent with every request
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the user agents rotated across requests
    pub fn with_user_agents(mut self, user_agents: Vec<HeaderValue>) -> Self {
        self.user_agents = user_agents;
        self.next_agent = 0;
        self
    }

    fn next_user_agent(&mut self) -> Option<HeaderValue> {
        if self.user_agents.is_empty() {
            return None;
        }
        let agent = self.user_agents[self.next_agent % self.user_agents.len()].clone();
        self.next_agent = self.next_agent.wrapping_add(1);
        Some(agent)
    }
}

#[async_trait]
impl Fetch for RequestDispatcher {
    async fn fetch(&mut self, target: &Url) -> FetchResult<String> {
        self.throttle.wait().await;
        tracing::debug!("Fetching {}", target);

        let mut request = self.client.get(target.clone()).headers(self.headers.clone());
        if let Some(agent) = self.next_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(|source| FetchError::Http {
            url: target.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::FetchFailed {
                url: target.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: target.to_string(),
            source,
        })?;

        if self.detector.is_blocked(&body) {
            tracing::debug!("Blocking page detected at {}", target);
            return Err(FetchError::Blocked {
                url: target.to_string(),
            });
        }

        Ok(body)
    }
}
