//! Request dispatch layer
//!
//! Everything that touches the network lives here:
//! - [`Throttle`] keeps a minimum spacing between consecutive requests
//! - [`RequestDispatcher`] performs single fetches and classifies the responses
//! - [`BackoffDispatcher`] retries blocked fetches with growing sleeps
//! - [`SearchTemplate`] builds listing search URLs
//!
//! The crawlers only see the [`Fetch`] trait, so the layers can be stacked freely and
//! replaced by scripted fetchers in tests.

mod backoff;
mod detector;
mod dispatcher;
mod target;
mod throttle;

pub use backoff::{BackoffDispatcher, BackoffMode};
pub use detector::{BlockDetector, MarkerDetector};
pub use dispatcher::{build_http_client, RequestDispatcher};
pub use target::SearchTemplate;
pub use throttle::Throttle;

use crate::FetchResult;
use async_trait::async_trait;
use url::Url;

/// Fetches the body of a page
///
/// Takes `&mut self`: a fetcher carries the run's pacing state, and a run owns exactly
/// one.
#[async_trait]
pub trait Fetch: Send {
    async fn fetch(&mut self, target: &Url) -> FetchResult<String>;
}
