//! Records produced by the listing and detail stages

use serde::{Deserialize, Serialize};
use url::Url;

/// A brief record produced by the listing stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Absolute URL of the record's detail page
    pub source_url: String,
    pub display_name: String,
    pub short_description: String,
    /// Slug identifying the account, derived from the detail URL's host
    pub account_handle: String,
}

impl Record {
    /// Creates a record, normalizing the detail URL and deriving the account handle
    pub fn new(
        source_url: &str,
        display_name: impl Into<String>,
        short_description: impl Into<String>,
    ) -> Self {
        let source_url = absolutize(source_url);
        let account_handle = account_handle(&source_url);
        Self {
            source_url,
            display_name: display_name.into(),
            short_description: short_description.into(),
            account_handle,
        }
    }
}

/// A record enriched by the detail stage
///
/// Metrics are raw text exactly as shown on the detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: Record,

    /// Display names from the taxonomy root to the matched area
    pub resolved_address_path: Option<Vec<String>>,

    /// Address text as found on the page
    pub raw_address: String,

    /// Transaction volume figure
    pub volume: String,

    /// Order count figure
    pub orders: String,
}

impl EnrichedRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolved_address_path.is_some()
    }
}

/// Turns protocol-relative links (`//host/path`) into `https:` URLs
pub fn absolutize(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("//") {
        format!("https:{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Derives an account handle: the first DNS label of the URL's host
///
/// Returns an empty string when the URL has no host.
pub fn account_handle(url: &str) -> String {
    Url::parse(&absolutize(url))
        .ok()
        .and_then(|url| {
            url.host_str()
                .and_then(|host| host.split('.').next())
                .map(str::to_string)
        })
        .unwrap_or_default()
}
