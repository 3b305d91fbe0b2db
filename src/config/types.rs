use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Catalog-Trawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dispatcher: DispatcherConfig,
    pub search: SearchConfig,
    pub listing: ListingConfig,
    #[serde(default)]
    pub detail: DetailConfig,
    pub checkpoint: CheckpointConfig,
    /// Administrative taxonomy roots, in match priority order
    #[serde(rename = "area", default)]
    pub areas: Vec<AreaConfig>,
}

/// Outbound request pacing and block handling
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DispatcherConfig {
    /// Minimum spacing between two consecutive requests (milliseconds)
    pub min_interval_ms: u64,

    /// Extra wait added to every throttle sleep (milliseconds)
    #[serde(default = "default_safety_margin_ms")]
    pub safety_margin_ms: u64,

    /// First backoff sleep after a blocked response (milliseconds, non-zero)
    pub min_sleep_ms: u64,

    /// Backoff ceiling; reaching it gives up (milliseconds)
    pub max_sleep_ms: u64,

    /// Whole-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Case-insensitive body fragments that identify a blocking page
    #[serde(default = "default_block_markers")]
    pub block_markers: Vec<String>,

    /// User-Agent strings rotated across requests
    #[serde(default)]
    pub user_agents: Vec<String>,

    /// Static headers attached to every request
    #[serde(default)]
    pub disguise_headers: BTreeMap<String, String>,
}

impl DispatcherConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_millis(self.safety_margin_ms)
    }

    pub fn min_sleep(&self) -> Duration {
        Duration::from_millis(self.min_sleep_ms)
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_safety_margin_ms() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_block_markers() -> Vec<String> {
    vec!["captcha".to_string()]
}

/// Listing-stage search endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Base search URL, without query
    pub url: String,

    /// Query parameter carrying the unit's match key
    #[serde(default = "default_text_param")]
    pub text_param: String,

    /// Query parameter carrying the 1-based page number
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Fixed query parameters added to every search
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

fn default_text_param() -> String {
    "SearchText".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

/// How records are pulled out of a listing page
///
/// The `kind` key picks the extractor; a `[listing]` section without it describes
/// the selector extractor.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawListingConfig")]
pub enum ListingConfig {
    /// CSS selectors over repeated result cards
    Selector(SelectorListingConfig),
    /// JSON object embedded in one of the page's scripts
    EmbeddedJson(EmbeddedJsonConfig),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ListingKind {
    #[default]
    Selector,
    EmbeddedJson,
}

/// `[listing]` as written: the extractor kind plus that extractor's own keys
#[derive(Debug, Deserialize)]
struct RawListingConfig {
    #[serde(default)]
    kind: ListingKind,
    #[serde(flatten)]
    fields: toml::Table,
}

impl TryFrom<RawListingConfig> for ListingConfig {
    type Error = toml::de::Error;

    fn try_from(raw: RawListingConfig) -> Result<Self, Self::Error> {
        let fields = toml::Value::Table(raw.fields);
        Ok(match raw.kind {
            ListingKind::Selector => ListingConfig::Selector(fields.try_into()?),
            ListingKind::EmbeddedJson => ListingConfig::EmbeddedJson(fields.try_into()?),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectorListingConfig {
    /// Selector matching one result card
    pub card: String,

    /// Selector, relative to the card, of the element linking to the detail page
    pub detail_url: String,

    /// Attribute holding the detail link
    #[serde(default = "default_link_attr")]
    pub detail_url_attr: String,

    /// Selector, relative to the card, of the display name
    pub name: String,

    /// Selector, relative to the card, of the short description
    #[serde(default)]
    pub description: Option<String>,
}

fn default_link_attr() -> String {
    "href".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EmbeddedJsonConfig {
    /// Text that identifies the script holding page data
    pub landmark: String,

    /// Text right before the JSON body (including its opening brace)
    pub prefix: String,

    /// Text right after the JSON body (including its closing brace)
    pub suffix: String,

    /// Object keys leading to the list of records
    pub list_path: Vec<String>,

    pub template: JsonTemplate,
}

/// Field names of one record inside the embedded list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JsonTemplate {
    pub detail_url: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Detail-page field selectors; the first selector that matches wins
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetailConfig {
    #[serde(default)]
    pub address: Vec<String>,

    /// Transaction volume figure, kept as raw text
    #[serde(default)]
    pub volume: Vec<String>,

    /// Order count figure, kept as raw text
    #[serde(default)]
    pub orders: Vec<String>,
}

/// Snapshot location
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckpointConfig {
    /// Directory holding one snapshot file per stage
    pub directory: String,
}

impl CheckpointConfig {
    pub fn listing_path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join("listing.json")
    }

    pub fn detail_path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join("details.json")
    }
}

/// One administrative area and its sub-areas
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AreaConfig {
    /// Fragment searched for in addresses, also used as the search text
    pub address: String,

    /// Display name reported in resolved paths
    pub name: String,

    #[serde(default)]
    pub children: Vec<AreaConfig>,
}

impl AreaConfig {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<AreaConfig>) -> Self {
        self.children = children;
        self
    }
}
