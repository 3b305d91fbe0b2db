//! Catalog-Trawler: a patient, restart-safe catalog crawler
//!
//! This crate crawls a paginated two-stage catalog (a listing stage producing brief
//! records and a detail stage enriching each one), resolves free-text addresses
//! against a configured administrative taxonomy, and checkpoints its progress after
//! every page and every record so an interrupted run resumes where it stopped.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod extract;
pub mod output;
pub mod record;
pub mod state;
pub mod taxonomy;

use thiserror::Error;

/// Main error type for Catalog-Trawler operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while fetching a page through the dispatcher stack
#[derive(Debug, Error)]
pub enum FetchError {
    /// The target answered with a non-2xx status
    #[error("Request to {url} was not successful: HTTP {status}")]
    FetchFailed { url: String, status: u16 },

    /// A 2xx response whose body was recognised as an anti-automation page
    #[error("Request to {url} was blocked")]
    Blocked { url: String },

    /// Backoff reached its ceiling while the target kept blocking
    #[error("Request to {url} still blocked after backing off to {last_sleep:?}")]
    Exhausted {
        url: String,
        last_sleep: std::time::Duration,
    },

    /// Transport failure (connection refused, timeout, body decoding)
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },
}

impl FetchError {
    /// Returns true for failures the backoff layer is allowed to retry
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Errors raised by page extractors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Element {name} not found{}", landmark_suffix(.landmark))]
    MissingElement {
        name: String,
        landmark: Option<String>,
    },

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Malformed embedded JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn landmark_suffix(landmark: &Option<String>) -> String {
    landmark
        .as_ref()
        .map(|l| format!(" with {}", l))
        .unwrap_or_default()
}

/// Errors raised while loading or storing snapshots
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Snapshot IO error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace snapshot at {path}: {source}")]
    Persist {
        path: String,
        source: tempfile::PersistError,
    },

    #[error("Snapshot at {path} is incompatible: {reason}")]
    Incompatible { path: String, reason: String },
}

/// Errors raised while building the address taxonomy
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Area at {position} has an empty {field}")]
    EmptyField {
        position: String,
        field: &'static str,
    },

    #[error("Leaf area '{name}' ({address}) is configured more than once")]
    DuplicateLeaf { address: String, name: String },
}

/// Result type alias for Catalog-Trawler operations
pub type Result<T> = std::result::Result<T, TrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for snapshot operations
pub type CheckpointResult<T> = std::result::Result<T, CheckpointError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{EnrichedRecord, Record};
pub use taxonomy::{AddressTaxonomy, UnitKey};
