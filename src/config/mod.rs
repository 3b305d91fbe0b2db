//! Configuration module for Catalog-Trawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_trawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawler.toml")).unwrap();
//! println!("Requests spaced by {}ms", config.dispatcher.min_interval_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AreaConfig, CheckpointConfig, Config, DetailConfig, DispatcherConfig, EmbeddedJsonConfig,
    JsonTemplate, ListingConfig, SearchConfig, SelectorListingConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
