use crate::config::types::{
    AreaConfig, CheckpointConfig, Config, DetailConfig, DispatcherConfig, ListingConfig,
    SearchConfig,
};
use crate::{ConfigError, ConfigResult};
use reqwest::header::{HeaderName, HeaderValue};
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_dispatcher_config(&config.dispatcher)?;
    validate_search_config(&config.search)?;
    validate_listing_config(&config.listing)?;
    validate_detail_config(&config.detail)?;
    validate_checkpoint_config(&config.checkpoint)?;
    validate_areas(&config.areas)?;
    Ok(())
}

/// Validates dispatcher pacing and headers
fn validate_dispatcher_config(config: &DispatcherConfig) -> ConfigResult<()> {
    if config.min_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "min-interval-ms must be greater than 0".to_string(),
        ));
    }

    if config.min_sleep_ms == 0 {
        return Err(ConfigError::Validation(
            "min-sleep-ms must be greater than 0".to_string(),
        ));
    }

    if config.max_sleep_ms <= config.min_sleep_ms {
        return Err(ConfigError::Validation(format!(
            "max-sleep-ms ({}) must be greater than min-sleep-ms ({})",
            config.max_sleep_ms, config.min_sleep_ms
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.block_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "block-markers cannot contain empty markers".to_string(),
        ));
    }

    for agent in &config.user_agents {
        HeaderValue::from_str(agent).map_err(|_| {
            ConfigError::Validation(format!("Invalid user agent '{}'", agent))
        })?;
    }

    for (name, value) in &config.disguise_headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("Invalid disguise header name '{}'", name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for disguise header '{}'", name))
        })?;
    }

    Ok(())
}

/// Validates the search endpoint
fn validate_search_config(config: &SearchConfig) -> ConfigResult<()> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search url '{}': {}", config.url, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Search url '{}' must use http or https",
            config.url
        )));
    }

    if config.text_param.is_empty() || config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "text-param and page-param cannot be empty".to_string(),
        ));
    }

    if config.text_param == config.page_param {
        return Err(ConfigError::Validation(format!(
            "text-param and page-param must differ, both are '{}'",
            config.text_param
        )));
    }

    Ok(())
}

/// Validates listing extraction rules
fn validate_listing_config(config: &ListingConfig) -> ConfigResult<()> {
    match config {
        ListingConfig::Selector(selectors) => {
            validate_selector(&selectors.card)?;
            validate_selector(&selectors.detail_url)?;
            validate_selector(&selectors.name)?;
            if let Some(description) = &selectors.description {
                validate_selector(description)?;
            }
        }
        ListingConfig::EmbeddedJson(json) => {
            if json.landmark.is_empty() || json.prefix.is_empty() || json.suffix.is_empty() {
                return Err(ConfigError::Validation(
                    "landmark, prefix and suffix cannot be empty".to_string(),
                ));
            }
            if json.list_path.is_empty() {
                return Err(ConfigError::Validation(
                    "list-path must name at least one key".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Validates detail field selectors
fn validate_detail_config(config: &DetailConfig) -> ConfigResult<()> {
    for selector in config
        .address
        .iter()
        .chain(&config.volume)
        .chain(&config.orders)
    {
        validate_selector(selector)?;
    }
    Ok(())
}

/// Validates snapshot location
fn validate_checkpoint_config(config: &CheckpointConfig) -> ConfigResult<()> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the administrative taxonomy
fn validate_areas(areas: &[AreaConfig]) -> ConfigResult<()> {
    if areas.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[area]] must be configured".to_string(),
        ));
    }

    for area in areas {
        validate_area(area)?;
    }
    Ok(())
}

fn validate_area(area: &AreaConfig) -> ConfigResult<()> {
    if area.address.trim().is_empty() || area.name.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Area '{}' ({}) must have a non-empty address and name",
            area.name, area.address
        )));
    }

    for child in &area.children {
        validate_area(child)?;
    }
    Ok(())
}

fn validate_selector(selector: &str) -> ConfigResult<()> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|_| ConfigError::Validation(format!("Invalid CSS selector '{}'", selector)))
}
