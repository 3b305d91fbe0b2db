//! Search URL construction
//!
//! Search pages are addressed by a fixed base URL plus query pairs: the unit's search
//! text, any fixed extra parameters, and the 1-based page number, in that order.

use crate::config::SearchConfig;
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Builds listing-stage search URLs for any unit and page
#[derive(Debug, Clone)]
pub struct SearchTemplate {
    base: Url,
    text_param: String,
    page_param: String,
    extra_params: Vec<(String, String)>,
}

impl SearchTemplate {
    pub fn new(base: Url, text_param: impl Into<String>, page_param: impl Into<String>) -> Self {
        Self {
            base,
            text_param: text_param.into(),
            page_param: page_param.into(),
            extra_params: Vec::new(),
        }
    }

    /// Adds a fixed query pair sent with every search
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((name.into(), value.into()));
        self
    }

    pub fn from_config(config: &SearchConfig) -> ConfigResult<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.url, e)))?;

        Ok(config.extra_params.iter().fold(
            Self::new(base, &config.text_param, &config.page_param),
            |template, (name, value)| template.with_param(name, value),
        ))
    }

    /// Returns the URL of one search result page
    ///
    /// Pages are numbered from 1; page 0 does not exist and yields `None`.
    pub fn url_for(&self, text: &str, page: u32) -> Option<Url> {
        if page == 0 {
            return None;
        }

        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(&self.text_param, text);
            for (name, value) in &self.extra_params {
                query.append_pair(name, value);
            }
            query.append_pair(&self.page_param, &page.to_string());
        }
        Some(url)
    }
}
