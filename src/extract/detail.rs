//! Detail page extractor

use crate::config::DetailConfig;
use crate::extract::{element_text, parse_selector, DetailExtractor};
use crate::taxonomy::AddressTaxonomy;
use crate::{EnrichedRecord, ExtractError, Record};
use scraper::{Html, Selector};
use std::sync::Arc;

/// Reads detail fields with fallback selector lists
///
/// For each field the selectors are tried in order and the first matching element
/// wins. The address is resolved against the taxonomy together with the record's
/// display name, since names often carry the city as well.
#[derive(Debug, Clone)]
pub struct SelectorDetailExtractor {
    taxonomy: Arc<AddressTaxonomy>,
    address: Vec<Selector>,
    volume: Vec<Selector>,
    orders: Vec<Selector>,
}

impl SelectorDetailExtractor {
    pub fn from_config(
        config: &DetailConfig,
        taxonomy: Arc<AddressTaxonomy>,
    ) -> Result<Self, ExtractError> {
        let parse_all = |selectors: &[String]| -> Result<Vec<Selector>, ExtractError> {
            selectors.iter().map(|s| parse_selector(s)).collect()
        };

        Ok(Self {
            taxonomy,
            address: parse_all(&config.address)?,
            volume: parse_all(&config.volume)?,
            orders: parse_all(&config.orders)?,
        })
    }

    fn field(&self, document: &Html, field: &str, selectors: &[Selector], record: &Record) -> String {
        let found = selectors
            .iter()
            .find_map(|selector| document.select(selector).next())
            .map(element_text);

        match found {
            Some(text) => text,
            None => {
                if !selectors.is_empty() {
                    tracing::warn!("No {} found on detail page {}", field, record.source_url);
                }
                String::new()
            }
        }
    }
}

impl DetailExtractor for SelectorDetailExtractor {
    fn extract(&self, record: &Record, content: &str) -> EnrichedRecord {
        let document = Html::parse_document(content);

        let raw_address = self.field(&document, "address", &self.address, record);
        let volume = self.field(&document, "volume", &self.volume, record);
        let orders = self.field(&document, "orders", &self.orders, record);

        let resolved_address_path = self
            .taxonomy
            .resolve_parts(&[raw_address.as_str(), record.display_name.as_str()]);
        if resolved_address_path.is_none() {
            tracing::debug!(
                "Address '{}' of {} matches no configured area",
                raw_address,
                record.display_name
            );
        }

        EnrichedRecord {
            record: record.clone(),
            resolved_address_path,
            raw_address,
            volume,
            orders,
        }
    }
}
