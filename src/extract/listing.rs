//! Listing page extractors

use crate::config::{EmbeddedJsonConfig, JsonTemplate, SelectorListingConfig};
use crate::extract::{element_text, parse_selector, ListingExtractor};
use crate::{ExtractError, Record};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Extracts one record per result card
///
/// Cards without a detail link are dropped. A missing name or description becomes an
/// empty string. A page without any card yields no records, which ends the unit.
#[derive(Debug, Clone)]
pub struct SelectorListingExtractor {
    card: Selector,
    detail_url: Selector,
    detail_url_attr: String,
    name: Selector,
    description: Option<Selector>,
}

impl SelectorListingExtractor {
    pub fn from_config(config: &SelectorListingConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            card: parse_selector(&config.card)?,
            detail_url: parse_selector(&config.detail_url)?,
            detail_url_attr: config.detail_url_attr.clone(),
            name: parse_selector(&config.name)?,
            description: config
                .description
                .as_deref()
                .map(parse_selector)
                .transpose()?,
        })
    }

    fn record_from_card(&self, card: ElementRef<'_>) -> Option<Record> {
        let link = card
            .select(&self.detail_url)
            .next()
            .and_then(|element| element.value().attr(&self.detail_url_attr))
            .map(str::trim)
            .filter(|link| !link.is_empty());

        let name = card
            .select(&self.name)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let Some(link) = link else {
            tracing::warn!("Dropping result card without a detail link (name: '{}')", name);
            return None;
        };

        let description = self
            .description
            .as_ref()
            .and_then(|selector| card.select(selector).next())
            .map(element_text)
            .unwrap_or_default();

        Some(Record::new(link, name, description))
    }
}

impl ListingExtractor for SelectorListingExtractor {
    fn extract(&self, content: &str) -> Result<Vec<Record>, ExtractError> {
        let document = Html::parse_document(content);
        Ok(document
            .select(&self.card)
            .filter_map(|card| self.record_from_card(card))
            .collect())
    }
}

/// Extracts records from a JSON object embedded in a script
///
/// The script is the first one containing `landmark`. Its JSON body lies between
/// `prefix` and `suffix`; both include the object's outer braces, which are put back
/// before parsing.
#[derive(Debug, Clone)]
pub struct EmbeddedJsonListingExtractor {
    script: Selector,
    landmark: String,
    prefix: String,
    suffix: String,
    list_path: Vec<String>,
    template: JsonTemplate,
}

impl EmbeddedJsonListingExtractor {
    pub fn from_config(config: &EmbeddedJsonConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            script: parse_selector("script")?,
            landmark: config.landmark.clone(),
            prefix: config.prefix.clone(),
            suffix: config.suffix.clone(),
            list_path: config.list_path.clone(),
            template: config.template.clone(),
        })
    }

    fn page_data(&self, content: &str) -> Result<Value, ExtractError> {
        let document = Html::parse_document(content);
        let script = document
            .select(&self.script)
            .map(|script| script.text().collect::<String>())
            .find(|text| text.contains(&self.landmark))
            .ok_or_else(|| ExtractError::MissingElement {
                name: "script".to_string(),
                landmark: Some(self.landmark.clone()),
            })?;

        let start = script
            .find(&self.prefix)
            .map(|at| at + self.prefix.len())
            .ok_or_else(|| self.missing_delimiter(&self.prefix))?;
        let end = script[start..]
            .find(&self.suffix)
            .map(|at| start + at)
            .ok_or_else(|| self.missing_delimiter(&self.suffix))?;

        Ok(serde_json::from_str(&format!("{{{}}}", &script[start..end]))?)
    }

    fn missing_delimiter(&self, delimiter: &str) -> ExtractError {
        ExtractError::MissingElement {
            name: format!("'{}'", delimiter),
            landmark: Some(self.landmark.clone()),
        }
    }

    fn record_from_item(&self, item: &Value) -> Option<Record> {
        let field = |name: &str| item.get(name).and_then(Value::as_str);

        let link = field(&self.template.detail_url)?;
        let name = field(&self.template.name).unwrap_or_default();
        let description = self
            .template
            .description
            .as_deref()
            .and_then(field)
            .unwrap_or_default();

        Some(Record::new(link, name, description))
    }
}

impl ListingExtractor for EmbeddedJsonListingExtractor {
    fn extract(&self, content: &str) -> Result<Vec<Record>, ExtractError> {
        let data = self.page_data(content)?;

        let mut list = &data;
        for key in &self.list_path {
            list = list.get(key).ok_or_else(|| ExtractError::MissingElement {
                name: key.clone(),
                landmark: Some(self.list_path.join(".")),
            })?;
        }

        let items = list.as_array().ok_or_else(|| ExtractError::MissingElement {
            name: "record list".to_string(),
            landmark: Some(self.list_path.join(".")),
        })?;

        Ok(items
            .iter()
            .filter_map(|item| {
                let record = self.record_from_item(item);
                if record.is_none() {
                    tracing::warn!("Dropping embedded record without '{}'", self.template.detail_url);
                }
                record
            })
            .collect())
    }
}
