//! Page extractors
//!
//! Extractors turn raw page content into records. They are the only site-specific
//! part of a crawl and are configured entirely from the `[listing]` and `[detail]`
//! sections:
//!
//! - [`SelectorListingExtractor`]: CSS selectors over repeated result cards
//! - [`EmbeddedJsonListingExtractor`]: a JSON object embedded in a `<script>`
//! - [`SelectorDetailExtractor`]: fallback selector lists per detail field

mod detail;
mod listing;

pub use detail::SelectorDetailExtractor;
pub use listing::{EmbeddedJsonListingExtractor, SelectorListingExtractor};

use crate::config::ListingConfig;
use crate::{EnrichedRecord, ExtractError, Record};
use scraper::{ElementRef, Selector};

/// Pulls the brief records out of one listing page
///
/// An empty result means the unit has no more pages. An error means the page did not
/// have the expected structure at all.
pub trait ListingExtractor: Send + Sync {
    fn extract(&self, content: &str) -> Result<Vec<Record>, ExtractError>;
}

/// Enriches a record from its detail page
///
/// Never fails: a field that cannot be found is left empty.
pub trait DetailExtractor: Send + Sync {
    fn extract(&self, record: &Record, content: &str) -> EnrichedRecord;
}

/// Builds the listing extractor selected by configuration
pub fn listing_extractor(config: &ListingConfig) -> Result<Box<dyn ListingExtractor>, ExtractError> {
    Ok(match config {
        ListingConfig::Selector(selectors) => {
            Box::new(SelectorListingExtractor::from_config(selectors)?)
        }
        ListingConfig::EmbeddedJson(json) => {
            Box::new(EmbeddedJsonListingExtractor::from_config(json)?)
        }
    })
}

impl<E: ListingExtractor + ?Sized> ListingExtractor for Box<E> {
    fn extract(&self, content: &str) -> Result<Vec<Record>, ExtractError> {
        (**self).extract(content)
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::InvalidSelector(selector.to_string()))
}

/// Text content of an element with whitespace runs collapsed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
