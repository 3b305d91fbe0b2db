//! Detail stage: enriches every listed record from its detail page

use crate::checkpoint::Checkpoint;
use crate::dispatch::Fetch;
use crate::extract::DetailExtractor;
use crate::state::{DetailState, UnitStatus};
use crate::taxonomy::{AddressTaxonomy, UnitKey};
use crate::{EnrichedRecord, Record, Result, TrawlError};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Snapshot stage name of the detail stage
pub const DETAIL_STAGE: &str = "detail";

/// Fetches and enriches listed records, one transaction per record
///
/// The cursor of a unit is the index of the next record to enrich, so a resumed run
/// never fetches an already enriched record again. Units missing from the listings
/// are skipped; units listed with no records are completed without a fetch.
///
/// Enriched records are checked against the listing they came from. A unit whose
/// listing no longer starts with the records already enriched is restarted.
pub struct DetailCrawler<D> {
    taxonomy: Arc<AddressTaxonomy>,
    extractor: D,
    checkpoint: Checkpoint<DetailState>,
}

impl<D: DetailExtractor> DetailCrawler<D> {
    pub fn new(
        taxonomy: Arc<AddressTaxonomy>,
        extractor: D,
        checkpoint: Checkpoint<DetailState>,
    ) -> Self {
        Self {
            taxonomy,
            extractor,
            checkpoint,
        }
    }

    pub fn state(&self) -> &DetailState {
        self.checkpoint.state()
    }

    /// Consumes the crawler into the unit → enriched records mapping
    pub fn into_output(self) -> BTreeMap<UnitKey, Vec<EnrichedRecord>> {
        self.checkpoint.into_state().into_output()
    }

    /// Enriches the records of every pending unit, in taxonomy order
    pub async fn run<F: Fetch + ?Sized>(
        &mut self,
        fetcher: &mut F,
        listings: &BTreeMap<UnitKey, Vec<Record>>,
    ) -> Result<()> {
        let units: Vec<UnitKey> = self.taxonomy.leaves().iter().map(|leaf| leaf.key()).collect();
        tracing::info!("Detail stage: {} units", units.len());

        for unit in &units {
            let Some(records) = listings.get(unit) else {
                tracing::debug!("No listing for {}, skipping", unit);
                continue;
            };

            if !self.matches_listing(unit, records) {
                tracing::warn!(
                    "Listing of {} changed since it was enriched, restarting the unit",
                    unit
                );
                self.checkpoint.transaction(|state| {
                    state.reset_unit(unit);
                    Ok::<_, TrawlError>(())
                })?;
            }

            match self.checkpoint.state().status(unit) {
                UnitStatus::Complete => {
                    tracing::debug!("Skipping complete unit {}", unit);
                }
                status => {
                    tracing::info!("Enriching {} records of {} ({})", records.len(), unit, status);
                    self.crawl_unit(fetcher, unit, records).await?;
                }
            }
        }

        tracing::info!(
            "Detail stage finished: {} records enriched",
            self.checkpoint.state().total_items()
        );
        Ok(())
    }

    /// Whether the unit's enriched records were produced from `records`
    fn matches_listing(&self, unit: &UnitKey, records: &[Record]) -> bool {
        let state = self.checkpoint.state();
        let enriched = state.items(unit);

        let is_prefix = enriched.len() <= records.len()
            && enriched
                .iter()
                .zip(records)
                .all(|(enriched, record)| enriched.record == *record);

        if state.is_complete(unit) {
            is_prefix && enriched.len() == records.len()
        } else {
            is_prefix
        }
    }

    async fn crawl_unit<F: Fetch + ?Sized>(
        &mut self,
        fetcher: &mut F,
        unit: &UnitKey,
        records: &[Record],
    ) -> Result<()> {
        loop {
            let index = self.checkpoint.state().cursor(unit);
            let Some(record) = records.get(index) else {
                break;
            };

            let enriched = match Url::parse(&record.source_url) {
                Ok(target) => {
                    let content = fetcher.fetch(&target).await?;
                    self.extractor.extract(record, &content)
                }
                Err(e) => {
                    tracing::warn!(
                        "Record {} has an unusable detail URL '{}': {}",
                        record.display_name,
                        record.source_url,
                        e
                    );
                    self.extractor.extract(record, "")
                }
            };

            self.checkpoint.transaction(|state| {
                state.append_step(unit, [enriched]);
                Ok::<_, TrawlError>(())
            })?;
            tracing::debug!("{}: enriched record {}/{}", unit, index + 1, records.len());
        }

        self.checkpoint.transaction(|state| {
            state.mark_complete(unit);
            Ok::<_, TrawlError>(())
        })?;
        tracing::info!("Unit {} complete", unit);
        Ok(())
    }
}
