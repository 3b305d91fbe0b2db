//! Listing stage: pages through search results for every taxonomy leaf

use crate::checkpoint::Checkpoint;
use crate::dispatch::{Fetch, SearchTemplate};
use crate::extract::ListingExtractor;
use crate::state::{ListingState, UnitStatus};
use crate::taxonomy::{AddressTaxonomy, UnitKey};
use crate::{ConfigError, Record, Result, TrawlError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Snapshot stage name of the listing stage
pub const LISTING_STAGE: &str = "listing";

/// Collects brief records for every leaf of the taxonomy
///
/// Each leaf is searched by its match key, one result page at a time. The records of
/// a page and the cursor advance are stored in a single transaction; a page with no
/// records completes the leaf. Completed leaves are never fetched again.
pub struct ListingCrawler<L> {
    taxonomy: Arc<AddressTaxonomy>,
    search: SearchTemplate,
    extractor: L,
    checkpoint: Checkpoint<ListingState>,
}

impl<L: ListingExtractor> ListingCrawler<L> {
    pub fn new(
        taxonomy: Arc<AddressTaxonomy>,
        search: SearchTemplate,
        extractor: L,
        checkpoint: Checkpoint<ListingState>,
    ) -> Self {
        Self {
            taxonomy,
            search,
            extractor,
            checkpoint,
        }
    }

    pub fn state(&self) -> &ListingState {
        self.checkpoint.state()
    }

    /// Consumes the crawler into the unit → records mapping
    pub fn into_output(self) -> BTreeMap<UnitKey, Vec<Record>> {
        self.checkpoint.into_state().into_output()
    }

    /// Crawls every pending leaf in taxonomy order
    ///
    /// # Errors
    ///
    /// Any fetch or extraction failure aborts the run. Everything stored before the
    /// failure stays in the snapshot, and the next run resumes from there.
    pub async fn run<F: Fetch + ?Sized>(&mut self, fetcher: &mut F) -> Result<()> {
        let units: Vec<UnitKey> = self.taxonomy.leaves().iter().map(|leaf| leaf.key()).collect();
        tracing::info!("Listing stage: {} units", units.len());

        for unit in &units {
            match self.checkpoint.state().status(unit) {
                UnitStatus::Complete => {
                    tracing::debug!("Skipping complete unit {}", unit);
                }
                status => {
                    tracing::info!("Listing {} ({})", unit, status);
                    self.crawl_unit(fetcher, unit).await?;
                }
            }
        }

        tracing::info!(
            "Listing stage finished: {} records across {} units",
            self.checkpoint.state().total_items(),
            units.len()
        );
        Ok(())
    }

    async fn crawl_unit<F: Fetch + ?Sized>(
        &mut self,
        fetcher: &mut F,
        unit: &UnitKey,
    ) -> Result<()> {
        loop {
            let page = self.checkpoint.state().cursor(unit) + 1;
            let target = u32::try_from(page)
                .ok()
                .and_then(|page| self.search.url_for(&unit.match_key, page))
                .ok_or_else(|| {
                    ConfigError::InvalidUrl(format!("No search page {} for {}", page, unit))
                })?;

            let content = fetcher.fetch(&target).await?;
            let records = self.extractor.extract(&content)?;

            if records.is_empty() {
                self.checkpoint.transaction(|state| {
                    state.mark_complete(unit);
                    Ok::<_, TrawlError>(())
                })?;
                tracing::info!(
                    "Unit {} complete after {} pages, {} records",
                    unit,
                    page - 1,
                    self.checkpoint.state().items(unit).len()
                );
                return Ok(());
            }

            let found = records.len();
            self.checkpoint.transaction(|state| {
                state.append_step(unit, records);
                Ok::<_, TrawlError>(())
            })?;
            tracing::debug!("{}: page {} yielded {} records", unit, page, found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaConfig;
    use crate::crawler::testing::LineExtractor;
    use crate::dispatch::testing::{ok, ScriptedFetcher};
    use crate::FetchError;
    use tempfile::TempDir;
    use url::Url;

    fn taxonomy() -> Arc<AddressTaxonomy> {
        let areas = vec![
            AreaConfig::new("north", "North")
                .with_children(vec![AreaConfig::new("north-a", "A")]),
            AreaConfig::new("south", "South"),
        ];
        Arc::new(AddressTaxonomy::from_config(&areas).unwrap())
    }

    fn search() -> SearchTemplate {
        SearchTemplate::new(
            Url::parse("https://search.example.com/list").unwrap(),
            "q",
            "page",
        )
    }

    fn page_url(text: &str, page: u32) -> String {
        search().url_for(text, page).unwrap().to_string()
    }

    fn lines(prefix: &str, count: usize) -> String {
        (0..count)
            .map(|i| format!("https://{}{}.example.com/,{} {}", prefix, i, prefix, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn crawler(dir: &TempDir) -> ListingCrawler<LineExtractor> {
        let checkpoint =
            Checkpoint::load(dir.path().join("listing.json"), LISTING_STAGE, "fp").unwrap();
        ListingCrawler::new(taxonomy(), search(), LineExtractor, checkpoint)
    }

    /// North > A yields 10 and 7 records, South yields none
    fn full_script() -> ScriptedFetcher {
        let mut fetcher = ScriptedFetcher::new();
        fetcher.push(&page_url("north-a", 1), ok(&lines("a", 10)));
        fetcher.push(&page_url("north-a", 2), ok(&lines("b", 7)));
        fetcher.push(&page_url("north-a", 3), ok(""));
        fetcher.push(&page_url("south", 1), ok(""));
        fetcher
    }

    #[tokio::test]
    async fn test_pages_until_empty() {
        let dir = TempDir::new().unwrap();
        let mut listing = crawler(&dir);
        let mut fetcher = full_script();

        listing.run(&mut fetcher).await.unwrap();

        let a = UnitKey::new("north-a", "A");
        let south = UnitKey::new("south", "South");
        assert_eq!(listing.state().status(&a), UnitStatus::Complete);
        assert_eq!(listing.state().items(&a).len(), 17);
        assert_eq!(listing.state().status(&south), UnitStatus::Complete);
        assert_eq!(fetcher.calls().len(), 4);
        assert_eq!(fetcher.calls()[0], page_url("south", 1));

        let output = listing.into_output();
        assert_eq!(output[&a][10].display_name, "b 0");
        assert!(output[&south].is_empty());
    }

    #[tokio::test]
    async fn test_resume_after_interruption_matches_uninterrupted_run() {
        let uninterrupted_dir = TempDir::new().unwrap();
        let mut uninterrupted = crawler(&uninterrupted_dir);
        uninterrupted.run(&mut full_script()).await.unwrap();
        let expected = uninterrupted.into_output();

        let dir = TempDir::new().unwrap();

        // First run completes South, then dies on page 2 of A
        let mut first = ScriptedFetcher::new();
        first.push(&page_url("south", 1), ok(""));
        first.push(&page_url("north-a", 1), ok(&lines("a", 10)));
        first.push(
            &page_url("north-a", 2),
            Err(FetchError::Exhausted {
                url: page_url("north-a", 2),
                last_sleep: std::time::Duration::from_secs(4),
            }),
        );
        let err = crawler(&dir).run(&mut first).await.unwrap_err();
        assert!(matches!(err, TrawlError::Fetch(FetchError::Exhausted { .. })));

        let interrupted = crawler(&dir);
        let a = UnitKey::new("north-a", "A");
        assert_eq!(interrupted.state().status(&a), UnitStatus::InProgress(1));
        assert_eq!(interrupted.state().items(&a).len(), 10);

        // Second run picks up at page 2
        let mut second = ScriptedFetcher::new();
        second.push(&page_url("north-a", 2), ok(&lines("b", 7)));
        second.push(&page_url("north-a", 3), ok(""));
        let mut resumed = crawler(&dir);
        resumed.run(&mut second).await.unwrap();

        assert_eq!(second.calls()[0], page_url("north-a", 2));
        assert_eq!(resumed.into_output(), expected);
    }

    #[tokio::test]
    async fn test_complete_units_are_not_fetched_again() {
        let dir = TempDir::new().unwrap();
        crawler(&dir).run(&mut full_script()).await.unwrap();

        let mut fetcher = ScriptedFetcher::new();
        let mut again = crawler(&dir);
        again.run(&mut fetcher).await.unwrap();

        assert!(fetcher.calls().is_empty());
        assert_eq!(again.state().total_items(), 17);
    }

    #[tokio::test]
    async fn test_failure_leaves_snapshot_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("listing.json");

        let mut first = ScriptedFetcher::new();
        first.push(&page_url("south", 1), ok(""));
        first.push(&page_url("north-a", 1), ok(&lines("a", 3)));
        first.push(
            &page_url("north-a", 2),
            Err(FetchError::FetchFailed {
                url: page_url("north-a", 2),
                status: 500,
            }),
        );
        assert!(crawler(&dir).run(&mut first).await.is_err());
        let stored = std::fs::read_to_string(&path).unwrap();

        // Retrying into the same failure must not rewrite the snapshot
        let mut second = ScriptedFetcher::new();
        second.push(
            &page_url("north-a", 2),
            Err(FetchError::FetchFailed {
                url: page_url("north-a", 2),
                status: 500,
            }),
        );
        assert!(crawler(&dir).run(&mut second).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), stored);
    }

    #[tokio::test]
    async fn test_extraction_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let mut fetcher = ScriptedFetcher::new();
        fetcher.push(&page_url("south", 1), ok(""));
        fetcher.push(&page_url("north-a", 1), ok("not a record line"));

        let err = crawler(&dir).run(&mut fetcher).await.unwrap_err();
        assert!(matches!(err, TrawlError::Extract(_)));

        let reloaded = crawler(&dir);
        let a = UnitKey::new("north-a", "A");
        assert_eq!(reloaded.state().status(&a), UnitStatus::NotStarted);
    }
}
