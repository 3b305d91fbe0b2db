//! Run orchestration: builds both stages from configuration and runs them in order

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::crawler::{DetailCrawler, ListingCrawler, DETAIL_STAGE, LISTING_STAGE};
use crate::dispatch::{BackoffDispatcher, Fetch, RequestDispatcher, SearchTemplate};
use crate::extract::{listing_extractor, SelectorDetailExtractor};
use crate::output::StageSummary;
use crate::state::{DetailState, ListingState};
use crate::taxonomy::{AddressTaxonomy, UnitKey};
use crate::{Record, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which stages a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub listing: bool,
    pub detail: bool,
    /// Ignore existing snapshots of the selected stages
    pub fresh: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            listing: true,
            detail: true,
            fresh: false,
        }
    }
}

/// The dispatcher stack used by a real run
pub type DefaultFetcher = BackoffDispatcher<RequestDispatcher>;

/// Owns everything one run needs: configuration, taxonomy and the single fetcher
pub struct Trawler<F> {
    config: Config,
    taxonomy: Arc<AddressTaxonomy>,
    fetcher: F,
}

impl Trawler<DefaultFetcher> {
    /// Builds the taxonomy and the dispatcher stack from configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use catalog_trawler::config::load_config;
    /// use catalog_trawler::crawler::{RunOptions, Trawler};
    /// use std::path::Path;
    ///
    /// # async fn run() -> catalog_trawler::Result<()> {
    /// let config = load_config(Path::new("trawler.toml"))?;
    /// let mut trawler = Trawler::from_config(config)?;
    /// trawler.run(RunOptions::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: Config) -> Result<Self> {
        let taxonomy = Arc::new(AddressTaxonomy::from_config(&config.areas)?);
        let dispatcher = RequestDispatcher::from_config(&config.dispatcher)?;
        let fetcher = BackoffDispatcher::from_config(dispatcher, &config.dispatcher)?;
        Ok(Self::new(config, taxonomy, fetcher))
    }
}

impl<F: Fetch> Trawler<F> {
    pub fn new(config: Config, taxonomy: Arc<AddressTaxonomy>, fetcher: F) -> Self {
        Self {
            config,
            taxonomy,
            fetcher,
        }
    }

    pub fn taxonomy(&self) -> &AddressTaxonomy {
        &self.taxonomy
    }

    /// Runs the selected stages in order and returns their summaries
    ///
    /// 1. Pages through every leaf's search results (listing stage)
    /// 2. Enriches the records of every completed listing (detail stage)
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StageSummary>)` - One summary per stage that ran
    /// * `Err(TrawlError)` - The first fatal error; snapshots keep the last finished step
    pub async fn run(&mut self, options: RunOptions) -> Result<Vec<StageSummary>> {
        let mut summaries = Vec::new();

        if options.listing {
            let (_, summary) = self.run_listing(options.fresh).await?;
            summaries.push(summary);
        }
        if options.detail {
            let (_, summary) = self.run_detail(options.fresh).await?;
            summaries.push(summary);
        }

        Ok(summaries)
    }

    /// Runs the listing stage to completion
    pub async fn run_listing(&mut self, fresh: bool) -> Result<(ListingState, StageSummary)> {
        let search = SearchTemplate::from_config(&self.config.search)?;
        let extractor = listing_extractor(&self.config.listing)?;
        let checkpoint = self.open_checkpoint(LISTING_STAGE, fresh)?;

        let mut crawler = ListingCrawler::new(Arc::clone(&self.taxonomy), search, extractor, checkpoint);
        crawler.run(&mut self.fetcher).await?;

        let state = crawler.state().clone();
        let summary = StageSummary::from_state(LISTING_STAGE, &self.taxonomy, &state);
        summary.log();
        Ok((state, summary))
    }

    /// Runs the detail stage over the listing snapshot
    ///
    /// Only units whose listing is complete are enriched, so a unit's detail work never
    /// starts before its record list is final. A unit whose listing was crawled again
    /// since it was enriched starts over.
    pub async fn run_detail(&mut self, fresh: bool) -> Result<(DetailState, StageSummary)> {
        let listings = self.completed_listings()?;
        let extractor = SelectorDetailExtractor::from_config(&self.config.detail, Arc::clone(&self.taxonomy))?;
        let checkpoint = self.open_checkpoint(DETAIL_STAGE, fresh)?;

        let mut crawler = DetailCrawler::new(Arc::clone(&self.taxonomy), extractor, checkpoint);
        crawler.run(&mut self.fetcher, &listings).await?;

        let state = crawler.state().clone();
        let summary =
            StageSummary::from_state(DETAIL_STAGE, &self.taxonomy, &state).with_resolution(&state);
        summary.log();
        Ok((state, summary))
    }

    /// Reads the listing snapshot and keeps only completed units
    fn completed_listings(&self) -> Result<BTreeMap<UnitKey, Vec<Record>>> {
        let listing: Checkpoint<ListingState> = Checkpoint::load(
            self.config.checkpoint.listing_path(),
            LISTING_STAGE,
            &self.taxonomy.fingerprint(),
        )?;
        let state = listing.into_state();

        let pending = self
            .taxonomy
            .leaves()
            .iter()
            .filter(|leaf| !state.is_complete(&leaf.key()))
            .count();
        if pending > 0 {
            tracing::warn!(
                "{} units have no complete listing yet and are left out of the detail stage",
                pending
            );
        }

        Ok(state.into_completed_output())
    }

    fn open_checkpoint<S>(&self, stage: &str, fresh: bool) -> Result<Checkpoint<S>>
    where
        S: serde::Serialize + serde::de::DeserializeOwned + Clone + Default,
    {
        let path = match stage {
            LISTING_STAGE => self.config.checkpoint.listing_path(),
            _ => self.config.checkpoint.detail_path(),
        };
        let fingerprint = self.taxonomy.fingerprint();

        if fresh {
            tracing::info!("Starting {} stage fresh, ignoring {}", stage, path.display());
            return Ok(Checkpoint::fresh(path, stage, &fingerprint));
        }
        Ok(Checkpoint::load(path, stage, &fingerprint)?)
    }
}
