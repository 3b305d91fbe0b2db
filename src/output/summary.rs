//! Stage summaries built from crawl state
//!
//! This module turns a stage's aggregate into counts per unit status, and prints them
//! either as a short overview or as a per-unit progress table.

use crate::state::{CrawlState, DetailState, UnitStatus};
use crate::taxonomy::AddressTaxonomy;

/// Progress overview of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: String,

    /// Number of taxonomy leaves
    pub units_total: usize,
    pub units_complete: usize,
    pub units_in_progress: usize,
    pub units_not_started: usize,

    /// Items accumulated across all units
    pub records: usize,

    /// Detail stage only: records whose address matched a configured area
    pub resolved: Option<usize>,
}

impl StageSummary {
    /// Counts unit statuses over every leaf of the taxonomy
    ///
    /// # Arguments
    ///
    /// * `stage` - Stage name shown in logs and printouts
    /// * `taxonomy` - Taxonomy whose leaves are the units to count
    /// * `state` - The stage's aggregate
    ///
    /// Units present in `state` but no longer in the taxonomy are not counted; their
    /// items still are.
    pub fn from_state<T>(stage: &str, taxonomy: &AddressTaxonomy, state: &CrawlState<T>) -> Self {
        let mut summary = Self {
            stage: stage.to_string(),
            units_total: 0,
            units_complete: 0,
            units_in_progress: 0,
            units_not_started: 0,
            records: state.total_items(),
            resolved: None,
        };

        for leaf in taxonomy.leaves() {
            summary.units_total += 1;
            match state.status(&leaf.key()) {
                UnitStatus::Complete => summary.units_complete += 1,
                UnitStatus::InProgress(_) => summary.units_in_progress += 1,
                UnitStatus::NotStarted => summary.units_not_started += 1,
            }
        }

        summary
    }

    /// Counts resolved addresses of a detail stage
    pub fn with_resolution(mut self, state: &DetailState) -> Self {
        let resolved = state
            .units()
            .flat_map(|unit| state.items(unit))
            .filter(|record| record.is_resolved())
            .count();
        self.resolved = Some(resolved);
        self
    }

    pub fn unresolved(&self) -> Option<usize> {
        self.resolved.map(|resolved| self.records - resolved)
    }

    pub fn is_finished(&self) -> bool {
        self.units_complete == self.units_total
    }

    /// Logs the summary at info level
    pub fn log(&self) {
        tracing::info!(
            "{} stage: {}/{} units complete, {} in progress, {} not started, {} records",
            self.stage,
            self.units_complete,
            self.units_total,
            self.units_in_progress,
            self.units_not_started,
            self.records
        );
        if let (Some(resolved), Some(unresolved)) = (self.resolved, self.unresolved()) {
            tracing::info!(
                "{} stage: {} addresses resolved, {} unresolved",
                self.stage,
                resolved,
                unresolved
            );
        }
    }
}

/// Prints a summary to stdout in a formatted manner
///
/// # Example
///
/// ```no_run
/// use catalog_trawler::checkpoint::Checkpoint;
/// use catalog_trawler::config::load_config;
/// use catalog_trawler::output::{print_summary, StageSummary};
/// use catalog_trawler::state::ListingState;
/// use catalog_trawler::AddressTaxonomy;
/// use std::path::Path;
///
/// let config = load_config(Path::new("trawler.toml")).unwrap();
/// let taxonomy = AddressTaxonomy::from_config(&config.areas).unwrap();
/// let checkpoint: Checkpoint<ListingState> = Checkpoint::load(
///     config.checkpoint.listing_path(),
///     "listing",
///     &taxonomy.fingerprint(),
/// )
/// .unwrap();
///
/// print_summary(&StageSummary::from_state("listing", &taxonomy, checkpoint.state()));
/// ```
pub fn print_summary(summary: &StageSummary) {
    println!("=== {} stage ===\n", summary.stage);

    println!("Units:");
    println!("  Total: {}", summary.units_total);
    println!("  Complete: {}", summary.units_complete);
    println!("  In progress: {}", summary.units_in_progress);
    println!("  Not started: {}", summary.units_not_started);
    println!();

    println!("Records: {}", summary.records);
    if let (Some(resolved), Some(unresolved)) = (summary.resolved, summary.unresolved()) {
        let rate = if summary.records > 0 {
            (resolved as f64 / summary.records as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  Resolved addresses: {} ({:.1}%), unresolved: {}",
            resolved, rate, unresolved
        );
    }
    println!();
}

/// Prints the progress of every leaf, in taxonomy order
pub fn print_unit_progress<T>(stage: &str, taxonomy: &AddressTaxonomy, state: &CrawlState<T>) {
    println!("{} units:", stage);
    for leaf in taxonomy.leaves() {
        let unit = leaf.key();
        println!(
            "  {:<40} {:<18} {} records",
            unit.to_string(),
            state.status(&unit).to_string(),
            state.items(&unit).len()
        );
    }
    println!();
}
