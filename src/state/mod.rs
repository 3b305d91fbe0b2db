//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UnitStatus`: where a taxonomy leaf stands in a stage (not started, in progress, complete)
//! - `CrawlState`: per-stage aggregate of cursors, accumulated items and completed units
//!
//! The aggregate is only ever mutated inside a [`Checkpoint`](crate::checkpoint::Checkpoint)
//! transaction.

mod crawl_state;
mod unit_status;

pub use crawl_state::{CrawlState, DetailState, ListingState, UnitProgress};
pub use unit_status::UnitStatus;
