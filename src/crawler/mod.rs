//! Crawler module: the two crawl stages and the run that ties them together
//!
//! - [`ListingCrawler`] pages through search results per taxonomy leaf
//! - [`DetailCrawler`] enriches every listed record from its detail page
//! - [`Trawler`] builds both from configuration and runs them in order
//!
//! Both stages are strictly sequential. Each step (one result page, or one detail
//! record) is stored in its own checkpoint transaction, so killing the process
//! between steps never loses work.

mod detail;
mod listing;
mod trawler;

pub use detail::{DetailCrawler, DETAIL_STAGE};
pub use listing::{ListingCrawler, LISTING_STAGE};
pub use trawler::{DefaultFetcher, RunOptions, Trawler};
