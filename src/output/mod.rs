//! Output module for stage summaries and progress reports

mod summary;

pub use summary::{print_summary, print_unit_progress, StageSummary};
