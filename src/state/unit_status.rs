/// Unit status definitions for tracking crawl progress
///
/// Every taxonomy leaf moves through the same three states in both stages; only the
/// meaning of the cursor differs (pages fetched, or records enriched).
use std::fmt;

/// Where a unit stands in the current stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitStatus {
    /// No step has been recorded yet
    NotStarted,

    /// Some steps are recorded; the cursor counts them
    InProgress(usize),

    /// The unit is finished and will never be fetched again
    Complete,
}

impl UnitStatus {
    /// Returns true if the unit still needs work
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Complete)
    }

    /// Number of steps already recorded, if the unit is not complete
    pub fn cursor(&self) -> Option<usize> {
        match self {
            Self::NotStarted => Some(0),
            Self::InProgress(cursor) => Some(*cursor),
            Self::Complete => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress(_) => "in_progress",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress(cursor) => write!(f, "in_progress({})", cursor),
            other => write!(f, "{}", other.label()),
        }
    }
}
