//! Block detection
//!
//! A block detector looks at a successful response body and decides whether it was
//! served by anti-automation defenses instead of genuine content.

/// Classifies response bodies as blocking pages
pub trait BlockDetector: Send + Sync {
    fn is_blocked(&self, body: &str) -> bool;
}

impl<F> BlockDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_blocked(&self, body: &str) -> bool {
        self(body)
    }
}

/// Flags bodies containing any of a set of markers, ignoring case
///
/// With no markers, nothing is ever flagged.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    markers: Vec<String>,
}

impl MarkerDetector {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// The usual detector: any page mentioning a captcha
    pub fn captcha() -> Self {
        Self::new(["captcha"])
    }
}

impl BlockDetector for MarkerDetector {
    fn is_blocked(&self, body: &str) -> bool {
        if self.markers.is_empty() {
            return false;
        }
        let lowered = body.to_lowercase();
        self.markers.iter().any(|m| lowered.contains(m.as_str()))
    }
}
