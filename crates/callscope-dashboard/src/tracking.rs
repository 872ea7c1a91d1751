//! Where the user started an analysis

use parking_lot::Mutex;
use std::sync::Arc;

/// Remembers the page the user was on when they started an analysis, so
/// the completion handler can read it exactly once.
#[derive(Debug, Clone, Default)]
pub struct AnalysisTracking {
    start_page: Arc<Mutex<Option<String>>>,
}

impl AnalysisTracking {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the page an analysis was started from
    pub fn record_start_page(&self, page: impl Into<String>) {
        *self.start_page.lock() = Some(page.into());
    }

    /// Current start page without clearing it
    #[must_use]
    pub fn start_page(&self) -> Option<String> {
        self.start_page.lock().clone()
    }

    /// Read and clear the start page
    pub fn take_start_page(&self) -> Option<String> {
        self.start_page.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_take_clears() {
        let tracking = AnalysisTracking::new();
        tracking.record_start_page("/dashboard");

        assert_eq!(tracking.start_page().as_deref(), Some("/dashboard"));
        assert_eq!(tracking.take_start_page().as_deref(), Some("/dashboard"));
        assert_eq!(tracking.take_start_page(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let tracking = AnalysisTracking::new();
        let other = tracking.clone();
        other.record_start_page("/transcripts");
        assert_eq!(tracking.start_page().as_deref(), Some("/transcripts"));
    }
}
