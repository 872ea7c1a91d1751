//! Shared helpers for dashboard integration tests

#![allow(dead_code)]

use callscope_core::OrganizationId;
use callscope_core::config::DashboardConfig;
use callscope_dashboard::{
    AnalysisTracking, ChannelNotifier, DashboardApi, DashboardController, DashboardQueries,
    MockDashboardApi, Toast,
};
use std::sync::{Arc, Once};
use tokio::sync::mpsc::UnboundedReceiver;

static INIT_LOGGER: Once = Once::new();

/// Initialize test logging once per test binary
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// A controller wired to a mock backend
pub struct Harness {
    pub controller: DashboardController,
    pub mock: Arc<MockDashboardApi>,
    pub tracking: AnalysisTracking,
    pub toasts: UnboundedReceiver<Toast>,
}

impl Harness {
    /// Harness over the demo dataset
    pub fn new(org: &str) -> Self {
        Self::with_mock(org, MockDashboardApi::demo(), &DashboardConfig::default())
    }

    /// Harness over a prepared mock
    pub fn with_mock(org: &str, mock: MockDashboardApi, config: &DashboardConfig) -> Self {
        init_test_logging();

        let mock = Arc::new(mock);
        let queries =
            DashboardQueries::from_config(Arc::clone(&mock) as Arc<dyn DashboardApi>, config);
        let tracking = AnalysisTracking::new();
        let (notifier, toasts) = ChannelNotifier::new();
        let controller = DashboardController::new(
            queries,
            tracking.clone(),
            Arc::new(notifier),
            OrganizationId::from(org),
            config,
        );

        Self {
            controller,
            mock,
            tracking,
            toasts,
        }
    }

    /// All toasts delivered so far
    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        let mut toasts = Vec::new();
        while let Ok(toast) = self.toasts.try_recv() {
            toasts.push(toast);
        }
        toasts
    }
}
