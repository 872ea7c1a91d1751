//! Dashboard data layer for `CallScope`
//!
//! Query cache, data-fetch hooks, cross-view refresh on finished analyses,
//! the filter-change coordinator and the view model the dashboard screen
//! renders from.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod api_client;
pub mod cache;
pub mod controller;
pub mod events;
pub mod keys;
pub mod mock;
pub mod notifications;
pub mod queries;
pub mod tracking;
pub mod view;

// Re-export commonly used types
pub use api_client::{DashboardApi, HttpDashboardApi};
pub use cache::{QueryCache, QueryState};
pub use controller::DashboardController;
pub use events::{AnalysisComplete, AnalysisEventBus, RefreshListener};
pub use keys::QueryKey;
pub use mock::MockDashboardApi;
pub use notifications::{ChannelNotifier, LogNotifier, Notifier, Toast};
pub use queries::DashboardQueries;
pub use tracking::AnalysisTracking;
pub use view::{DashboardScreen, DashboardView, Section};

use callscope_core::{Config, OrganizationId, Result};
use std::sync::Arc;

/// Build a controller talking to the configured backend over HTTP
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn connect(
    config: &Config,
    org: OrganizationId,
    notifier: Arc<dyn Notifier>,
) -> Result<DashboardController> {
    let api: Arc<dyn DashboardApi> = Arc::new(HttpDashboardApi::from_config(&config.api)?);
    Ok(with_api(config, api, org, notifier))
}

/// Build a controller over any [`DashboardApi`]
pub fn with_api(
    config: &Config,
    api: Arc<dyn DashboardApi>,
    org: OrganizationId,
    notifier: Arc<dyn Notifier>,
) -> DashboardController {
    let queries = DashboardQueries::from_config(api, &config.dashboard);
    DashboardController::new(
        queries,
        AnalysisTracking::new(),
        notifier,
        org,
        &config.dashboard,
    )
}
