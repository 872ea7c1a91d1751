//! Dashboard screen controller
//!
//! Owns the user's selections (organization, date filter, transcript page)
//! and coordinates the cache when they change or when an analysis
//! completes elsewhere in the application.

use crate::events::{AnalysisComplete, AnalysisEventBus, RefreshListener};
use crate::keys::QueryKey;
use crate::notifications::{Notifier, Toast};
use crate::queries::DashboardQueries;
use crate::tracking::AnalysisTracking;
use crate::view::{DashboardScreen, DashboardView, ViewInputs};
use callscope_core::config::DashboardConfig;
use callscope_core::types::{DashboardMetrics, SentimentTrendPoint, TranscriptPage};
use callscope_core::{DateFilter, OrganizationId};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct ControllerState {
    org: OrganizationId,
    filter: DateFilter,
    page: u32,
    /// Page count of the last loaded transcript page, 0 until known
    pages: u32,
    refresh_trigger: u64,
}

struct ControllerInner {
    queries: DashboardQueries,
    tracking: AnalysisTracking,
    notifier: Arc<dyn Notifier>,
    page_size: u32,
    state: RwLock<ControllerState>,
    /// Analysis-complete events fully handled
    refreshed: watch::Sender<u64>,
}

/// Coordinates the dashboard's queries, selections and notifications.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DashboardController {
    inner: Arc<ControllerInner>,
}

impl fmt::Debug for DashboardController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardController")
            .field("state", &*self.inner.state.read())
            .field("page_size", &self.inner.page_size)
            .finish_non_exhaustive()
    }
}

impl DashboardController {
    /// Create a controller for `org` with the all-time filter on page 1
    pub fn new(
        queries: DashboardQueries,
        tracking: AnalysisTracking,
        notifier: Arc<dyn Notifier>,
        org: OrganizationId,
        config: &DashboardConfig,
    ) -> Self {
        let (refreshed, _) = watch::channel(0);
        Self {
            inner: Arc::new(ControllerInner {
                queries,
                tracking,
                notifier,
                page_size: config.transcripts_page_size.max(1),
                state: RwLock::new(ControllerState {
                    org,
                    filter: DateFilter::default(),
                    page: 1,
                    pages: 0,
                    refresh_trigger: 0,
                }),
                refreshed,
            }),
        }
    }

    /// The query hooks
    #[must_use]
    pub fn queries(&self) -> &DashboardQueries {
        &self.inner.queries
    }

    /// Selected organization
    #[must_use]
    pub fn organization(&self) -> OrganizationId {
        self.inner.state.read().org.clone()
    }

    /// Switch organization; the transcript list restarts at page 1
    pub fn set_organization(&self, org: OrganizationId) {
        let mut state = self.inner.state.write();
        debug!(from = %state.org, to = %org, "switching organization");
        state.org = org;
        state.page = 1;
        state.pages = 0;
    }

    /// Selected date filter
    #[must_use]
    pub fn date_filter(&self) -> DateFilter {
        self.inner.state.read().filter.clone()
    }

    /// Backend form of the selected date filter
    #[must_use]
    pub fn api_date_filter(&self) -> String {
        self.inner.state.read().filter.api_value().to_string()
    }

    /// How many analysis-complete events have been handled
    #[must_use]
    pub fn refresh_trigger(&self) -> u64 {
        self.inner.state.read().refresh_trigger
    }

    /// Watch the number of analysis-complete events whose refresh has
    /// finished.
    ///
    /// Unlike [`Self::refresh_trigger`], which counts events as they arrive,
    /// this only changes once the metrics refetch has settled and the toast
    /// was sent.
    #[must_use]
    pub fn refreshes(&self) -> watch::Receiver<u64> {
        self.inner.refreshed.subscribe()
    }

    /// Selected transcript page (1-based)
    #[must_use]
    pub fn page(&self) -> u32 {
        self.inner.state.read().page
    }

    /// Transcripts per page
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    /// Select a transcript page, clamped to the known page range
    pub fn set_page(&self, page: u32) -> u32 {
        let mut state = self.inner.state.write();
        let last = state.pages.max(1);
        state.page = if state.pages == 0 {
            page.max(1)
        } else {
            page.clamp(1, last)
        };
        state.page
    }

    /// Move to the next page unless on the last one
    pub fn next_page(&self) -> u32 {
        let page = self.page();
        self.set_page(page.saturating_add(1))
    }

    /// Move to the previous page unless on the first one
    pub fn previous_page(&self) -> u32 {
        let page = self.page();
        self.set_page(page.saturating_sub(1))
    }

    /// Apply a new date filter.
    ///
    /// The metrics key is derived from `filter` itself, never from the
    /// filter selected before the call. Only the metrics entry is
    /// invalidated.
    pub async fn change_filter(&self, filter: DateFilter) -> QueryKey {
        let org = {
            let mut state = self.inner.state.write();
            state.filter = filter.clone();
            state.org.clone()
        };

        let api_filter = filter.api_value();
        let (key, invalidated) = self.inner.queries.invalidate_metrics(&org, api_filter).await;
        info!(filter = %filter, %key, invalidated, "date filter changed");

        self.inner.notifier.notify(Toast::new(
            "Filter applied",
            format!("Dashboard data filtered to show: {}", filter.label()),
        ));
        key
    }

    /// React to a finished analysis: bump the refresh trigger, consume the
    /// recorded start page and refresh the metrics for the current filter.
    pub async fn handle_analysis_complete(&self, event: &AnalysisComplete) -> QueryKey {
        let (org, api_filter, trigger) = {
            let mut state = self.inner.state.write();
            state.refresh_trigger += 1;
            (
                state.org.clone(),
                state.filter.api_value().to_string(),
                state.refresh_trigger,
            )
        };
        let start_page = self.inner.tracking.take_start_page();

        let (key, invalidated) = self.inner.queries.invalidate_metrics(&org, &api_filter).await;
        info!(
            event_id = %event.id,
            transcript_id = ?event.transcript_id,
            start_page = ?start_page,
            trigger,
            %key,
            invalidated,
            "analysis complete, dashboard refreshed"
        );

        self.inner.notifier.notify(Toast::new(
            "New analysis added!",
            "Dashboard has been updated with latest data.",
        ));
        self.inner.refreshed.send_modify(|handled| *handled += 1);
        key
    }

    /// Refresh the dashboard on every event published on `bus` until the
    /// returned listener is shut down or dropped
    #[must_use]
    pub fn listen(&self, bus: &AnalysisEventBus) -> RefreshListener {
        let controller = self.clone();
        RefreshListener::spawn(bus.subscribe(), move |event| {
            let controller = controller.clone();
            async move {
                controller.handle_analysis_complete(&event).await;
            }
        })
    }

    /// Confirm a report export
    pub fn export(&self) {
        info!("dashboard report exported");
        self.inner.notifier.notify(Toast::new(
            "Export complete",
            "Your dashboard report has been downloaded.",
        ));
    }

    /// Run the dashboard queries concurrently and build the screen
    pub async fn load(&self) -> DashboardScreen {
        let (org, filter, page) = self.selection();
        if !org.is_present() {
            return DashboardScreen::NoOrganization;
        }

        let queries = &self.inner.queries;
        let api_filter = filter.api_value();
        let (metrics, trends, objections, transcripts) = tokio::join!(
            queries.dashboard_metrics(&org, api_filter),
            queries.sentiment_trends(&org),
            queries.common_objections(&org),
            queries.transcripts(&org, page, self.inner.page_size),
        );

        if let Some(pagination) = transcripts.data().and_then(|t| t.pagination) {
            let mut state = self.inner.state.write();
            if state.org == org && state.page == page {
                state.pages = pagination.pages;
            } else {
                debug!(%org, page, "selection changed while loading, page count not recorded");
            }
        }

        DashboardScreen::Ready(Box::new(DashboardView::build(&ViewInputs {
            filter: &filter,
            page,
            metrics: &metrics,
            sentiment_trends: &trends,
            common_objections: &objections,
            transcripts: &transcripts,
        })))
    }

    /// Build the screen from what is cached right now, without fetching
    #[must_use]
    pub fn snapshot(&self) -> DashboardScreen {
        let (org, filter, page) = self.selection();
        if !org.is_present() {
            return DashboardScreen::NoOrganization;
        }

        let queries = &self.inner.queries;
        let cache = queries.cache();
        let metrics = cache.state::<DashboardMetrics>(&queries.metrics_key(&org, filter.api_value()));
        let trends = cache.state::<Vec<SentimentTrendPoint>>(&QueryKey::sentiment_trends(&org));
        let objections = cache.state::<Value>(&QueryKey::common_objections(&org));
        let transcripts = cache.state::<TranscriptPage>(&QueryKey::transcripts(
            &org,
            page,
            self.inner.page_size,
        ));

        DashboardScreen::Ready(Box::new(DashboardView::build(&ViewInputs {
            filter: &filter,
            page,
            metrics: &metrics,
            sentiment_trends: &trends,
            common_objections: &objections,
            transcripts: &transcripts,
        })))
    }

    fn selection(&self) -> (OrganizationId, DateFilter, u32) {
        let state = self.inner.state.read();
        (state.org.clone(), state.filter.clone(), state.page)
    }
}
