//! Data-fetch hooks for the dashboard queries
//!
//! Each hook binds one cache key to the backend call that fills it. Hooks
//! are disabled while no organization is selected: they return
//! [`QueryState::disabled`] without touching the cache or the backend.

use crate::api_client::DashboardApi;
use crate::cache::{QueryCache, QueryFn, QueryState, query_fn};
use crate::keys::QueryKey;
use callscope_core::config::DashboardConfig;
use callscope_core::types::{DashboardMetrics, SentimentTrendPoint, TranscriptPage};
use callscope_core::{OrganizationId, Result};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Typed access to every dashboard query through a shared [`QueryCache`]
#[derive(Clone)]
pub struct DashboardQueries {
    api: Arc<dyn DashboardApi>,
    cache: QueryCache,
    scope_metrics_by_org: bool,
}

impl fmt::Debug for DashboardQueries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardQueries")
            .field("cache", &self.cache)
            .field("scope_metrics_by_org", &self.scope_metrics_by_org)
            .finish_non_exhaustive()
    }
}

impl DashboardQueries {
    /// Create hooks over `api` sharing `cache`
    pub fn new(api: Arc<dyn DashboardApi>, cache: QueryCache) -> Self {
        Self {
            api,
            cache,
            scope_metrics_by_org: false,
        }
    }

    /// Create hooks with a fresh cache configured from `config`
    pub fn from_config(api: Arc<dyn DashboardApi>, config: &DashboardConfig) -> Self {
        Self::new(api, QueryCache::new(config.stale_time()))
            .with_metrics_scoped_by_org(config.scope_metrics_by_org)
    }

    /// Include the organization in the metrics key
    #[must_use]
    pub const fn with_metrics_scoped_by_org(mut self, scoped: bool) -> Self {
        self.scope_metrics_by_org = scoped;
        self
    }

    /// The underlying cache
    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Key of the metrics entry for a backend date filter
    #[must_use]
    pub fn metrics_key(&self, org: &OrganizationId, api_filter: &str) -> QueryKey {
        QueryKey::dashboard_metrics(org, api_filter, self.scope_metrics_by_org)
    }

    /// Summary metrics for a backend date filter
    pub async fn dashboard_metrics(
        &self,
        org: &OrganizationId,
        api_filter: &str,
    ) -> QueryState<DashboardMetrics> {
        self.run(org, false, || self.metrics_query(org, api_filter))
            .await
    }

    /// Refetch summary metrics, bypassing the staleness window
    pub async fn refetch_dashboard_metrics(
        &self,
        org: &OrganizationId,
        api_filter: &str,
    ) -> QueryState<DashboardMetrics> {
        self.run(org, true, || self.metrics_query(org, api_filter))
            .await
    }

    /// Sentiment of recent calls
    pub async fn sentiment_trends(
        &self,
        org: &OrganizationId,
    ) -> QueryState<Vec<SentimentTrendPoint>> {
        self.run(org, false, || self.sentiment_query(org)).await
    }

    /// Refetch sentiment trends
    pub async fn refetch_sentiment_trends(
        &self,
        org: &OrganizationId,
    ) -> QueryState<Vec<SentimentTrendPoint>> {
        self.run(org, true, || self.sentiment_query(org)).await
    }

    /// Most frequent objections
    pub async fn common_objections(&self, org: &OrganizationId) -> QueryState<Value> {
        self.run(org, false, || self.objections_query(org)).await
    }

    /// Refetch common objections
    pub async fn refetch_common_objections(&self, org: &OrganizationId) -> QueryState<Value> {
        self.run(org, true, || self.objections_query(org)).await
    }

    /// One page of transcripts
    pub async fn transcripts(
        &self,
        org: &OrganizationId,
        page: u32,
        limit: u32,
    ) -> QueryState<TranscriptPage> {
        self.run(org, false, || self.transcripts_query(org, page, limit))
            .await
    }

    /// Refetch one page of transcripts
    pub async fn refetch_transcripts(
        &self,
        org: &OrganizationId,
        page: u32,
        limit: u32,
    ) -> QueryState<TranscriptPage> {
        self.run(org, true, || self.transcripts_query(org, page, limit))
            .await
    }

    /// Questions-asked rate
    pub async fn questions_rate(&self, org: &OrganizationId) -> QueryState<Value> {
        self.run(org, false, || self.questions_rate_query(org)).await
    }

    /// Refetch the questions-asked rate
    pub async fn refetch_questions_rate(&self, org: &OrganizationId) -> QueryState<Value> {
        self.run(org, true, || self.questions_rate_query(org)).await
    }

    /// Topic coherence scores
    pub async fn topic_coherence(&self, org: &OrganizationId) -> QueryState<Value> {
        self.run(org, false, || self.topic_coherence_query(org)).await
    }

    /// Refetch topic coherence scores
    pub async fn refetch_topic_coherence(&self, org: &OrganizationId) -> QueryState<Value> {
        self.run(org, true, || self.topic_coherence_query(org)).await
    }

    /// Objection categories over an optional date range
    pub async fn objection_categories_trend(
        &self,
        org: &OrganizationId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> QueryState<Value> {
        self.run(org, false, || {
            self.objection_trend_query(org, start_date, end_date)
        })
        .await
    }

    /// Refetch objection categories
    pub async fn refetch_objection_categories_trend(
        &self,
        org: &OrganizationId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> QueryState<Value> {
        self.run(org, true, || {
            self.objection_trend_query(org, start_date, end_date)
        })
        .await
    }

    /// Mark the metrics entry for `api_filter` stale and refetch it if it
    /// was loaded. Returns the key and how many entries were invalidated.
    pub async fn invalidate_metrics(
        &self,
        org: &OrganizationId,
        api_filter: &str,
    ) -> (QueryKey, usize) {
        let key = self.metrics_key(org, api_filter);
        let invalidated = self.cache.invalidate(&key).await;
        (key, invalidated)
    }

    async fn run<T>(
        &self,
        org: &OrganizationId,
        force: bool,
        query: impl FnOnce() -> (QueryKey, QueryFn),
    ) -> QueryState<T>
    where
        T: Send + Sync + 'static,
    {
        if !org.is_present() {
            debug!("no organization selected, query disabled");
            return QueryState::disabled();
        }

        let (key, query_fn) = query();
        if force && self.cache.contains(&key) {
            self.cache.refetch(&key).await
        } else {
            self.cache.fetch(&key, query_fn).await
        }
    }

    fn bind<T, F, Fut>(&self, org: &OrganizationId, fetch: F) -> QueryFn
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<dyn DashboardApi>, OrganizationId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let org = org.clone();
        query_fn(move || fetch(Arc::clone(&api), org.clone()))
    }

    fn metrics_query(&self, org: &OrganizationId, api_filter: &str) -> (QueryKey, QueryFn) {
        let filter = api_filter.to_string();
        let fetch = self.bind(org, move |api, org| {
            let filter = filter.clone();
            async move { api.dashboard_metrics(&org, &filter).await }
        });
        (self.metrics_key(org, api_filter), fetch)
    }

    fn sentiment_query(&self, org: &OrganizationId) -> (QueryKey, QueryFn) {
        let fetch = self.bind(org, |api, org| async move {
            api.sentiment_trends(&org).await
        });
        (QueryKey::sentiment_trends(org), fetch)
    }

    fn objections_query(&self, org: &OrganizationId) -> (QueryKey, QueryFn) {
        let fetch = self.bind(org, |api, org| async move {
            api.common_objections(&org).await
        });
        (QueryKey::common_objections(org), fetch)
    }

    fn transcripts_query(&self, org: &OrganizationId, page: u32, limit: u32) -> (QueryKey, QueryFn) {
        let fetch = self.bind(org, move |api, org| async move {
            api.transcripts(&org, page, limit).await
        });
        (QueryKey::transcripts(org, page, limit), fetch)
    }

    fn questions_rate_query(&self, org: &OrganizationId) -> (QueryKey, QueryFn) {
        let fetch = self.bind(org, |api, org| async move {
            api.questions_rate(&org).await
        });
        (QueryKey::questions_rate(org), fetch)
    }

    fn topic_coherence_query(&self, org: &OrganizationId) -> (QueryKey, QueryFn) {
        let fetch = self.bind(org, |api, org| async move {
            api.topic_coherence(&org).await
        });
        (QueryKey::topic_coherence(org), fetch)
    }

    fn objection_trend_query(
        &self,
        org: &OrganizationId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> (QueryKey, QueryFn) {
        let start = start_date.map(ToString::to_string);
        let end = end_date.map(ToString::to_string);
        let fetch = self.bind(org, move |api, org| {
            let start = start.clone();
            let end = end.clone();
            async move {
                api.objection_categories_trend(&org, start.as_deref(), end.as_deref())
                    .await
            }
        });
        (
            QueryKey::objection_categories_trend(org, start_date, end_date),
            fetch,
        )
    }
}
