//! HTTP client for the analytics backend

use async_trait::async_trait;
use callscope_core::config::ApiConfig;
use callscope_core::types::{DashboardMetrics, SentimentTrendPoint, TranscriptPage};
use callscope_core::{Error, OrganizationId, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Read operations the dashboard needs from the backend
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Summary metrics for a backend date filter (`""` means all time)
    async fn dashboard_metrics(
        &self,
        org: &OrganizationId,
        api_filter: &str,
    ) -> Result<DashboardMetrics>;

    /// Sentiment of recent calls
    async fn sentiment_trends(&self, org: &OrganizationId) -> Result<Vec<SentimentTrendPoint>>;

    /// Most frequent objections
    async fn common_objections(&self, org: &OrganizationId) -> Result<Value>;

    /// One page of transcripts
    async fn transcripts(
        &self,
        org: &OrganizationId,
        page: u32,
        limit: u32,
    ) -> Result<TranscriptPage>;

    /// Questions-asked rate
    async fn questions_rate(&self, org: &OrganizationId) -> Result<Value>;

    /// Topic coherence scores
    async fn topic_coherence(&self, org: &OrganizationId) -> Result<Value>;

    /// Objection categories over an optional date range
    async fn objection_categories_trend(
        &self,
        org: &OrganizationId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Value>;
}

/// [`DashboardApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpDashboardApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDashboardApi {
    /// Create a client with default HTTP settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Create a client from the `api` configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Set the API key for authentication
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self, org: &OrganizationId, path: &str) -> String {
        format!(
            "{}/organizations/{}/dashboard/{path}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(org.as_str())
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let mut request = self.client.get(url);

        if let Some(ref api_key) = self.api_key {
            request = request.header("X-API-Key", api_key);
        }

        debug!(url, "fetching {what}");

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(format!("Failed to fetch {what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            };
            return Err(Error::api(status.as_u16(), message));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("Failed to read {what}: {e}")))?;

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn dashboard_metrics(
        &self,
        org: &OrganizationId,
        api_filter: &str,
    ) -> Result<DashboardMetrics> {
        let url = format!(
            "{}?dateFilter={}",
            self.endpoint(org, "metrics"),
            urlencoding::encode(api_filter)
        );
        self.get_json(&url, "dashboard metrics").await
    }

    async fn sentiment_trends(&self, org: &OrganizationId) -> Result<Vec<SentimentTrendPoint>> {
        self.get_json(&self.endpoint(org, "sentiment-trends"), "sentiment trends")
            .await
    }

    async fn common_objections(&self, org: &OrganizationId) -> Result<Value> {
        self.get_json(&self.endpoint(org, "common-objections"), "common objections")
            .await
    }

    async fn transcripts(
        &self,
        org: &OrganizationId,
        page: u32,
        limit: u32,
    ) -> Result<TranscriptPage> {
        let url = format!(
            "{}?page={page}&limit={limit}",
            self.endpoint(org, "transcripts")
        );
        self.get_json(&url, "transcripts").await
    }

    async fn questions_rate(&self, org: &OrganizationId) -> Result<Value> {
        self.get_json(&self.endpoint(org, "questions-rate"), "questions rate")
            .await
    }

    async fn topic_coherence(&self, org: &OrganizationId) -> Result<Value> {
        self.get_json(&self.endpoint(org, "topic-coherence"), "topic coherence")
            .await
    }

    async fn objection_categories_trend(
        &self,
        org: &OrganizationId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Value> {
        let mut url = self.endpoint(org, "objection-categories-trend");

        let mut query_params = Vec::new();
        if let Some(start) = start_date {
            query_params.push(format!("startDate={}", urlencoding::encode(start)));
        }
        if let Some(end) = end_date {
            query_params.push(format!("endDate={}", urlencoding::encode(end)));
        }
        if !query_params.is_empty() {
            url.push('?');
            url.push_str(&query_params.join("&"));
        }

        self.get_json(&url, "objection categories trend").await
    }
}
