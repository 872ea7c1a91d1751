//! In-memory dashboard backend for tests and the demo mode

use crate::api_client::DashboardApi;
use crate::keys::names;
use async_trait::async_trait;
use callscope_core::types::{
    AverageMetric, DashboardMetrics, ObjectionStats, Pagination, SentimentTrendPoint,
    TranscriptAnalysis, TranscriptCount, TranscriptPage, TranscriptSummary,
};
use callscope_core::{Error, OrganizationId, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use tokio::time::{Duration, sleep};

/// A request received by [`MockDashboardApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// Metrics request
    DashboardMetrics {
        /// Organization
        org: String,
        /// Backend date filter
        api_filter: String,
    },
    /// Sentiment trends request
    SentimentTrends {
        /// Organization
        org: String,
    },
    /// Common objections request
    CommonObjections {
        /// Organization
        org: String,
    },
    /// Transcript page request
    Transcripts {
        /// Organization
        org: String,
        /// Page number
        page: u32,
        /// Page size
        limit: u32,
    },
    /// Questions rate request
    QuestionsRate {
        /// Organization
        org: String,
    },
    /// Topic coherence request
    TopicCoherence {
        /// Organization
        org: String,
    },
    /// Objection categories trend request
    ObjectionCategoriesTrend {
        /// Organization
        org: String,
        /// Range start
        start_date: Option<String>,
        /// Range end
        end_date: Option<String>,
    },
}

impl ApiCall {
    /// Name of the query this request serves
    #[must_use]
    pub const fn query_name(&self) -> &'static str {
        match self {
            Self::DashboardMetrics { .. } => names::DASHBOARD_METRICS,
            Self::SentimentTrends { .. } => names::SENTIMENT_TRENDS,
            Self::CommonObjections { .. } => names::COMMON_OBJECTIONS,
            Self::Transcripts { .. } => names::TRANSCRIPTS,
            Self::QuestionsRate { .. } => names::QUESTIONS_RATE,
            Self::TopicCoherence { .. } => names::TOPIC_COHERENCE,
            Self::ObjectionCategoriesTrend { .. } => names::OBJECTION_CATEGORIES_TREND,
        }
    }
}

#[derive(Debug, Default)]
struct MockData {
    metrics: DashboardMetrics,
    metrics_by_filter: HashMap<String, DashboardMetrics>,
    sentiment_trends: Vec<SentimentTrendPoint>,
    common_objections: Value,
    transcripts: Vec<TranscriptSummary>,
    questions_rate: Value,
    topic_coherence: Value,
    objection_categories_trend: Value,
}

/// Mock dashboard backend.
///
/// Responses are read when a request starts, so changing them while a
/// request is delayed does not affect that request.
#[derive(Debug, Default)]
pub struct MockDashboardApi {
    data: RwLock<MockData>,
    calls: Mutex<Vec<ApiCall>>,
    delay: Mutex<Duration>,
    delays: Mutex<VecDeque<Duration>>,
    failure: RwLock<Option<String>>,
}

impl MockDashboardApi {
    /// Create an empty mock that answers immediately
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock filled with a small sample dataset
    #[must_use]
    pub fn demo() -> Self {
        let mock = Self::new();
        {
            let mut data = mock.data.write();
            data.metrics = DashboardMetrics {
                transcripts: Some(TranscriptCount { count: 12 }),
                sentiment: Some(AverageMetric { average: 68.0 }),
                objections: Some(ObjectionStats {
                    successful: 9,
                    total: 14,
                    success_rate: Some(64.285_714),
                }),
                talk_ratio: Some(AverageMetric { average: 42.5 }),
            };
            data.metrics_by_filter.insert(
                "today".to_string(),
                DashboardMetrics {
                    transcripts: Some(TranscriptCount { count: 2 }),
                    sentiment: Some(AverageMetric { average: 75.0 }),
                    objections: Some(ObjectionStats {
                        successful: 1,
                        total: 2,
                        success_rate: Some(50.0),
                    }),
                    talk_ratio: Some(AverageMetric { average: 40.0 }),
                },
            );
            data.sentiment_trends = (1..=12)
                .map(|i| SentimentTrendPoint {
                    name: format!("Call {i}"),
                    positive: (40 + i * 2).to_string(),
                    neutral: "30".to_string(),
                    negative: (30 - i * 2).to_string(),
                })
                .collect();
            data.common_objections = json!([
                { "objection": "Price is too high", "count": 6 },
                { "objection": "Already using a competitor", "count": 4 },
                { "objection": "Not the right time", "count": 3 }
            ]);
            data.transcripts = (1..=7)
                .map(|i| TranscriptSummary {
                    id: format!("t{i}"),
                    content: Some(format!("https://files.example.com/transcripts/t{i}.txt")),
                    analysis: (i != 7).then(|| TranscriptAnalysis {
                        title: (i != 6).then(|| format!("Discovery call {i}")),
                        date: Some(format!("2024-03-{i:02}T15:00:00Z")),
                        duration: Some(format!("{}:{:02}", 20 + i, i * 7)),
                        overall_sentiment: Some(f64::from(i) / 10.0),
                    }),
                })
                .collect();
            data.questions_rate = json!({ "average": 3.4 });
            data.topic_coherence = json!({ "average": 0.82 });
            data.objection_categories_trend = json!([]);
        }
        mock
    }

    /// Delay every response
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    /// Fail every request with a transport error
    #[must_use]
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.set_failure(Some(message.into()));
        self
    }

    /// Switch failures on or off
    pub fn set_failure(&self, message: Option<String>) {
        *self.failure.write() = message;
    }

    /// Delay only the next request, overriding the default delay
    pub fn push_delay(&self, delay: Duration) {
        self.delays.lock().push_back(delay);
    }

    /// Metrics returned for filters without a specific response
    pub fn set_metrics(&self, metrics: DashboardMetrics) {
        self.data.write().metrics = metrics;
    }

    /// Metrics returned for one backend date filter
    pub fn set_metrics_for(&self, api_filter: impl Into<String>, metrics: DashboardMetrics) {
        self.data
            .write()
            .metrics_by_filter
            .insert(api_filter.into(), metrics);
    }

    /// Sentiment trend series
    pub fn set_sentiment_trends(&self, points: Vec<SentimentTrendPoint>) {
        self.data.write().sentiment_trends = points;
    }

    /// Common objections payload
    pub fn set_common_objections(&self, objections: Value) {
        self.data.write().common_objections = objections;
    }

    /// All transcripts; pages are cut from this list
    pub fn set_transcripts(&self, transcripts: Vec<TranscriptSummary>) {
        self.data.write().transcripts = transcripts;
    }

    /// Every request received so far
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    /// Number of requests received for one query name
    #[must_use]
    pub fn call_count(&self, query_name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.query_name() == query_name)
            .count()
    }

    /// Forget recorded requests
    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    async fn respond<T>(&self, call: ApiCall, read: impl FnOnce(&MockData) -> T) -> Result<T> {
        self.calls.lock().push(call);

        let response = read(&self.data.read());
        let failure = self.failure.read().clone();
        let delay = self
            .delays
            .lock()
            .pop_front()
            .unwrap_or_else(|| *self.delay.lock());

        if !delay.is_zero() {
            sleep(delay).await;
        }

        match failure {
            Some(message) => Err(Error::transport(message)),
            None => Ok(response),
        }
    }
}

fn page_of(transcripts: &[TranscriptSummary], page: u32, limit: u32) -> TranscriptPage {
    let total = transcripts.len();
    let limit = limit.max(1);
    let per_page = limit as usize;
    let pages = u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX);
    let start = (page.max(1) as usize - 1).saturating_mul(per_page);

    TranscriptPage {
        data: transcripts.iter().skip(start).take(per_page).cloned().collect(),
        pagination: Some(Pagination {
            page,
            pages,
            total: Some(total as u64),
            limit: Some(limit),
        }),
    }
}

#[async_trait]
impl DashboardApi for MockDashboardApi {
    async fn dashboard_metrics(
        &self,
        org: &OrganizationId,
        api_filter: &str,
    ) -> Result<DashboardMetrics> {
        let call = ApiCall::DashboardMetrics {
            org: org.to_string(),
            api_filter: api_filter.to_string(),
        };
        self.respond(call, |data| {
            data.metrics_by_filter
                .get(api_filter)
                .unwrap_or(&data.metrics)
                .clone()
        })
        .await
    }

    async fn sentiment_trends(&self, org: &OrganizationId) -> Result<Vec<SentimentTrendPoint>> {
        let call = ApiCall::SentimentTrends {
            org: org.to_string(),
        };
        self.respond(call, |data| data.sentiment_trends.clone())
            .await
    }

    async fn common_objections(&self, org: &OrganizationId) -> Result<Value> {
        let call = ApiCall::CommonObjections {
            org: org.to_string(),
        };
        self.respond(call, |data| data.common_objections.clone())
            .await
    }

    async fn transcripts(
        &self,
        org: &OrganizationId,
        page: u32,
        limit: u32,
    ) -> Result<TranscriptPage> {
        let call = ApiCall::Transcripts {
            org: org.to_string(),
            page,
            limit,
        };
        self.respond(call, |data| page_of(&data.transcripts, page, limit))
            .await
    }

    async fn questions_rate(&self, org: &OrganizationId) -> Result<Value> {
        let call = ApiCall::QuestionsRate {
            org: org.to_string(),
        };
        self.respond(call, |data| data.questions_rate.clone()).await
    }

    async fn topic_coherence(&self, org: &OrganizationId) -> Result<Value> {
        let call = ApiCall::TopicCoherence {
            org: org.to_string(),
        };
        self.respond(call, |data| data.topic_coherence.clone()).await
    }

    async fn objection_categories_trend(
        &self,
        org: &OrganizationId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Value> {
        let call = ApiCall::ObjectionCategoriesTrend {
            org: org.to_string(),
            start_date: start_date.map(ToString::to_string),
            end_date: end_date.map(ToString::to_string),
        };
        self.respond(call, |data| data.objection_categories_trend.clone())
            .await
    }
}
