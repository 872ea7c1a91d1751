//! Core data types for the CallScope dashboard

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Identifier of the organization whose data the dashboard shows.
///
/// An empty id means no organization is selected; every dashboard query is
/// disabled in that state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    /// Wrap a raw organization id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an organization is actually selected
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrganizationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OrganizationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Date range selected in the dashboard filter menu
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DateFilter {
    /// Calls from today
    Today,
    /// Calls from yesterday
    Yesterday,
    /// Calls from the current week
    ThisWeek,
    /// Calls from the last fifteen days
    Last15Days,
    /// Calls from the current month
    ThisMonth,
    /// No date restriction
    #[default]
    All,
    /// Unrecognized token, passed through unchanged
    Custom(String),
}

impl DateFilter {
    /// The selectable filters, in menu order
    pub const PRESETS: [Self; 6] = [
        Self::Today,
        Self::Yesterday,
        Self::ThisWeek,
        Self::Last15Days,
        Self::ThisMonth,
        Self::All,
    ];

    /// Parse a UI token. Never fails: unknown tokens become [`DateFilter::Custom`].
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token {
            "today" => Self::Today,
            "yesterday" => Self::Yesterday,
            "this_week" => Self::ThisWeek,
            "last_15days" => Self::Last15Days,
            "this_month" => Self::ThisMonth,
            "all" => Self::All,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The UI token
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this_week",
            Self::Last15Days => "last_15days",
            Self::ThisMonth => "this_month",
            Self::All => "all",
            Self::Custom(token) => token,
        }
    }

    /// The value the backend expects in its `dateFilter` parameter
    #[must_use]
    pub fn api_value(&self) -> &str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this week",
            Self::Last15Days => "last 15 days",
            Self::ThisMonth => "this month",
            Self::All => "",
            Self::Custom(token) => token,
        }
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::ThisWeek => "This Week",
            Self::Last15Days => "Last 15 Days",
            Self::ThisMonth => "This Month",
            Self::All => "All Time",
            Self::Custom(token) => token,
        }
    }

    /// Whether this filter restricts the date range at all
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for DateFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for DateFilter {
    fn from(token: String) -> Self {
        Self::parse(&token)
    }
}

impl From<DateFilter> for String {
    fn from(filter: DateFilter) -> Self {
        filter.token().to_string()
    }
}

/// Map a UI filter token to the backend's filter string
#[must_use]
pub fn to_api_filter(token: &str) -> String {
    DateFilter::parse(token).api_value().to_string()
}

/// Map a UI filter token to its display label
#[must_use]
pub fn to_label(token: &str) -> String {
    DateFilter::parse(token).label().to_string()
}

/// Aggregate metrics for the summary cards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    /// Number of transcripts in range
    #[serde(default)]
    pub transcripts: Option<TranscriptCount>,
    /// Average sentiment
    #[serde(default)]
    pub sentiment: Option<AverageMetric>,
    /// Objection handling statistics
    #[serde(default)]
    pub objections: Option<ObjectionStats>,
    /// Average talk ratio
    #[serde(default)]
    pub talk_ratio: Option<AverageMetric>,
}

/// Transcript count wrapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptCount {
    /// Number of transcripts
    #[serde(default)]
    pub count: u64,
}

/// A metric reported as an average percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMetric {
    /// Average value
    #[serde(default)]
    pub average: f64,
}

/// How many objections were raised and how many were handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectionStats {
    /// Successfully handled objections
    #[serde(default)]
    pub successful: u64,
    /// All objections
    #[serde(default)]
    pub total: u64,
    /// Success rate in percent
    #[serde(default)]
    pub success_rate: Option<f64>,
}

/// One point of the sentiment trend chart.
///
/// The backend sends the three components as strings, occasionally as
/// numbers; both are kept as text and parsed when rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTrendPoint {
    /// Label of the call
    #[serde(default, deserialize_with = "text_or_number")]
    pub name: String,
    /// Positive share
    #[serde(default, deserialize_with = "text_or_number")]
    pub positive: String,
    /// Neutral share
    #[serde(default, deserialize_with = "text_or_number")]
    pub neutral: String,
    /// Negative share
    #[serde(default, deserialize_with = "text_or_number")]
    pub negative: String,
}

/// One page of transcripts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptPage {
    /// Transcripts on this page
    #[serde(default)]
    pub data: Vec<TranscriptSummary>,
    /// Pagination metadata
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Pagination metadata returned with a transcript page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current page (1-based)
    #[serde(default)]
    pub page: u32,
    /// Total number of pages
    #[serde(default)]
    pub pages: u32,
    /// Total number of transcripts
    #[serde(default)]
    pub total: Option<u64>,
    /// Page size
    #[serde(default)]
    pub limit: Option<u32>,
}

/// A transcript row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    /// Transcript id
    pub id: String,
    /// Link to the transcript document
    #[serde(default)]
    pub content: Option<String>,
    /// Analysis results, absent until the analysis has run
    #[serde(default)]
    pub analysis: Option<TranscriptAnalysis>,
}

/// Analysis results attached to a transcript.
///
/// Fields are kept loose: a malformed value only blanks its own cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptAnalysis {
    /// Call title
    #[serde(default)]
    pub title: Option<String>,
    /// When the call took place, as sent by the backend
    #[serde(default, deserialize_with = "optional_text")]
    pub date: Option<String>,
    /// Call duration as reported by the backend
    #[serde(default)]
    pub duration: Option<String>,
    /// Overall sentiment in `[-1, 1]`
    #[serde(default, deserialize_with = "optional_number")]
    pub overall_sentiment: Option<f64>,
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}
