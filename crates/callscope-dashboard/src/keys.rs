//! Cache keys for dashboard queries
//!
//! A key is an ordered tuple: the stable query name followed by every
//! parameter whose change must produce a distinct cache entry.

use callscope_core::OrganizationId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query names, the first element of every key
pub mod names {
    /// Summary card metrics
    pub const DASHBOARD_METRICS: &str = "dashboardMetrics";
    /// Sentiment over the last calls
    pub const SENTIMENT_TRENDS: &str = "sentimentTrends";
    /// Most frequent objections
    pub const COMMON_OBJECTIONS: &str = "commonObjections";
    /// Paginated transcript list
    pub const TRANSCRIPTS: &str = "transcripts";
    /// Questions-asked rate
    pub const QUESTIONS_RATE: &str = "questionsRate";
    /// Topic coherence scores
    pub const TOPIC_COHERENCE: &str = "topicCoherence";
    /// Objection categories over a date range
    pub const OBJECTION_CATEGORIES_TREND: &str = "objectionCategoriesTrend";
}

/// One element of a [`QueryKey`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    /// Text parameter
    Text(String),
    /// Numeric parameter
    Number(u64),
    /// Optional parameter that was not supplied
    Absent,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Absent => f.write_str("undefined"),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&OrganizationId> for KeyPart {
    fn from(org: &OrganizationId) -> Self {
        Self::Text(org.as_str().to_string())
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        Self::Number(u64::from(n))
    }
}

impl From<Option<&str>> for KeyPart {
    fn from(text: Option<&str>) -> Self {
        text.map_or(Self::Absent, Self::from)
    }
}

/// Identity of a cached query result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    /// Start a key with its query name
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(vec![KeyPart::from(name)])
    }

    /// Append a parameter
    #[must_use]
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    /// Dashboard metrics key.
    ///
    /// Without `scope_by_org` the key is `(dashboardMetrics, apiDateFilter)`
    /// and is shared across organizations. With it the organization id is
    /// inserted before the filter.
    #[must_use]
    pub fn dashboard_metrics(org: &OrganizationId, api_filter: &str, scope_by_org: bool) -> Self {
        let key = Self::named(names::DASHBOARD_METRICS);
        let key = if scope_by_org { key.with(org) } else { key };
        key.with(api_filter)
    }

    /// Sentiment trends key
    #[must_use]
    pub fn sentiment_trends(org: &OrganizationId) -> Self {
        Self::named(names::SENTIMENT_TRENDS).with(org)
    }

    /// Common objections key
    #[must_use]
    pub fn common_objections(org: &OrganizationId) -> Self {
        Self::named(names::COMMON_OBJECTIONS).with(org)
    }

    /// Transcript page key
    #[must_use]
    pub fn transcripts(org: &OrganizationId, page: u32, limit: u32) -> Self {
        Self::named(names::TRANSCRIPTS)
            .with(org)
            .with(page)
            .with(limit)
    }

    /// Questions rate key
    #[must_use]
    pub fn questions_rate(org: &OrganizationId) -> Self {
        Self::named(names::QUESTIONS_RATE).with(org)
    }

    /// Topic coherence key
    #[must_use]
    pub fn topic_coherence(org: &OrganizationId) -> Self {
        Self::named(names::TOPIC_COHERENCE).with(org)
    }

    /// Objection categories trend key
    #[must_use]
    pub fn objection_categories_trend(
        org: &OrganizationId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Self {
        Self::named(names::OBJECTION_CATEGORIES_TREND)
            .with(org)
            .with(start_date)
            .with(end_date)
    }

    /// The query name
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self.0.first() {
            Some(KeyPart::Text(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// All elements of the key
    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Whether `prefix` matches the leading elements of this key
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}
