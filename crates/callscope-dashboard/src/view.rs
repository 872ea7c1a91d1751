//! Dashboard view model
//!
//! Turns query states into display-ready values. Building a view never
//! fails: missing data falls back to placeholders and fetch errors are
//! collected in [`DashboardView::errors`].

use crate::cache::QueryState;
use crate::keys::names;
use callscope_core::DateFilter;
use callscope_core::types::{DashboardMetrics, SentimentTrendPoint, TranscriptPage, TranscriptSummary};
use callscope_core::utils::{
    NOT_AVAILABLE, UNNAMED, format_number, format_percent, format_success_rate,
    format_raw_date, or_not_available, parse_component, sentiment_percent,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Page title
pub const TITLE: &str = "Dashboard";
/// Greeting under the title
pub const WELCOME: &str = "Welcome back! Here's an overview of your sales performance.";
/// Shown instead of the dashboard when no organization is selected
pub const NO_ORGANIZATION: &str = "No organization found";
/// Empty sentiment chart
pub const NO_SENTIMENT_DATA: &str = "No sentiment data available";
/// Empty objections list
pub const NO_OBJECTION_DATA: &str = "No objection data available";
/// Empty transcript list
pub const NO_TRANSCRIPTS: &str =
    "No transcripts available. Upload your first transcript to see analysis here.";
/// Call to action under the empty transcript list
pub const UPLOAD_TRANSCRIPT: &str = "Upload Transcript";
/// Most trend points drawn in the sentiment chart
pub const MAX_TREND_POINTS: usize = 10;

/// What the dashboard screen shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", content = "view", rename_all = "snake_case")]
pub enum DashboardScreen {
    /// No organization is selected
    NoOrganization,
    /// The dashboard for the current organization
    Ready(Box<DashboardView>),
}

/// One independently loaded part of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "content", rename_all = "snake_case")]
pub enum Section<T> {
    /// Waiting for the first response
    Loading,
    /// Nothing to show
    Empty {
        /// Explanation shown in place of the data
        message: String,
        /// Label of the suggested next action
        call_to_action: Option<String>,
    },
    /// Data to show
    Ready(T),
}

impl<T> Section<T> {
    fn empty(message: &str) -> Self {
        Self::Empty {
            message: message.to_string(),
            call_to_action: None,
        }
    }

    /// Whether the section is still loading
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The data, when ready
    pub const fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(data) => Some(data),
            _ => None,
        }
    }
}

/// Rendered dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Title and subtitle
    pub header: Header,
    /// The four summary cards
    pub summary: Section<SummaryCards>,
    /// Sentiment of recent calls
    pub sentiment_trends: Section<Vec<TrendPoint>>,
    /// Most frequent objections, as sent by the backend
    pub common_objections: Section<Value>,
    /// Current transcript page
    pub transcripts: Section<TranscriptTable>,
    /// Queries whose latest fetch failed
    pub errors: Vec<QueryError>,
}

/// Page header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Title
    pub title: String,
    /// Greeting
    pub subtitle: String,
    /// `Showing data for: <label>`, absent for the all-time filter
    pub filter_note: Option<String>,
}

impl Header {
    /// Header for the selected filter
    #[must_use]
    pub fn new(filter: &DateFilter) -> Self {
        Self {
            title: TITLE.to_string(),
            subtitle: WELCOME.to_string(),
            filter_note: (!filter.is_all())
                .then(|| format!("Showing data for: {}", filter.label())),
        }
    }
}

/// Summary card values, already formatted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryCards {
    /// Total transcripts
    pub total_transcripts: String,
    /// Average sentiment
    pub average_sentiment: String,
    /// Objections handled, `successful/total`
    pub objections_handled: String,
    /// `Success Rate: x.x%`
    pub success_rate: String,
    /// Talk ratio
    pub talk_ratio: String,
}

impl SummaryCards {
    /// Format the metrics, defaulting every missing value to zero
    #[must_use]
    pub fn new(metrics: Option<&DashboardMetrics>) -> Self {
        let metrics = metrics.cloned().unwrap_or_default();
        let objections = metrics.objections.unwrap_or_default();

        Self {
            total_transcripts: metrics
                .transcripts
                .map_or(0, |t| t.count)
                .to_string(),
            average_sentiment: format_percent(metrics.sentiment.map(|s| s.average)),
            objections_handled: format!("{}/{}", objections.successful, objections.total),
            success_rate: format!(
                "Success Rate: {}",
                format_success_rate(objections.success_rate)
            ),
            talk_ratio: format_percent(metrics.talk_ratio.map(|t| t.average)),
        }
    }
}

/// One parsed point of the sentiment chart; malformed components are NaN
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Call label
    pub name: String,
    /// Positive share
    pub positive: f64,
    /// Neutral share
    pub neutral: f64,
    /// Negative share
    pub negative: f64,
}

impl From<&SentimentTrendPoint> for TrendPoint {
    fn from(point: &SentimentTrendPoint) -> Self {
        Self {
            name: point.name.clone(),
            positive: parse_component(&point.positive),
            neutral: parse_component(&point.neutral),
            negative: parse_component(&point.negative),
        }
    }
}

/// Transcript table with optional pagination controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptTable {
    /// Rows on the current page
    pub rows: Vec<TranscriptRow>,
    /// Present only when there is more than one page
    pub pagination: Option<PaginationControls>,
}

/// One transcript row, already formatted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRow {
    /// Transcript id
    pub id: String,
    /// Call title or `Unnamed`
    pub title: String,
    /// `M/D/YYYY` or `N/A`
    pub date: String,
    /// Duration or `N/A`
    pub duration: String,
    /// Sentiment percentage or `N/A`
    pub sentiment: String,
    /// Link opened by the row's View action
    pub link: Option<String>,
}

impl From<&TranscriptSummary> for TranscriptRow {
    fn from(transcript: &TranscriptSummary) -> Self {
        let analysis = transcript.analysis.as_ref();

        Self {
            id: transcript.id.clone(),
            title: analysis
                .and_then(|a| a.title.as_deref())
                .filter(|title| !title.is_empty())
                .unwrap_or(UNNAMED)
                .to_string(),
            date: analysis
                .and_then(|a| a.date.as_deref())
                .map_or_else(|| NOT_AVAILABLE.to_string(), format_raw_date),
            duration: or_not_available(analysis.and_then(|a| a.duration.as_deref())),
            sentiment: sentiment_percent(analysis.and_then(|a| a.overall_sentiment)),
            link: transcript.content.clone(),
        }
    }
}

/// Previous/next controls under the transcript table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationControls {
    /// Current page (1-based)
    pub page: u32,
    /// Total pages
    pub pages: u32,
    /// `Page X of Y`
    pub label: String,
    /// Previous is disabled on the first page
    pub previous_disabled: bool,
    /// Next is disabled on the last page
    pub next_disabled: bool,
}

impl PaginationControls {
    /// Controls for `page` of `pages`, `None` for a single page
    #[must_use]
    pub fn new(page: u32, pages: u32) -> Option<Self> {
        (pages > 1).then(|| Self {
            page,
            pages,
            label: format!("Page {page} of {pages}"),
            previous_disabled: page <= 1,
            next_disabled: page >= pages,
        })
    }
}

/// A query whose latest fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryError {
    /// Query name
    pub query: String,
    /// Error message
    pub message: String,
}

/// Query states a view is built from
#[derive(Debug, Clone)]
pub struct ViewInputs<'a> {
    /// Selected filter
    pub filter: &'a DateFilter,
    /// Selected transcript page
    pub page: u32,
    /// Metrics query
    pub metrics: &'a QueryState<DashboardMetrics>,
    /// Sentiment trend query
    pub sentiment_trends: &'a QueryState<Vec<SentimentTrendPoint>>,
    /// Common objections query
    pub common_objections: &'a QueryState<Value>,
    /// Transcript page query
    pub transcripts: &'a QueryState<TranscriptPage>,
}

impl DashboardView {
    /// Build the view from the current query states
    #[must_use]
    pub fn build(inputs: &ViewInputs<'_>) -> Self {
        let mut errors = Vec::new();
        collect_error(&mut errors, names::DASHBOARD_METRICS, inputs.metrics);
        collect_error(&mut errors, names::SENTIMENT_TRENDS, inputs.sentiment_trends);
        collect_error(&mut errors, names::COMMON_OBJECTIONS, inputs.common_objections);
        collect_error(&mut errors, names::TRANSCRIPTS, inputs.transcripts);

        Self {
            header: Header::new(inputs.filter),
            summary: summary_section(inputs.metrics),
            sentiment_trends: trends_section(inputs.sentiment_trends),
            common_objections: objections_section(inputs.common_objections),
            transcripts: transcripts_section(inputs.transcripts, inputs.page),
            errors,
        }
    }
}

fn collect_error<T>(errors: &mut Vec<QueryError>, query: &str, state: &QueryState<T>) {
    if let Some(error) = &state.error {
        errors.push(QueryError {
            query: query.to_string(),
            message: error.to_string(),
        });
    }
}

fn summary_section(metrics: &QueryState<DashboardMetrics>) -> Section<SummaryCards> {
    if metrics.is_loading() {
        Section::Loading
    } else {
        Section::Ready(SummaryCards::new(metrics.data()))
    }
}

fn trends_section(trends: &QueryState<Vec<SentimentTrendPoint>>) -> Section<Vec<TrendPoint>> {
    if trends.is_loading() {
        return Section::Loading;
    }
    match trends.data() {
        Some(points) if !points.is_empty() => Section::Ready(
            points
                .iter()
                .take(MAX_TREND_POINTS)
                .map(TrendPoint::from)
                .collect(),
        ),
        _ => Section::empty(NO_SENTIMENT_DATA),
    }
}

fn objections_section(objections: &QueryState<Value>) -> Section<Value> {
    if objections.is_loading() {
        return Section::Loading;
    }
    match objections.data() {
        Some(value) if !value.is_null() => Section::Ready(value.clone()),
        _ => Section::empty(NO_OBJECTION_DATA),
    }
}

fn transcripts_section(transcripts: &QueryState<TranscriptPage>, page: u32) -> Section<TranscriptTable> {
    if transcripts.is_loading() {
        return Section::Loading;
    }
    match transcripts.data() {
        Some(result) if !result.data.is_empty() => Section::Ready(TranscriptTable {
            rows: result.data.iter().map(TranscriptRow::from).collect(),
            pagination: result
                .pagination
                .and_then(|p| PaginationControls::new(page, p.pages)),
        }),
        _ => Section::Empty {
            message: NO_TRANSCRIPTS.to_string(),
            call_to_action: Some(UPLOAD_TRANSCRIPT.to_string()),
        },
    }
}

impl fmt::Display for DashboardScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOrganization => writeln!(f, "{NO_ORGANIZATION}"),
            Self::Ready(view) => write!(f, "{view}"),
        }
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header.title)?;
        match &self.header.filter_note {
            Some(note) => writeln!(f, "{} {note}", self.header.subtitle)?,
            None => writeln!(f, "{}", self.header.subtitle)?,
        }
        writeln!(f)?;

        match &self.summary {
            Section::Ready(cards) => {
                writeln!(f, "Total Transcripts   {}", cards.total_transcripts)?;
                writeln!(f, "Average Sentiment   {}", cards.average_sentiment)?;
                writeln!(
                    f,
                    "Objections Handled  {} ({})",
                    cards.objections_handled, cards.success_rate
                )?;
                writeln!(f, "Talk Ratio          {}", cards.talk_ratio)?;
            }
            other => write_placeholder(f, other, "metrics")?,
        }
        writeln!(f)?;

        writeln!(f, "Sentiment Trends")?;
        match &self.sentiment_trends {
            Section::Ready(points) => {
                for point in points {
                    writeln!(
                        f,
                        "  {:<16} +{} ={} -{}",
                        point.name,
                        format_number(Some(point.positive)),
                        format_number(Some(point.neutral)),
                        format_number(Some(point.negative))
                    )?;
                }
            }
            other => write_placeholder(f, other, "sentiment trends")?,
        }
        writeln!(f)?;

        writeln!(f, "Common Objections")?;
        match &self.common_objections {
            Section::Ready(value) => writeln!(f, "  {value}")?,
            other => write_placeholder(f, other, "objections")?,
        }
        writeln!(f)?;

        writeln!(f, "Transcripts")?;
        match &self.transcripts {
            Section::Ready(table) => {
                writeln!(
                    f,
                    "  {:<28} {:<11} {:<9} Sentiment",
                    "Name", "Date", "Duration"
                )?;
                for row in &table.rows {
                    writeln!(
                        f,
                        "  {:<28} {:<11} {:<9} {}",
                        row.title, row.date, row.duration, row.sentiment
                    )?;
                }
                if let Some(controls) = &table.pagination {
                    let previous = if controls.previous_disabled { "-" } else { "<" };
                    let next = if controls.next_disabled { "-" } else { ">" };
                    writeln!(f, "  [{previous} Previous]  {}  [Next {next}]", controls.label)?;
                }
            }
            other => write_placeholder(f, other, "transcripts")?,
        }

        for error in &self.errors {
            writeln!(f, "! {} failed: {}", error.query, error.message)?;
        }
        Ok(())
    }
}

fn write_placeholder<T>(f: &mut fmt::Formatter<'_>, section: &Section<T>, what: &str) -> fmt::Result {
    match section {
        Section::Loading => writeln!(f, "  Loading {what}..."),
        Section::Empty {
            message,
            call_to_action,
        } => {
            writeln!(f, "  {message}")?;
            if let Some(action) = call_to_action {
                writeln!(f, "  [{action}]")?;
            }
            Ok(())
        }
        Section::Ready(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use callscope_core::types::{
        AverageMetric, ObjectionStats, Pagination, TranscriptAnalysis, TranscriptCount,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn ready<T>(data: T) -> QueryState<T> {
        QueryState {
            data: Some(Arc::new(data)),
            ..QueryState::empty()
        }
    }

    fn loading<T>() -> QueryState<T> {
        QueryState {
            is_fetching: true,
            ..QueryState::empty()
        }
    }

    fn transcript(id: &str, analysis: Option<TranscriptAnalysis>) -> TranscriptSummary {
        TranscriptSummary {
            id: id.to_string(),
            content: Some(format!("https://files/{id}")),
            analysis,
        }
    }

    fn build(
        filter: &DateFilter,
        metrics: &QueryState<DashboardMetrics>,
        transcripts: &QueryState<TranscriptPage>,
    ) -> DashboardView {
        DashboardView::build(&ViewInputs {
            filter,
            page: 1,
            metrics,
            sentiment_trends: &ready(Vec::new()),
            common_objections: &ready(Value::Null),
            transcripts,
        })
    }

    #[test]
    fn test_header_filter_note() {
        assert_eq!(Header::new(&DateFilter::All).filter_note, None);
        assert_eq!(
            Header::new(&DateFilter::Last15Days).filter_note.as_deref(),
            Some("Showing data for: Last 15 Days")
        );
    }

    #[test]
    fn test_summary_cards_formatting() {
        let cards = SummaryCards::new(Some(&DashboardMetrics {
            transcripts: Some(TranscriptCount { count: 12 }),
            sentiment: Some(AverageMetric { average: 67.5 }),
            objections: Some(ObjectionStats {
                successful: 3,
                total: 4,
                success_rate: Some(75.0),
            }),
            talk_ratio: None,
        }));

        assert_eq!(cards.total_transcripts, "12");
        assert_eq!(cards.average_sentiment, "67.5%");
        assert_eq!(cards.objections_handled, "3/4");
        assert_eq!(cards.success_rate, "Success Rate: 75.0%");
        assert_eq!(cards.talk_ratio, "0%");
    }

    #[test]
    fn test_summary_cards_default_to_zero() {
        let cards = SummaryCards::new(None);
        assert_eq!(cards.total_transcripts, "0");
        assert_eq!(cards.average_sentiment, "0%");
        assert_eq!(cards.objections_handled, "0/0");
        assert_eq!(cards.success_rate, "Success Rate: 0%");
    }

    #[test]
    fn test_transcript_without_analysis_uses_placeholders() {
        let row = TranscriptRow::from(&transcript("t1", None));

        assert_eq!(row.title, "Unnamed");
        assert_eq!(row.date, "N/A");
        assert_eq!(row.duration, "N/A");
        assert_eq!(row.sentiment, "N/A");
        assert_eq!(row.link.as_deref(), Some("https://files/t1"));
    }

    #[test]
    fn test_transcript_row_formatting() {
        let row = TranscriptRow::from(&transcript(
            "t2",
            Some(TranscriptAnalysis {
                title: Some(String::new()),
                date: Some("2024-11-03T09:00:00Z".to_string()),
                duration: Some("32:10".to_string()),
                overall_sentiment: Some(0.5),
            }),
        ));

        assert_eq!(row.title, "Unnamed");
        assert_eq!(row.date, "11/3/2024");
        assert_eq!(row.duration, "32:10");
        assert_eq!(row.sentiment, "75.0%");
    }

    #[test]
    fn test_pagination_controls() {
        assert_eq!(PaginationControls::new(1, 1), None);

        let first = PaginationControls::new(1, 3).unwrap();
        assert!(first.previous_disabled);
        assert!(!first.next_disabled);
        assert_eq!(first.label, "Page 1 of 3");

        let last = PaginationControls::new(3, 3).unwrap();
        assert!(!last.previous_disabled);
        assert!(last.next_disabled);
    }

    #[test]
    fn test_sections_are_exclusive() {
        let view = build(&DateFilter::All, &loading(), &loading());
        assert!(view.summary.is_loading());
        assert!(view.transcripts.is_loading());
        assert_eq!(
            view.sentiment_trends,
            Section::Empty {
                message: NO_SENTIMENT_DATA.to_string(),
                call_to_action: None,
            }
        );
        assert!(view.common_objections.ready().is_none());
    }

    #[test]
    fn test_empty_transcripts_offer_upload() {
        let view = build(
            &DateFilter::All,
            &ready(DashboardMetrics::default()),
            &ready(TranscriptPage::default()),
        );

        assert_eq!(
            view.transcripts,
            Section::Empty {
                message: NO_TRANSCRIPTS.to_string(),
                call_to_action: Some(UPLOAD_TRANSCRIPT.to_string()),
            }
        );
    }

    #[test]
    fn test_trend_points_are_capped_and_parsed() {
        let points: Vec<SentimentTrendPoint> = (0..15)
            .map(|i| SentimentTrendPoint {
                name: format!("Call {i}"),
                positive: "50".to_string(),
                neutral: "n/a".to_string(),
                negative: "20.5".to_string(),
            })
            .collect();

        let view = DashboardView::build(&ViewInputs {
            filter: &DateFilter::All,
            page: 1,
            metrics: &ready(DashboardMetrics::default()),
            sentiment_trends: &ready(points),
            common_objections: &ready(json!([{ "objection": "Price", "count": 2 }])),
            transcripts: &ready(TranscriptPage::default()),
        });

        let trend = view.sentiment_trends.ready().unwrap();
        assert_eq!(trend.len(), MAX_TREND_POINTS);
        assert!(trend[0].neutral.is_nan());
        assert!((trend[0].negative - 20.5).abs() < f64::EPSILON);
        assert!(view.common_objections.ready().is_some());
    }

    #[test]
    fn test_errors_listed_per_query() {
        let failed = QueryState {
            error: Some(Arc::new(callscope_core::Error::transport("timed out"))),
            ..ready(TranscriptPage {
                data: vec![transcript("t1", None)],
                pagination: Some(Pagination {
                    page: 1,
                    pages: 2,
                    total: None,
                    limit: None,
                }),
            })
        };

        let view = build(&DateFilter::Today, &ready(DashboardMetrics::default()), &failed);

        assert_eq!(view.errors.len(), 1);
        assert_eq!(view.errors[0].query, names::TRANSCRIPTS);
        let table = view.transcripts.ready().unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.pagination.as_ref().unwrap().label, "Page 1 of 2");
    }

    #[test]
    fn test_text_rendering() {
        let view = build(
            &DateFilter::ThisWeek,
            &ready(DashboardMetrics::default()),
            &ready(TranscriptPage::default()),
        );
        let text = DashboardScreen::Ready(Box::new(view)).to_string();

        assert!(text.contains("Showing data for: This Week"));
        assert!(text.contains(NO_TRANSCRIPTS));
        assert!(text.contains("[Upload Transcript]"));
        assert_eq!(DashboardScreen::NoOrganization.to_string().trim(), NO_ORGANIZATION);
    }
}
