//! View models for the three overlay states.
//!
//! Everything the renderers need is derived here (threat label, reputation
//! band, quota percentages, completion time) so that text and HTML output
//! agree on what is shown.

use crate::model::{
    DomainAnalysis, EngineStats, EnhancedAnalysis, GraphAnalysis, RateLimitInfo, ReputationBand,
    ScanMode, ScanOutcome, ScanResult, ThreatLevel, TierUsage,
};
use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Progress,
    Result,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayView {
    Progress(ProgressView),
    Result(ResultView),
    Error(ErrorView),
}

impl OverlayView {
    pub fn kind(&self) -> OverlayKind {
        match self {
            OverlayView::Progress(_) => OverlayKind::Progress,
            OverlayView::Result(_) => OverlayKind::Result,
            OverlayView::Error(_) => OverlayKind::Error,
        }
    }

    pub fn progress(url: &str, mode: ScanMode) -> Self {
        let (heading, hint) = match mode {
            ScanMode::Quick => (
                "Scanning Link...",
                "Please wait, this may take up to 60 seconds...",
            ),
            ScanMode::Enhanced => (
                "Deep Scanning Link...",
                "Running graph search and domain analysis, this may take up to 2 minutes...",
            ),
        };
        OverlayView::Progress(ProgressView {
            url: url.to_string(),
            mode,
            heading,
            hint,
        })
    }

    pub fn result(url: &str, result: &ScanResult, mode: ScanMode, now: DateTime<Local>) -> Self {
        OverlayView::Result(ResultView::build(url, result, mode, now))
    }

    pub fn error(message: &str) -> Self {
        OverlayView::Error(ErrorView {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub url: String,
    pub mode: ScanMode,
    pub heading: &'static str,
    pub hint: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorView {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultBody {
    Error {
        message: String,
        details: Option<String>,
    },
    Stats {
        stats: EngineStats,
        level: ThreatLevel,
        source: String,
    },
    /// Neither an error nor statistics came back.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphLine {
    pub title: String,
    pub created: Option<String>,
    pub owner: Option<String>,
    pub node_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphSection {
    pub count: u32,
    pub query: Option<String>,
    pub graphs: Vec<GraphLine>,
}

impl From<&GraphAnalysis> for GraphSection {
    fn from(graph: &GraphAnalysis) -> Self {
        Self {
            count: graph.graphs_found.max(graph.graphs.len() as u32),
            query: graph.search_query.clone(),
            graphs: graph
                .graphs
                .iter()
                .map(|g| GraphLine {
                    title: g.name.clone().unwrap_or_else(|| g.id.clone()),
                    created: g.creation_date.as_ref().map(|d| d.to_string()),
                    owner: g.owner.clone(),
                    node_count: g.node_count,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomainSection {
    pub domain: Option<String>,
    pub reputation: Option<(i64, ReputationBand)>,
    pub category_count: usize,
    pub stats: Option<EngineStats>,
    pub registrar: Option<String>,
    pub country: Option<String>,
}

impl From<&DomainAnalysis> for DomainSection {
    fn from(domain: &DomainAnalysis) -> Self {
        Self {
            domain: domain.domain.clone(),
            reputation: domain
                .reputation
                .map(|score| (score, ReputationBand::from_score(score))),
            category_count: domain.categories.len(),
            stats: domain.last_analysis_stats,
            registrar: domain.registrar.clone(),
            country: domain.country.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummarySection {
    pub analysis_type: String,
    pub depth: String,
    pub graph_search: bool,
    pub feature_count: usize,
}

impl From<&EnhancedAnalysis> for SummarySection {
    fn from(analysis: &EnhancedAnalysis) -> Self {
        Self {
            analysis_type: analysis
                .analysis_type
                .clone()
                .unwrap_or_else(|| "enhanced".to_string()),
            depth: analysis.depth.clone().unwrap_or_else(|| "standard".to_string()),
            graph_search: analysis.graph_search_performed,
            feature_count: analysis.features.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageSection {
    pub tiers: [TierUsage; 3],
    pub notices: Vec<String>,
}

impl From<&RateLimitInfo> for UsageSection {
    fn from(info: &RateLimitInfo) -> Self {
        Self {
            tiers: info.tiers(),
            notices: info.notices(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub url: String,
    pub mode: ScanMode,
    pub body: ResultBody,
    pub graph: Option<GraphSection>,
    pub domain: Option<DomainSection>,
    pub summary: Option<SummarySection>,
    pub usage: Option<UsageSection>,
    pub completed_at: String,
}

impl ResultView {
    pub fn build(url: &str, result: &ScanResult, mode: ScanMode, now: DateTime<Local>) -> Self {
        let body = match result.outcome() {
            ScanOutcome::Failed { message, details } => ResultBody::Error {
                message: message.to_string(),
                details: details.map(str::to_string),
            },
            ScanOutcome::Scored(stats) => ResultBody::Stats {
                stats: *stats,
                level: stats.threat_level(),
                source: result.source_label().to_string(),
            },
            ScanOutcome::Empty => ResultBody::Empty,
        };

        let enhanced = mode.is_enhanced();

        Self {
            url: url.to_string(),
            mode,
            body,
            graph: result
                .graph_analysis
                .as_ref()
                .filter(|_| enhanced)
                .map(GraphSection::from),
            domain: result
                .domain_analysis
                .as_ref()
                .filter(|_| enhanced)
                .map(DomainSection::from),
            summary: result
                .enhanced_analysis
                .as_ref()
                .filter(|_| enhanced)
                .map(SummarySection::from),
            usage: result.rate_limit_info.as_ref().map(UsageSection::from),
            completed_at: completion_time(result.timestamp.as_deref(), now),
        }
    }

    pub fn threat_level(&self) -> Option<ThreatLevel> {
        match &self.body {
            ResultBody::Stats { level, .. } => Some(*level),
            _ => None,
        }
    }
}

/// Formats the service-provided timestamp in local time, falling back to
/// the raw string when it is not RFC 3339 and to `now` when it is absent.
fn completion_time(provided: Option<&str>, now: DateTime<Local>) -> String {
    match provided {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => parsed
                .with_timezone(&Local)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            Err(_) => raw.to_string(),
        },
        None => now.format(TIMESTAMP_FORMAT).to_string(),
    }
}
