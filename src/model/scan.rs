use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::RateLimitInfo;

static NEXT_CYCLE: AtomicU64 = AtomicU64::new(1);

/// Correlation token for one scan cycle.
///
/// Every progress, result and error instruction produced by a cycle carries
/// the same id, so a surface showing interleaved cycles can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(pub u64);

impl CycleId {
    /// Allocates a fresh, process-wide increasing id.
    pub fn next() -> Self {
        CycleId(NEXT_CYCLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a page surface (a browser tab).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Quick,
    #[serde(alias = "deep")]
    Enhanced,
}

impl ScanMode {
    /// API path serving this mode.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ScanMode::Quick => "/scan",
            ScanMode::Enhanced => "/enhanced-scan",
        }
    }

    pub fn is_enhanced(&self) -> bool {
        matches!(self, ScanMode::Enhanced)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ScanMode::Quick => "Quick",
            ScanMode::Enhanced => "Deep",
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(ScanMode::Quick),
            "deep" | "enhanced" => Ok(ScanMode::Enhanced),
            _ => Err(format!("Unknown scan mode: {}. Use 'quick' or 'deep'", s)),
        }
    }
}

/// A user-triggered scan, alive for exactly one request/response cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub url: String,
    pub mode: ScanMode,
    pub tab: TabId,
    pub cycle: CycleId,
}

impl ScanRequest {
    pub fn new(url: impl Into<String>, mode: ScanMode, tab: TabId) -> Self {
        Self {
            url: url.into(),
            mode,
            tab,
            cycle: CycleId::next(),
        }
    }
}

/// Verdict derived from engine statistics.
///
/// Ordered by severity: any malicious detection outranks any suspicious one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Clean,
    Suspicious,
    Malicious,
}

impl ThreatLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ThreatLevel::Clean => "CLEAN",
            ThreatLevel::Suspicious => "SUSPICIOUS",
            ThreatLevel::Malicious => "MALICIOUS",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineStats {
    pub malicious: u32,
    pub suspicious: u32,
    pub harmless: u32,
    pub undetected: u32,
}

impl EngineStats {
    pub fn threat_level(&self) -> ThreatLevel {
        if self.malicious > 0 {
            ThreatLevel::Malicious
        } else if self.suspicious > 0 {
            ThreatLevel::Suspicious
        } else {
            ThreatLevel::Clean
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<GraphDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
}

/// Graph creation time: an epoch in seconds or a preformatted string.
/// Anything else is kept as-is so a single odd field never fails the decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphDate {
    Epoch(i64),
    Text(String),
    Other(serde_json::Value),
}

impl std::fmt::Display for GraphDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphDate::Epoch(secs) => match chrono::DateTime::from_timestamp(*secs, 0) {
                Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
                None => write!(f, "{}", secs),
            },
            GraphDate::Text(text) => write!(f, "{}", text),
            GraphDate::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Findings of the graph-relationship search run by enhanced scans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphAnalysis {
    pub graphs_found: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    pub graphs: Vec<GraphSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReputationBand {
    Good,
    Neutral,
    Poor,
}

impl ReputationBand {
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s > 0 => ReputationBand::Good,
            0 => ReputationBand::Neutral,
            _ => ReputationBand::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReputationBand::Good => "Good",
            ReputationBand::Neutral => "Neutral",
            ReputationBand::Poor => "Poor",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation: Option<i64>,
    pub categories: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analysis_stats: Option<EngineStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl DomainAnalysis {
    pub fn reputation_band(&self) -> Option<ReputationBand> {
        self.reputation.map(ReputationBand::from_score)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    pub graph_search_performed: bool,
    pub features: Vec<String>,
}

/// Payload returned by `/scan` and `/enhanced-scan`.
///
/// The service answers either with an error object or with engine
/// statistics; both shapes deserialize into this struct and are told apart
/// with [`ScanResult::outcome`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<EngineStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_analysis: Option<GraphAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_analysis: Option<DomainAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_analysis: Option<EnhancedAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_info: Option<RateLimitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Borrowed view of the two shapes a [`ScanResult`] can take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanOutcome<'a> {
    Failed {
        message: &'a str,
        details: Option<&'a str>,
    },
    Scored(&'a EngineStats),
    Empty,
}

impl ScanResult {
    pub fn from_stats(stats: EngineStats) -> Self {
        Self {
            stats: Some(stats),
            ..Self::default()
        }
    }

    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_rate_limit(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit_info = Some(info);
        self
    }

    /// An error payload wins over statistics if the service sent both.
    pub fn outcome(&self) -> ScanOutcome<'_> {
        if let Some(message) = &self.error {
            return ScanOutcome::Failed {
                message,
                details: self.details.as_deref(),
            };
        }
        match &self.stats {
            Some(stats) => ScanOutcome::Scored(stats),
            None => ScanOutcome::Empty,
        }
    }

    pub fn threat_level(&self) -> Option<ThreatLevel> {
        match self.outcome() {
            ScanOutcome::Scored(stats) => Some(stats.threat_level()),
            _ => None,
        }
    }

    pub fn source_label(&self) -> &str {
        self.source.as_deref().unwrap_or("new scan")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(malicious: u32, suspicious: u32, harmless: u32) -> EngineStats {
        EngineStats {
            malicious,
            suspicious,
            harmless,
            undetected: 0,
        }
    }

    #[test]
    fn test_malicious_outranks_everything() {
        assert_eq!(stats(1, 0, 0).threat_level(), ThreatLevel::Malicious);
        assert_eq!(stats(1, 9, 90).threat_level(), ThreatLevel::Malicious);
        assert_eq!(stats(3, 5, 0).threat_level(), ThreatLevel::Malicious);
    }

    #[test]
    fn test_suspicious_without_malicious() {
        assert_eq!(stats(0, 1, 0).threat_level(), ThreatLevel::Suspicious);
        assert_eq!(stats(0, 4, 70).threat_level(), ThreatLevel::Suspicious);
    }

    #[test]
    fn test_clean_otherwise() {
        assert_eq!(stats(0, 0, 70).threat_level(), ThreatLevel::Clean);
        assert_eq!(EngineStats::default().threat_level(), ThreatLevel::Clean);
    }

    #[test]
    fn test_threat_level_ordering() {
        assert!(ThreatLevel::Malicious > ThreatLevel::Suspicious);
        assert!(ThreatLevel::Suspicious > ThreatLevel::Clean);
    }

    #[test]
    fn test_scan_mode_endpoints() {
        assert_eq!(ScanMode::Quick.endpoint(), "/scan");
        assert_eq!(ScanMode::Enhanced.endpoint(), "/enhanced-scan");
        assert_eq!("deep".parse::<ScanMode>(), Ok(ScanMode::Enhanced));
        assert_eq!("QUICK".parse::<ScanMode>(), Ok(ScanMode::Quick));
        assert!("slow".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_cycle_ids_increase() {
        let first = CycleId::next();
        let second = CycleId::next();
        assert!(second > first);
    }

    #[test]
    fn test_parse_quick_result_with_missing_counts() {
        let json = r#"{"url":"https://example.com","stats":{"malicious":2,"harmless":50},"source":"existing"}"#;
        let result: ScanResult = serde_json::from_str(json).unwrap();

        let stats = result.stats.unwrap();
        assert_eq!(stats.malicious, 2);
        assert_eq!(stats.suspicious, 0);
        assert_eq!(stats.undetected, 0);
        assert_eq!(result.source_label(), "existing");
        assert_eq!(result.threat_level(), Some(ThreatLevel::Malicious));
    }

    #[test]
    fn test_parse_error_result() {
        let json = r#"{"error":"Failed to scan URL with VirusTotal","status_code":429,"details":"Quota exceeded"}"#;
        let result: ScanResult = serde_json::from_str(json).unwrap();

        assert_eq!(
            result.outcome(),
            ScanOutcome::Failed {
                message: "Failed to scan URL with VirusTotal",
                details: Some("Quota exceeded"),
            }
        );
        assert_eq!(result.threat_level(), None);
    }

    #[test]
    fn test_parse_enhanced_result() {
        let json = r#"{
            "scan_type": "enhanced",
            "stats": {"malicious": 0, "suspicious": 0, "harmless": 66, "undetected": 10},
            "graph_analysis": {
                "graphs_found": 1,
                "search_query": "example.com",
                "graphs": [{"id": "g-1", "name": "campaign", "creation_date": "2024-03-01", "node_count": 12}]
            },
            "domain_analysis": {
                "domain": "example.com",
                "reputation": -5,
                "categories": {"Forcepoint": "phishing", "Sophos": "spam"},
                "last_analysis_stats": {"malicious": 1},
                "registrar": "Example Registrar"
            },
            "enhanced_analysis": {
                "analysis_type": "comprehensive",
                "depth": "deep",
                "graph_search_performed": true,
                "features": ["graph_search", "domain_reputation"]
            },
            "unexpected_field": 42
        }"#;
        let result: ScanResult = serde_json::from_str(json).unwrap();

        let graph = result.graph_analysis.as_ref().unwrap();
        assert_eq!(graph.graphs_found, 1);
        assert_eq!(graph.graphs[0].node_count, Some(12));
        assert_eq!(
            graph.graphs[0].creation_date,
            Some(GraphDate::Text("2024-03-01".to_string()))
        );

        let domain = result.domain_analysis.as_ref().unwrap();
        assert_eq!(domain.reputation_band(), Some(ReputationBand::Poor));
        assert_eq!(domain.categories.len(), 2);
        assert_eq!(domain.last_analysis_stats.unwrap().malicious, 1);
        assert_eq!(domain.country, None);

        let enhanced = result.enhanced_analysis.as_ref().unwrap();
        assert!(enhanced.graph_search_performed);
        assert_eq!(enhanced.features.len(), 2);
    }

    #[test]
    fn test_numeric_graph_date_keeps_stats() {
        let json = r#"{
            "stats": {"malicious": 2},
            "graph_analysis": {
                "graphs_found": 2,
                "graphs": [
                    {"id": "g-1", "creation_date": 1700000000},
                    {"id": "g-2", "creation_date": 1.5}
                ]
            }
        }"#;
        let result: ScanResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.threat_level(), Some(ThreatLevel::Malicious));
        let graphs = &result.graph_analysis.as_ref().unwrap().graphs;
        assert_eq!(graphs[0].creation_date, Some(GraphDate::Epoch(1_700_000_000)));
        assert_eq!(graphs[0].creation_date.as_ref().unwrap().to_string(), "2023-11-14");
        assert_eq!(graphs[1].creation_date.as_ref().unwrap().to_string(), "1.5");
    }

    #[test]
    fn test_reputation_bands() {
        assert_eq!(ReputationBand::from_score(12), ReputationBand::Good);
        assert_eq!(ReputationBand::from_score(0), ReputationBand::Neutral);
        assert_eq!(ReputationBand::from_score(-1), ReputationBand::Poor);
    }

    #[test]
    fn test_error_wins_over_stats() {
        let mut result = ScanResult::from_stats(stats(1, 0, 0));
        result.error = Some("partial".to_string());
        assert!(matches!(result.outcome(), ScanOutcome::Failed { .. }));
    }
}
