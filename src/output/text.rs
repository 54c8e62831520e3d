use crate::agent::{
    DomainSection, GraphSection, OverlayView, ResultBody, ResultView, SummarySection, UsageSection,
};
use crate::model::{EngineStats, QuotaTier, RateLimitInfo, ThreatLevel, TierUsage, UsageLevel};
use crate::popup::RatePanel;
use tabled::{settings::Style, Table, Tabled};

const BAR_WIDTH: usize = 20;

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Malicious")]
    malicious: u32,
    #[tabled(rename = "Suspicious")]
    suspicious: u32,
    #[tabled(rename = "Harmless")]
    harmless: u32,
    #[tabled(rename = "Undetected")]
    undetected: u32,
}

#[derive(Tabled)]
struct GraphRow {
    #[tabled(rename = "Graph")]
    title: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Nodes")]
    nodes: String,
}

pub fn render_overlay_text(view: &OverlayView) -> String {
    match view {
        OverlayView::Progress(progress) => [
            format!("\x1b[34m{}\x1b[0m", progress.heading),
            format!("URL: {}", progress.url),
            progress.hint.to_string(),
        ]
        .join("\n"),
        OverlayView::Result(result) => render_result(result),
        OverlayView::Error(error) => [
            "\x1b[31mScan Failed\x1b[0m".to_string(),
            format!("Error: {}", error.message),
        ]
        .join("\n"),
    }
}

fn render_result(view: &ResultView) -> String {
    let mut lines = vec![
        format!("{} Scan Result", view.mode),
        format!("URL: {}", view.url),
        String::new(),
    ];

    match &view.body {
        ResultBody::Error { message, details } => {
            lines.push(format!("\x1b[31mError:\x1b[0m {}", message));
            if let Some(details) = details {
                lines.push(format!("Details: {}", details));
            }
        }
        ResultBody::Stats {
            stats,
            level,
            source,
        } => {
            lines.push(format!("Status: {}", format_threat(level)));
            lines.push(stats_table(stats));
            lines.push(format!("Source: {}", source));
        }
        ResultBody::Empty => lines.push("No analysis data returned.".to_string()),
    }

    if let Some(graph) = &view.graph {
        lines.push(String::new());
        lines.extend(graph_lines(graph));
    }
    if let Some(domain) = &view.domain {
        lines.push(String::new());
        lines.extend(domain_lines(domain));
    }
    if let Some(summary) = &view.summary {
        lines.push(String::new());
        lines.extend(summary_lines(summary));
    }
    if let Some(usage) = &view.usage {
        lines.push(String::new());
        lines.extend(usage_lines(usage));
    }

    lines.push(String::new());
    lines.push(format!("Completed: {}", view.completed_at));
    lines.join("\n")
}

fn stats_table(stats: &EngineStats) -> String {
    let row = StatsRow {
        malicious: stats.malicious,
        suspicious: stats.suspicious,
        harmless: stats.harmless,
        undetected: stats.undetected,
    };
    Table::new([row]).with(Style::rounded()).to_string()
}

fn graph_lines(graph: &GraphSection) -> Vec<String> {
    let mut lines = vec![format!("Graph Search: {} graph(s) found", graph.count)];
    if let Some(query) = &graph.query {
        lines.push(format!("Query: {}", query));
    }
    if !graph.graphs.is_empty() {
        let rows: Vec<GraphRow> = graph
            .graphs
            .iter()
            .map(|g| GraphRow {
                title: truncate(&g.title, 40),
                created: g.created.clone().unwrap_or_else(|| "-".to_string()),
                owner: g.owner.clone().unwrap_or_else(|| "-".to_string()),
                nodes: g
                    .node_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect();
        lines.push(Table::new(rows).with(Style::rounded()).to_string());
    }
    lines
}

fn domain_lines(domain: &DomainSection) -> Vec<String> {
    let mut lines = vec![match &domain.domain {
        Some(name) => format!("Domain Reputation: {}", name),
        None => "Domain Reputation".to_string(),
    }];
    if let Some((score, band)) = domain.reputation {
        lines.push(format!("Reputation: {} ({})", score, band.label()));
    }
    lines.push(format!("Categories: {}", domain.category_count));
    if let Some(stats) = &domain.stats {
        lines.push(format!(
            "Domain engines: {} malicious, {} suspicious, {} harmless, {} undetected",
            stats.malicious, stats.suspicious, stats.harmless, stats.undetected
        ));
    }
    if let Some(registrar) = &domain.registrar {
        lines.push(format!("Registrar: {}", registrar));
    }
    if let Some(country) = &domain.country {
        lines.push(format!("Country: {}", country));
    }
    lines
}

fn summary_lines(summary: &SummarySection) -> Vec<String> {
    vec![
        "Analysis Summary".to_string(),
        format!("Type: {}", summary.analysis_type),
        format!("Depth: {}", summary.depth),
        format!(
            "Graph search: {}",
            if summary.graph_search { "yes" } else { "no" }
        ),
        format!("Features: {}", summary.feature_count),
    ]
}

fn usage_lines(usage: &UsageSection) -> Vec<String> {
    let mut lines = vec!["API Usage".to_string()];
    lines.extend(usage.tiers.iter().map(tier_line));
    lines.extend(usage.notices.iter().map(|n| format!("\x1b[31m{}\x1b[0m", n)));
    lines
}

pub fn render_rate_panel_text(panel: &RatePanel) -> String {
    match panel {
        RatePanel::Loading => "Loading API usage...".to_string(),
        RatePanel::Unavailable => "\x1b[31mCannot connect to API server\x1b[0m".to_string(),
        RatePanel::Usage(info) => render_usage(info),
    }
}

fn render_usage(info: &RateLimitInfo) -> String {
    let mut lines = vec!["API Usage Status".to_string()];
    lines.extend(info.tiers().iter().map(tier_line));
    lines.extend(info.notices().iter().map(|n| format!("\x1b[31m{}\x1b[0m", n)));
    lines.join("\n")
}

fn tier_line(usage: &TierUsage) -> String {
    let counts = match usage.tier {
        QuotaTier::Minute => format!("{}/{}", usage.used, usage.quota),
        _ => format!(
            "{}/{}",
            group_thousands(usage.used),
            group_thousands(usage.quota)
        ),
    };
    format!(
        "{}{:<8}\x1b[0m {} {:>3}%  {}",
        level_color(usage.level()),
        usage.tier.display_name(),
        bar(usage.percent()),
        usage.percent(),
        counts
    )
}

fn bar(percent: u64) -> String {
    let filled = (percent.min(100) as usize * BAR_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn level_color(level: UsageLevel) -> &'static str {
    match level {
        UsageLevel::Normal => "\x1b[32m",
        UsageLevel::Warning => "\x1b[33m",
        UsageLevel::Exhausted => "\x1b[31m",
    }
}

fn format_threat(level: &ThreatLevel) -> String {
    match level {
        ThreatLevel::Malicious => "\x1b[31mMALICIOUS\x1b[0m".to_string(),
        ThreatLevel::Suspicious => "\x1b[33mSUSPICIOUS\x1b[0m".to_string(),
        ThreatLevel::Clean => "\x1b[32mCLEAN\x1b[0m".to_string(),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
