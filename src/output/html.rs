//! HTML overlay output format.
//!
//! Renders an overlay as a self-contained fragment (backdrop, panel and
//! close button) that can be dropped into any page.

use crate::agent::{OverlayView, ResultBody, ResultView};
use crate::model::{RateLimitInfo, ThreatLevel, TierUsage, UsageLevel};
use crate::popup::RatePanel;

const STYLE: &str = r#"<style>
    .linkscan-backdrop {
        position: fixed; inset: 0; z-index: 2147483647;
        background: rgba(0, 0, 0, 0.5);
        display: flex; align-items: center; justify-content: center;
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    }
    .linkscan-panel {
        background: #fff; color: #333; border-radius: 8px;
        max-width: 520px; width: 90%; padding: 20px;
        box-shadow: 0 4px 20px rgba(0, 0, 0, 0.3);
    }
    .linkscan-panel h3 { margin: 0 0 12px; font-size: 18px; }
    .linkscan-url { word-break: break-all; color: #666; font-size: 13px; }
    .linkscan-section { margin-top: 12px; padding-top: 8px; border-top: 1px solid #eee; }
    .linkscan-bar { background: #eee; border-radius: 4px; height: 8px; overflow: hidden; }
    .linkscan-bar > div { height: 100%; }
    .linkscan-notice { color: #f44336; font-size: 13px; }
    .linkscan-close { margin-top: 16px; padding: 6px 16px; cursor: pointer; }
</style>"#;

pub fn render_overlay_html(view: &OverlayView) -> String {
    let (kind, body) = match view {
        OverlayView::Progress(progress) => (
            "progress",
            format!(
                r#"<h3>{}</h3>
<p class="linkscan-url">{}</p>
<p>{}</p>"#,
                html_escape(progress.heading),
                html_escape(&progress.url),
                html_escape(progress.hint)
            ),
        ),
        OverlayView::Result(result) => ("result", result_body(result)),
        OverlayView::Error(error) => (
            "error",
            format!(
                r#"<h3 style="color: #f44336">Scan Failed</h3>
<p>{}</p>"#,
                html_escape(&error.message)
            ),
        ),
    };

    format!(
        r#"{STYLE}
<div id="linkscan-overlay" class="linkscan-backdrop" data-kind="{kind}">
<div class="linkscan-panel">
{body}
<button class="linkscan-close">Close</button>
</div>
</div>"#
    )
}

fn result_body(view: &ResultView) -> String {
    let mut html = format!(
        r#"<h3>{} Scan Result</h3>
<p class="linkscan-url">{}</p>
"#,
        view.mode,
        html_escape(&view.url)
    );

    match &view.body {
        ResultBody::Error { message, details } => {
            html.push_str(&format!(
                r#"<p style="color: #f44336"><strong>Error:</strong> {}</p>
"#,
                html_escape(message)
            ));
            if let Some(details) = details {
                html.push_str(&format!("<p>{}</p>\n", html_escape(details)));
            }
        }
        ResultBody::Stats {
            stats,
            level,
            source,
        } => {
            html.push_str(&format!(
                r#"<p><strong style="color: {}">{}</strong></p>
<ul>
<li>Malicious: {}</li>
<li>Suspicious: {}</li>
<li>Harmless: {}</li>
<li>Undetected: {}</li>
</ul>
<p>Source: {}</p>
"#,
                threat_color(level),
                level.label(),
                stats.malicious,
                stats.suspicious,
                stats.harmless,
                stats.undetected,
                html_escape(source)
            ));
        }
        ResultBody::Empty => html.push_str("<p>No analysis data returned.</p>\n"),
    }

    if let Some(graph) = &view.graph {
        html.push_str(&format!(
            r#"<div class="linkscan-section"><strong>Graph Search:</strong> {} graph(s) found"#,
            graph.count
        ));
        if let Some(query) = &graph.query {
            html.push_str(&format!("<br>Query: <code>{}</code>", html_escape(query)));
        }
        if !graph.graphs.is_empty() {
            html.push_str(&format!(
                "<details><summary>{} graph(s)</summary><ul>",
                graph.graphs.len()
            ));
            for line in &graph.graphs {
                html.push_str(&format!("<li>{}", html_escape(&line.title)));
                let mut meta = Vec::new();
                if let Some(created) = &line.created {
                    meta.push(format!("created {}", html_escape(created)));
                }
                if let Some(owner) = &line.owner {
                    meta.push(format!("owner {}", html_escape(owner)));
                }
                if let Some(nodes) = line.node_count {
                    meta.push(format!("{} nodes", nodes));
                }
                if !meta.is_empty() {
                    html.push_str(&format!(" <small>({})</small>", meta.join(", ")));
                }
                html.push_str("</li>");
            }
            html.push_str("</ul></details>");
        }
        html.push_str("</div>\n");
    }

    if let Some(domain) = &view.domain {
        html.push_str(r#"<div class="linkscan-section"><strong>Domain Reputation</strong>"#);
        if let Some(name) = &domain.domain {
            html.push_str(&format!(": {}", html_escape(name)));
        }
        if let Some((score, band)) = domain.reputation {
            html.push_str(&format!("<br>Reputation: {} ({})", score, band.label()));
        }
        html.push_str(&format!("<br>Categories: {}", domain.category_count));
        if let Some(stats) = &domain.stats {
            html.push_str(&format!(
                "<br>Domain engines: {} malicious, {} suspicious, {} harmless, {} undetected",
                stats.malicious, stats.suspicious, stats.harmless, stats.undetected
            ));
        }
        if let Some(registrar) = &domain.registrar {
            html.push_str(&format!("<br>Registrar: {}", html_escape(registrar)));
        }
        if let Some(country) = &domain.country {
            html.push_str(&format!("<br>Country: {}", html_escape(country)));
        }
        html.push_str("</div>\n");
    }

    if let Some(summary) = &view.summary {
        html.push_str(&format!(
            r#"<div class="linkscan-section"><strong>Analysis:</strong> {} / {}<br>Graph search: {}<br>Features: {}</div>
"#,
            html_escape(&summary.analysis_type),
            html_escape(&summary.depth),
            if summary.graph_search { "yes" } else { "no" },
            summary.feature_count
        ));
    }

    if let Some(usage) = &view.usage {
        html.push_str(r#"<div class="linkscan-section">"#);
        for tier in &usage.tiers {
            html.push_str(&tier_bar(tier));
        }
        for notice in &usage.notices {
            html.push_str(&format!(
                r#"<p class="linkscan-notice">{}</p>"#,
                html_escape(notice)
            ));
        }
        html.push_str("</div>\n");
    }

    html.push_str(&format!(
        "<p><small>Completed: {}</small></p>",
        html_escape(&view.completed_at)
    ));
    html
}

pub fn render_rate_panel_html(panel: &RatePanel) -> String {
    match panel {
        RatePanel::Loading => "<p>Loading API usage...</p>".to_string(),
        RatePanel::Unavailable => {
            r#"<p class="linkscan-notice">Cannot connect to API server</p>"#.to_string()
        }
        RatePanel::Usage(info) => usage_panel(info),
    }
}

fn usage_panel(info: &RateLimitInfo) -> String {
    let mut html = String::from("<div class=\"linkscan-usage\">\n<h4>API Usage Status</h4>\n");
    for tier in info.tiers() {
        html.push_str(&tier_bar(&tier));
    }
    for notice in info.notices() {
        html.push_str(&format!(
            r#"<p class="linkscan-notice">{}</p>"#,
            html_escape(&notice)
        ));
    }
    html.push_str("</div>");
    html
}

fn tier_bar(usage: &TierUsage) -> String {
    let percent = usage.percent();
    format!(
        r#"<div>{}: {}/{} ({}%)<div class="linkscan-bar"><div style="width: {}%; background: {}"></div></div></div>
"#,
        usage.tier.display_name(),
        usage.used,
        usage.quota,
        percent,
        percent.min(100),
        level_color(usage.level())
    )
}

fn threat_color(level: &ThreatLevel) -> &'static str {
    match level {
        ThreatLevel::Malicious => "#f44336",
        ThreatLevel::Suspicious => "#ff9800",
        ThreatLevel::Clean => "#4caf50",
    }
}

fn level_color(level: UsageLevel) -> &'static str {
    match level {
        UsageLevel::Normal => "#4caf50",
        UsageLevel::Warning => "#ff9800",
        UsageLevel::Exhausted => "#f44336",
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
