mod html;
mod json;
mod terminal;
mod text;

pub use html::{render_overlay_html, render_rate_panel_html};
pub use json::{print_json, rate_panel_json};
pub use terminal::{ConsoleNotifier, TerminalSurface};
pub use text::{render_overlay_text, render_rate_panel_text};

use crate::agent::OverlayView;
use crate::popup::RatePanel;
use anyhow::Result;

/// Output format for scan results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable coloured text
    #[default]
    Text,
    /// Raw service JSON for programmatic use
    Json,
    /// Overlay fragment as it would be injected into a page
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!(
                "Unknown format: {}. Use 'text', 'json', or 'html'",
                s
            )),
        }
    }
}

/// Renders an overlay. JSON has no overlay form and falls back to text.
pub fn render_overlay(view: &OverlayView, format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => render_overlay_html(view),
        OutputFormat::Text | OutputFormat::Json => render_overlay_text(view),
    }
}

pub fn render_rate_panel(panel: &RatePanel, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_rate_panel_text(panel)),
        OutputFormat::Json => rate_panel_json(panel),
        OutputFormat::Html => Ok(render_rate_panel_html(panel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("html".parse::<OutputFormat>(), Ok(OutputFormat::Html));
        assert!("sarif".parse::<OutputFormat>().is_err());
    }
}
