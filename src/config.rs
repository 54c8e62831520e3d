//! Configuration file handling.
//!
//! This module provides loading and saving of linkscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/linkscan/config.toml`
//! - macOS: `~/Library/Application Support/linkscan/config.toml`
//! - Windows: `%APPDATA%\linkscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! api_base_url = "http://localhost:8000"
//! fallback_base_urls = ["http://127.0.0.1:8000"]
//! default_format = "text"
//! stale_results = "show"
//!
//! [timing]
//! quick_result_dismiss_secs = 15
//! deep_result_dismiss_secs = 30
//! rate_limit_poll_secs = 30
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::{AgentSettings, StalePolicy};
use crate::api::DEFAULT_BASE_URL;
use crate::popup::PopupSettings;

/// Application configuration.
///
/// It can be loaded from a TOML file or created with default values.
///
/// # Example
///
/// ```no_run
/// use linkscan::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Scanner API: {}", config.api_base_url);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base address of the scanning service.
    ///
    /// Default: `http://localhost:8000`
    pub api_base_url: String,

    /// Addresses tried after `api_base_url` by `linkscan health`.
    ///
    /// Default: `["http://127.0.0.1:8000"]`
    pub fallback_base_urls: Vec<String>,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "text", "json", "html"
    /// Default: "text"
    pub default_format: String,

    /// What a page does with a result for a cycle older than the one it
    /// currently shows: "show" renders it anyway, "drop" ignores it.
    ///
    /// Default: "show"
    pub stale_results: StalePolicy,

    /// Delays and auto-dismiss intervals.
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Every fixed delay used by the coordinator, page agent and popup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after the coordinator injects a page agent.
    pub agent_settle_ms: u64,
    /// Wait after the popup injects a page agent.
    pub popup_settle_ms: u64,
    pub exit_transition_ms: u64,
    pub quick_result_dismiss_secs: u64,
    pub deep_result_dismiss_secs: u64,
    pub error_dismiss_secs: u64,
    /// How long popup status lines stay visible.
    pub status_clear_secs: u64,
    pub rate_limit_poll_secs: u64,
    pub refresh_after_scan_ms: u64,
    pub refresh_after_error_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            agent_settle_ms: 100,
            popup_settle_ms: 500,
            exit_transition_ms: 300,
            quick_result_dismiss_secs: 15,
            deep_result_dismiss_secs: 30,
            error_dismiss_secs: 10,
            status_clear_secs: 3,
            rate_limit_poll_secs: 30,
            refresh_after_scan_ms: 1000,
            refresh_after_error_ms: 500,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            fallback_base_urls: vec!["http://127.0.0.1:8000".to_string()],
            default_format: "text".to_string(),
            stale_results: StalePolicy::Show,
            timing: TimingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use linkscan::Config;
    ///
    /// let path = Config::config_path();
    /// println!("Config file: {}", path.display());
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Primary address first, then the fallbacks, without duplicates.
    pub fn base_url_candidates(&self) -> Vec<String> {
        let mut candidates = vec![self.api_base_url.clone()];
        for url in &self.fallback_base_urls {
            if !candidates.contains(url) {
                candidates.push(url.clone());
            }
        }
        candidates
    }

    pub fn agent_settings(&self) -> AgentSettings {
        let t = &self.timing;
        AgentSettings {
            exit_transition: Duration::from_millis(t.exit_transition_ms),
            quick_result_ttl: Duration::from_secs(t.quick_result_dismiss_secs),
            deep_result_ttl: Duration::from_secs(t.deep_result_dismiss_secs),
            error_ttl: Duration::from_secs(t.error_dismiss_secs),
            stale: self.stale_results,
        }
    }

    pub fn popup_settings(&self) -> PopupSettings {
        let t = &self.timing;
        PopupSettings {
            settle: Duration::from_millis(t.popup_settle_ms),
            status_ttl: Duration::from_secs(t.status_clear_secs),
            poll_interval: Duration::from_secs(t.rate_limit_poll_secs),
            refresh_after_success: Duration::from_millis(t.refresh_after_scan_ms),
            refresh_after_error: Duration::from_millis(t.refresh_after_error_ms),
        }
    }

    pub fn coordinator_settle(&self) -> Duration {
        Duration::from_millis(self.timing.agent_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.default_format, "text");
        assert_eq!(config.stale_results, StalePolicy::Show);
        assert_eq!(config.timing.quick_result_dismiss_secs, 15);
        assert!(config.timing.deep_result_dismiss_secs > config.timing.quick_result_dismiss_secs);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            api_base_url = "http://scanner.local:9000"
            stale_results = "drop"

            [timing]
            error_dismiss_secs = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://scanner.local:9000");
        assert_eq!(config.stale_results, StalePolicy::Drop);
        assert_eq!(config.timing.error_dismiss_secs, 4);
        assert_eq!(config.timing.popup_settle_ms, 500);
        assert_eq!(config.agent_settings().error_ttl, Duration::from_secs(4));
        assert_eq!(config.agent_settings().stale, StalePolicy::Drop);
    }

    #[test]
    fn test_base_url_candidates_deduplicated() {
        let config = Config {
            fallback_base_urls: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            ..Config::default()
        };

        assert_eq!(
            config.base_url_candidates(),
            vec!["http://localhost:8000", "http://127.0.0.1:8000"]
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            default_format: "html".to_string(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_format, "html");
        assert_eq!(loaded.timing.rate_limit_poll_secs, 30);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_default_config_parses_back() {
        let text = Config::generate_default_config();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.fallback_base_urls, vec!["http://127.0.0.1:8000"]);
    }
}
