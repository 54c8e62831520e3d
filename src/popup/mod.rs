//! The popup controller.
//!
//! Manual URL entry, scans that bypass the coordinator's in-flight guard,
//! and a rate-limit panel kept fresh by polling the runtime RPC and by
//! listening for `updateRateLimit` broadcasts.

mod input;

pub use input::{mode_for_enter, validate_url, ValidationError};

use crate::agent::AgentRegistry;
use crate::api::{ApiError, ScanApi};
use crate::bus::Endpoint;
use crate::cycle::run_cycle;
use crate::model::{RateLimitInfo, ScanMode, ScanRequest, ScanResult, TabId};
use crate::protocol::{Message, Reply};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PopupSettings {
    /// Wait after injecting a page agent before first use.
    pub settle: Duration,
    pub status_ttl: Duration,
    pub poll_interval: Duration,
    pub refresh_after_success: Duration,
    pub refresh_after_error: Duration,
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            status_ttl: Duration::from_secs(3),
            poll_interval: Duration::from_secs(30),
            refresh_after_success: Duration::from_secs(1),
            refresh_after_error: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
pub enum PopupError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("A scan is already running")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatePanel {
    Loading,
    Usage(RateLimitInfo),
    /// The rate-limit RPC failed.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupState {
    pub input: String,
    pub status: Option<StatusLine>,
    pub controls_enabled: bool,
    pub rate_panel: RatePanel,
}

impl Default for PopupState {
    fn default() -> Self {
        Self {
            input: String::new(),
            status: None,
            controls_enabled: true,
            rate_panel: RatePanel::Loading,
        }
    }
}

#[derive(Clone)]
pub struct Popup {
    api: Arc<dyn ScanApi>,
    agents: Arc<AgentRegistry>,
    runtime: Endpoint,
    active_tab: TabId,
    settings: PopupSettings,
    state: Arc<Mutex<PopupState>>,
    status_seq: Arc<AtomicU64>,
}

impl Popup {
    pub fn new(
        api: Arc<dyn ScanApi>,
        agents: Arc<AgentRegistry>,
        runtime: Endpoint,
        active_tab: TabId,
        settings: PopupSettings,
    ) -> Self {
        Self {
            api,
            agents,
            runtime,
            active_tab,
            settings,
            state: Arc::new(Mutex::new(PopupState::default())),
            status_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> PopupState {
        self.lock().clone()
    }

    pub fn set_input(&self, input: impl Into<String>) {
        self.lock().input = input.into();
    }

    pub async fn on_enter(&self, ctrl: bool) -> Result<ScanResult, PopupError> {
        self.submit(mode_for_enter(ctrl)).await
    }

    /// Scans whatever is in the input field.
    pub async fn submit(&self, mode: ScanMode) -> Result<ScanResult, PopupError> {
        let input = self.lock().input.clone();
        self.scan(&input, mode).await
    }

    pub async fn scan(&self, input: &str, mode: ScanMode) -> Result<ScanResult, PopupError> {
        let url = match validate_url(input) {
            Ok(url) => url.to_string(),
            Err(e) => {
                self.show_status(e.to_string(), true);
                return Err(e.into());
            }
        };

        if !self.take_controls() {
            return Err(PopupError::Busy);
        }
        self.show_status(format!("{} scan started...", mode), false);

        let request = ScanRequest::new(url, mode, self.active_tab);
        let outcome = run_cycle(
            self.api.as_ref(),
            &self.agents,
            &request,
            self.settings.settle,
        )
        .await;

        let outcome = match outcome {
            Ok(result) => {
                if let Some(info) = &result.rate_limit_info {
                    self.set_panel(RatePanel::Usage(info.clone()));
                }
                self.show_status(format!("{} scan completed!", mode), false);
                self.lock().input.clear();
                self.schedule_refresh(self.settings.refresh_after_success);
                Ok(result)
            }
            Err(e) => {
                self.show_status(format!("Error: {}", e), true);
                self.schedule_refresh(self.settings.refresh_after_error);
                Err(e.into())
            }
        };

        self.lock().controls_enabled = true;
        outcome
    }

    /// Asks the coordinator for the current quota snapshot.
    pub async fn refresh_rate_limits(&self) -> RatePanel {
        let panel = match self.runtime.request(Message::GetRateLimit).await {
            Ok(Reply::RateLimit(status)) => RatePanel::Usage(status.current_status),
            Ok(Reply::Failed { error }) => {
                warn!("Could not load rate limit info: {}", error);
                RatePanel::Unavailable
            }
            Ok(other) => {
                warn!("Unexpected rate limit reply: {:?}", other);
                RatePanel::Unavailable
            }
            Err(e) => {
                warn!("Could not load rate limit info: {}", e);
                RatePanel::Unavailable
            }
        };
        self.set_panel(panel.clone());
        panel
    }

    /// Polls immediately, then every `poll_interval`.
    pub fn spawn_polling(&self) -> JoinHandle<()> {
        let popup = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(popup.settings.poll_interval);
            loop {
                ticker.tick().await;
                popup.refresh_rate_limits().await;
            }
        })
    }

    /// Applies `updateRateLimit` broadcasts until the sender goes away.
    pub fn listen(&self, mut updates: broadcast::Receiver<Message>) -> JoinHandle<()> {
        let popup = self.clone();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(Message::UpdateRateLimit { info }) => {
                        popup.set_panel(RatePanel::Usage(info))
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Popup skipped {} broadcast(s)", skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PopupState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_controls(&self) -> bool {
        let mut state = self.lock();
        if !state.controls_enabled {
            return false;
        }
        state.controls_enabled = false;
        true
    }

    fn set_panel(&self, panel: RatePanel) {
        self.lock().rate_panel = panel;
    }

    /// Shows a status line that clears itself unless replaced first.
    fn show_status(&self, text: String, is_error: bool) {
        let seq = self.status_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().status = Some(StatusLine { text, is_error });

        let popup = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(popup.settings.status_ttl).await;
            if popup.status_seq.load(Ordering::Relaxed) == seq {
                popup.lock().status = None;
            }
        });
    }

    fn schedule_refresh(&self, delay: Duration) {
        let popup = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            popup.refresh_rate_limits().await;
        });
    }
}
