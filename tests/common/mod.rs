#![allow(dead_code)]

use async_trait::async_trait;
use linkscan::agent::{AgentRegistry, AgentSettings, MemorySurface, SingleSurface};
use linkscan::api::{ApiError, ScanApi};
use linkscan::coordinator::{Coordinator, Notification, Notifier};
use linkscan::model::{EngineStats, RateLimitInfo, RateLimitStatus, ScanMode, ScanResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// What the fake service answers to `/scan` and `/enhanced-scan`.
#[derive(Clone)]
pub enum ScanReply {
    Result(ScanResult),
    Status(u16, String),
}

/// In-process stand-in for the scanning service.
pub struct FakeApi {
    scan_reply: ScanReply,
    rate_limits: Option<RateLimitInfo>,
    probe_ok: bool,
    scans: AtomicUsize,
    rate_calls: AtomicUsize,
    modes: Mutex<Vec<ScanMode>>,
    /// Held by the first scan until released.
    gate: Mutex<Option<Arc<Notify>>>,
    pub started: Notify,
}

impl FakeApi {
    pub fn new(scan_reply: ScanReply) -> Self {
        Self {
            scan_reply,
            rate_limits: Some(RateLimitInfo::default()),
            probe_ok: true,
            scans: AtomicUsize::new(0),
            rate_calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            started: Notify::new(),
        }
    }

    pub fn clean() -> Self {
        Self::new(ScanReply::Result(ScanResult::from_stats(EngineStats {
            harmless: 60,
            undetected: 10,
            ..EngineStats::default()
        })))
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self::new(ScanReply::Status(status, body.to_string()))
    }

    pub fn with_rate_limits(mut self, info: Option<RateLimitInfo>) -> Self {
        self.rate_limits = info;
        self
    }

    pub fn offline(mut self) -> Self {
        self.probe_ok = false;
        self.rate_limits = None;
        self
    }

    /// Makes the first scan wait until the returned handle is notified.
    pub fn gated(self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        (self, gate)
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn rate_calls(&self) -> usize {
        self.rate_calls.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<ScanMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanApi for FakeApi {
    async fn probe(&self) -> Result<(), ApiError> {
        if self.probe_ok {
            Ok(())
        } else {
            Err(ApiError::Unavailable)
        }
    }

    async fn scan(&self, _url: &str, mode: ScanMode) -> Result<ScanResult, ApiError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(mode);
        self.started.notify_one();

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match &self.scan_reply {
            ScanReply::Result(result) => Ok(result.clone()),
            ScanReply::Status(status, body) => Err(ApiError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn rate_limits(&self) -> Result<RateLimitStatus, ApiError> {
        self.rate_calls.fetch_add(1, Ordering::SeqCst);
        match &self.rate_limits {
            Some(info) => Ok(RateLimitStatus {
                current_status: info.clone(),
            }),
            None => Err(ApiError::Unavailable),
        }
    }
}

/// Remembers every notification raised.
#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

/// Agent timings with no exit transition so tests never sleep.
pub fn fast_agent_settings() -> AgentSettings {
    AgentSettings {
        exit_transition: Duration::ZERO,
        ..AgentSettings::default()
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub surface: Arc<MemorySurface>,
    pub agents: Arc<AgentRegistry>,
    pub notifier: Arc<RecordingNotifier>,
    pub coordinator: Arc<Coordinator>,
}

pub fn harness(api: FakeApi) -> Harness {
    let api = Arc::new(api);
    let surface = MemorySurface::new();
    let agents = Arc::new(AgentRegistry::new(
        Arc::new(SingleSurface(surface.clone())),
        fast_agent_settings(),
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = Arc::new(Coordinator::new(
        api.clone(),
        agents.clone(),
        notifier.clone(),
        Duration::ZERO,
    ));

    Harness {
        api,
        surface,
        agents,
        notifier,
        coordinator,
    }
}
