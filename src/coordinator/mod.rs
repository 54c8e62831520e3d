//! The background coordinator.
//!
//! Owns the context menu, the liveness probe, the runtime RPC handler and
//! the in-flight guard for menu-triggered scans. Popup scans do not go
//! through the guard.

mod menu;
mod notify;

pub use menu::{
    menu_items, mode_for_item, resolve_target, MenuClick, MenuContext, MenuItem, TabInfo,
    DEEP_SCAN_ID, PARENT_MENU_ID, QUICK_SCAN_ID,
};
pub use notify::{LogNotifier, Notification, Notifier};

use crate::agent::AgentRegistry;
use crate::api::ScanApi;
use crate::bus::{Broadcaster, Endpoint};
use crate::cycle::run_cycle;
use crate::model::{CycleId, RateLimitInfo, ScanRequest, ScanResult};
use crate::protocol::{Message, Reply};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const IDLE: u64 = 0;

/// Advisory guard for menu scans: holds the id of the running cycle.
#[derive(Debug, Default)]
struct InFlight(AtomicU64);

impl InFlight {
    fn try_begin(&self, cycle: CycleId) -> Option<InFlightGuard<'_>> {
        self.0
            .compare_exchange(IDLE, cycle.0, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.0))
    }

    fn current(&self) -> Option<CycleId> {
        match self.0.load(Ordering::Acquire) {
            IDLE => None,
            id => Some(CycleId(id)),
        }
    }
}

/// Releases the guard on every exit path, including failures.
struct InFlightGuard<'a>(&'a AtomicU64);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuOutcome {
    /// Not one of our menu items.
    Ignored,
    /// Another menu scan was running; the click was dropped.
    Busy,
    /// Neither the click nor the tab carried a URL.
    NoTarget,
    Completed { cycle: CycleId, result: ScanResult },
    Failed { cycle: CycleId, error: String },
}

pub struct Coordinator {
    api: Arc<dyn ScanApi>,
    agents: Arc<AgentRegistry>,
    notifier: Arc<dyn Notifier>,
    broadcaster: Broadcaster,
    in_flight: InFlight,
    menus: Mutex<Vec<MenuItem>>,
    settle: Duration,
}

impl Coordinator {
    pub fn new(
        api: Arc<dyn ScanApi>,
        agents: Arc<AgentRegistry>,
        notifier: Arc<dyn Notifier>,
        settle: Duration,
    ) -> Self {
        Self {
            api,
            agents,
            notifier,
            broadcaster: Broadcaster::new(),
            in_flight: InFlight::default(),
            menus: Mutex::new(Vec::new()),
            settle,
        }
    }

    /// Startup/install hook: registers the menu and probes the API.
    pub async fn start(&self) -> bool {
        self.register_menus();
        self.check_health().await
    }

    pub fn register_menus(&self) {
        let mut menus = self.menus.lock().unwrap_or_else(|e| e.into_inner());
        *menus = menu_items();
        debug!("Registered {} context menu entries", menus.len());
    }

    pub fn menus(&self) -> Vec<MenuItem> {
        self.menus.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Probes the API once; raises a notification when it is down.
    pub async fn check_health(&self) -> bool {
        match self.api.probe().await {
            Ok(()) => {
                debug!("Scanner API is up");
                true
            }
            Err(e) => {
                warn!("Scanner API health check failed: {}", e);
                self.notifier.notify(Notification::api_unavailable());
                false
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.current().is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.broadcaster.subscribe()
    }

    pub async fn on_menu_clicked(&self, click: &MenuClick, tab: &TabInfo) -> MenuOutcome {
        let Some(mode) = mode_for_item(&click.menu_item_id) else {
            return MenuOutcome::Ignored;
        };

        let cycle = CycleId::next();
        let Some(_guard) = self.in_flight.try_begin(cycle) else {
            debug!(
                "Scan {:?} still running, dropping menu click",
                self.in_flight.current()
            );
            return MenuOutcome::Busy;
        };

        let Some(url) = resolve_target(click, tab) else {
            warn!("Menu click in {} carried no URL", tab.id);
            return MenuOutcome::NoTarget;
        };

        let request = ScanRequest {
            url: url.to_string(),
            mode,
            tab: tab.id,
            cycle,
        };

        match run_cycle(self.api.as_ref(), &self.agents, &request, self.settle).await {
            Ok(result) => {
                if let Some(info) = &result.rate_limit_info {
                    self.publish_rate_limit(info);
                }
                MenuOutcome::Completed { cycle, result }
            }
            Err(e) => MenuOutcome::Failed {
                cycle,
                error: e.to_string(),
            },
        }
    }

    fn publish_rate_limit(&self, info: &RateLimitInfo) {
        let reached = self.broadcaster.publish(Message::UpdateRateLimit { info: info.clone() });
        debug!("Rate limit update reached {} listener(s)", reached);
    }

    /// Runtime RPC surface used by the popup.
    pub async fn handle_runtime(&self, message: Message) -> Reply {
        match message {
            Message::Ping => Reply::Ready,
            Message::GetRateLimit => match self.api.rate_limits().await {
                Ok(status) => Reply::RateLimit(status),
                Err(e) => {
                    warn!("Could not load rate limit info: {}", e);
                    Reply::failed(e)
                }
            },
            other => {
                debug!("Runtime ignores {}", other.action());
                Reply::Ignored
            }
        }
    }

    /// Serves [`handle_runtime`](Self::handle_runtime) on a fresh endpoint.
    /// Each request is answered from its own task once its I/O completes.
    pub fn serve_runtime(self: &Arc<Self>) -> Endpoint {
        let (endpoint, mut envelopes) = Endpoint::channel();
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(envelope) = envelopes.recv().await {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    let reply = coordinator.handle_runtime(envelope.message.clone()).await;
                    envelope.respond(reply);
                });
            }
            info!("Runtime endpoint closed");
        });
        endpoint
    }
}
