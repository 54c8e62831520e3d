use super::{AgentHandle, AgentSettings, PageAgent, Surface};
use crate::bus::DeliveryError;
use crate::model::TabId;
use crate::protocol::{Message, Reply};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Resolves the surface a tab draws on.
pub trait SurfaceProvider: Send + Sync {
    fn surface(&self, tab: TabId) -> Option<Arc<dyn Surface>>;
}

/// A set of tabs, each with its own surface.
#[derive(Default)]
pub struct TabSurfaces {
    surfaces: Mutex<HashMap<TabId, Arc<dyn Surface>>>,
}

impl TabSurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tab: TabId, surface: Arc<dyn Surface>) {
        self.surfaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tab, surface);
    }

    pub fn remove(&self, tab: TabId) -> bool {
        self.surfaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&tab)
            .is_some()
    }
}

impl SurfaceProvider for TabSurfaces {
    fn surface(&self, tab: TabId) -> Option<Arc<dyn Surface>> {
        self.surfaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&tab)
            .cloned()
    }
}

/// Every tab resolves to the same surface.
pub struct SingleSurface(pub Arc<dyn Surface>);

impl SurfaceProvider for SingleSurface {
    fn surface(&self, _tab: TabId) -> Option<Arc<dyn Surface>> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Cannot access contents of {0}")]
    NoSurface(TabId),
}

/// Tracks which tabs have a live page agent.
///
/// Attaching is idempotent: a tab with a live agent keeps it, so repeated
/// injection never stacks a second set of listeners on one page.
pub struct AgentRegistry {
    provider: Arc<dyn SurfaceProvider>,
    settings: AgentSettings,
    agents: Mutex<HashMap<TabId, AgentHandle>>,
    injections: AtomicUsize,
}

impl AgentRegistry {
    pub fn new(provider: Arc<dyn SurfaceProvider>, settings: AgentSettings) -> Self {
        Self {
            provider,
            settings,
            agents: Mutex::new(HashMap::new()),
            injections: AtomicUsize::new(0),
        }
    }

    pub fn attach(&self, tab: TabId) -> Result<AgentHandle, RegistryError> {
        let mut agents = self.agents.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(handle) = agents.get(&tab).filter(|h| h.is_alive()) {
            debug!("Page agent already attached to {}", tab);
            return Ok(handle.clone());
        }

        let surface = self
            .provider
            .surface(tab)
            .ok_or(RegistryError::NoSurface(tab))?;
        let handle = PageAgent::spawn(surface, self.settings.clone());
        agents.insert(tab, handle.clone());
        self.injections.fetch_add(1, Ordering::Relaxed);
        info!("Injected page agent into {}", tab);

        Ok(handle)
    }

    pub fn handle(&self, tab: TabId) -> Option<AgentHandle> {
        self.agents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&tab)
            .cloned()
    }

    /// Drops the agent of a tab, e.g. after navigation.
    pub fn detach(&self, tab: TabId) -> bool {
        self.agents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&tab)
            .is_some()
    }

    /// How many agents were started over the registry's lifetime.
    pub fn injections(&self) -> usize {
        self.injections.load(Ordering::Relaxed)
    }

    pub async fn send(&self, tab: TabId, message: Message) -> Result<Reply, DeliveryError> {
        let handle = self.handle(tab).ok_or(DeliveryError::NoReceiver)?;
        handle.endpoint().request(message).await
    }

    /// Makes sure `tab` has an agent that answers pings. A missing agent is
    /// attached and given `settle` to finish starting before first use.
    pub async fn ensure(&self, tab: TabId, settle: Duration) -> Result<(), RegistryError> {
        if let Ok(Reply::Ready) = self.send(tab, Message::Ping).await {
            return Ok(());
        }

        debug!("Page agent not ready in {}, injecting", tab);
        self.attach(tab)?;
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(())
    }
}
