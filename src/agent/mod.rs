//! The page agent.
//!
//! One agent runs per attached surface. It receives protocol messages on an
//! [`Endpoint`], turns them into overlay views and keeps at most one overlay
//! mounted at any time. Agents are attached through the [`AgentRegistry`],
//! which makes attachment idempotent per tab.
//!
//! # Example
//!
//! ```no_run
//! use linkscan::agent::{AgentSettings, MemorySurface, PageAgent};
//! use linkscan::protocol::{Message, Reply};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let surface = MemorySurface::new();
//!     let agent = PageAgent::spawn(surface.clone(), AgentSettings::default());
//!
//!     let reply = agent.endpoint().request(Message::Ping).await?;
//!     assert_eq!(reply, Reply::Ready);
//!     Ok(())
//! }
//! ```

mod registry;
mod surface;
mod view;

pub use registry::{AgentRegistry, RegistryError, SingleSurface, SurfaceProvider, TabSurfaces};
pub use surface::{ClickTarget, MemorySurface, Overlay, OverlayId, Surface, SurfaceError};
pub use view::*;

use crate::bus::{Endpoint, Envelope};
use crate::model::{CycleId, ScanMode};
use crate::protocol::{Message, Reply};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What the agent does with instructions from a cycle older than the newest
/// one it has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Render anyway; the last instruction to arrive wins.
    #[default]
    Show,
    /// Ignore the instruction and reply [`Reply::Stale`].
    Drop,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub exit_transition: Duration,
    pub quick_result_ttl: Duration,
    pub deep_result_ttl: Duration,
    pub error_ttl: Duration,
    pub stale: StalePolicy,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            exit_transition: Duration::from_millis(300),
            quick_result_ttl: Duration::from_secs(15),
            deep_result_ttl: Duration::from_secs(30),
            error_ttl: Duration::from_secs(10),
            stale: StalePolicy::Show,
        }
    }
}

impl AgentSettings {
    fn result_ttl(&self, mode: ScanMode) -> Duration {
        match mode {
            ScanMode::Quick => self.quick_result_ttl,
            ScanMode::Enhanced => self.deep_result_ttl,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to render overlay: {0}")]
    Render(#[from] SurfaceError),
}

#[derive(Debug)]
enum Command {
    Click(ClickTarget),
    Expire(OverlayId),
}

/// Handle to a running agent.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    endpoint: Endpoint,
    commands: mpsc::UnboundedSender<Command>,
}

impl AgentHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_alive(&self) -> bool {
        self.endpoint.is_connected()
    }

    /// Forwards a user click on the page to the agent.
    pub fn click(&self, target: ClickTarget) -> bool {
        self.commands.send(Command::Click(target)).is_ok()
    }
}

pub struct PageAgent {
    surface: Arc<dyn Surface>,
    settings: AgentSettings,
    current: Option<OverlayId>,
    latest_cycle: Option<CycleId>,
    next_overlay: OverlayId,
    commands: mpsc::UnboundedSender<Command>,
}

impl PageAgent {
    /// Starts an agent on `surface`. The agent stops once every clone of
    /// the returned handle's endpoint is gone.
    pub fn spawn(surface: Arc<dyn Surface>, settings: AgentSettings) -> AgentHandle {
        let (endpoint, envelopes) = Endpoint::channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let agent = PageAgent {
            surface,
            settings,
            current: None,
            latest_cycle: None,
            next_overlay: 1,
            commands: commands_tx.clone(),
        };
        tokio::spawn(agent.run(envelopes, commands_rx));

        AgentHandle {
            endpoint,
            commands: commands_tx,
        }
    }

    async fn run(
        mut self,
        mut envelopes: mpsc::Receiver<Envelope>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        debug!("Page agent started");
        loop {
            // Clicks and timers queued before a message are handled first.
            tokio::select! {
                biased;
                Some(command) = commands.recv() => self.on_command(command).await,
                envelope = envelopes.recv() => match envelope {
                    Some(envelope) => {
                        let Envelope { message, reply } = envelope;
                        let response = self.dispatch(message).await;
                        let _ = reply.send(response);
                    }
                    None => break,
                },
            }
        }
        debug!("Page agent stopped");
    }

    /// Failures never escape the agent; they go back to the sender.
    async fn dispatch(&mut self, message: Message) -> Reply {
        let action = message.action();
        match self.handle(message).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Page agent failed to handle {}: {}", action, e);
                Reply::failed(e)
            }
        }
    }

    async fn handle(&mut self, message: Message) -> Result<Reply, AgentError> {
        if self.is_stale(message.cycle()) {
            debug!("Ignoring stale {} for cycle {:?}", message.action(), message.cycle());
            return Ok(Reply::Stale);
        }

        match message {
            Message::Ping => Ok(Reply::Ready),
            Message::ShowProgress { url, mode, cycle } => {
                self.note_cycle(cycle);
                self.show(OverlayView::progress(&url, mode), cycle, None)
                    .await
            }
            Message::ShowResult {
                url,
                result,
                mode,
                cycle,
            } => {
                let view = OverlayView::result(&url, &result, mode, Local::now());
                let ttl = self.settings.result_ttl(mode);
                self.show(view, cycle, Some(ttl)).await
            }
            Message::ShowError { message, cycle } => {
                let ttl = self.settings.error_ttl;
                self.show(OverlayView::error(&message), cycle, Some(ttl))
                    .await
            }
            Message::GetRateLimit | Message::UpdateRateLimit { .. } | Message::Unknown => {
                Ok(Reply::Ignored)
            }
        }
    }

    fn is_stale(&self, cycle: Option<CycleId>) -> bool {
        match (self.settings.stale, cycle, self.latest_cycle) {
            (StalePolicy::Drop, Some(cycle), Some(latest)) => cycle < latest,
            _ => false,
        }
    }

    fn note_cycle(&mut self, cycle: Option<CycleId>) {
        if let Some(cycle) = cycle {
            self.latest_cycle = Some(self.latest_cycle.map_or(cycle, |latest| latest.max(cycle)));
        }
    }

    async fn show(
        &mut self,
        view: OverlayView,
        cycle: Option<CycleId>,
        ttl: Option<Duration>,
    ) -> Result<Reply, AgentError> {
        self.clear().await;

        let id = self.next_overlay;
        self.next_overlay += 1;
        self.surface.mount(Overlay { id, cycle, view })?;
        self.current = Some(id);

        if let Some(ttl) = ttl {
            let commands = self.commands.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let _ = commands.send(Command::Expire(id));
            });
        }

        Ok(Reply::Done)
    }

    /// Removes whatever the surface shows, after the exit transition.
    async fn clear(&mut self) {
        let mounted = self.surface.mounted();
        self.current = None;
        if mounted.is_empty() {
            return;
        }
        if !self.settings.exit_transition.is_zero() {
            tokio::time::sleep(self.settings.exit_transition).await;
        }
        for id in mounted {
            self.surface.unmount(id);
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Click(target) if target.dismisses() => {
                if self.current.is_some() {
                    debug!("Overlay dismissed by {:?}", target);
                    self.clear().await;
                }
            }
            Command::Click(_) => {}
            Command::Expire(id) => {
                if self.current == Some(id) {
                    debug!("Overlay {} expired", id);
                    self.clear().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EngineStats, ScanResult};

    fn settings() -> AgentSettings {
        AgentSettings {
            exit_transition: Duration::ZERO,
            ..AgentSettings::default()
        }
    }

    fn progress(cycle: u64) -> Message {
        Message::ShowProgress {
            url: "http://a.test".to_string(),
            mode: ScanMode::Quick,
            cycle: Some(CycleId(cycle)),
        }
    }

    fn result(cycle: u64, mode: ScanMode) -> Message {
        Message::ShowResult {
            url: "http://a.test".to_string(),
            result: ScanResult::from_stats(EngineStats::default()),
            mode,
            cycle: Some(CycleId(cycle)),
        }
    }

    #[tokio::test]
    async fn test_ping_is_acknowledged() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        assert_eq!(agent.endpoint().request(Message::Ping).await, Ok(Reply::Ready));
        assert!(surface.overlays().is_empty());
    }

    #[tokio::test]
    async fn test_progress_then_result_leaves_one_overlay() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        agent.endpoint().request(progress(1)).await.unwrap();
        assert_eq!(surface.overlays().len(), 1);
        assert_eq!(surface.current().unwrap().kind(), OverlayKind::Progress);

        agent.endpoint().request(result(1, ScanMode::Quick)).await.unwrap();
        let overlays = surface.overlays();
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].kind(), OverlayKind::Result);
        assert_eq!(overlays[0].cycle, Some(CycleId(1)));
    }

    #[tokio::test]
    async fn test_unknown_and_popup_actions_are_ignored() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        assert_eq!(agent.endpoint().request(Message::Unknown).await, Ok(Reply::Ignored));
        assert_eq!(
            agent.endpoint().request(Message::GetRateLimit).await,
            Ok(Reply::Ignored)
        );
        assert!(surface.overlays().is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_is_reported_not_raised() {
        let surface = MemorySurface::new();
        surface.detach("tab closed");
        let agent = PageAgent::spawn(surface.clone(), settings());

        let reply = agent.endpoint().request(progress(1)).await.unwrap();
        assert!(reply.is_failure());

        // The agent keeps serving after a failure.
        assert_eq!(agent.endpoint().request(Message::Ping).await, Ok(Reply::Ready));
    }

    #[tokio::test]
    async fn test_stale_result_dropped_under_drop_policy() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(
            surface.clone(),
            AgentSettings {
                stale: StalePolicy::Drop,
                ..settings()
            },
        );

        agent.endpoint().request(progress(1)).await.unwrap();
        agent.endpoint().request(progress(2)).await.unwrap();
        assert_eq!(
            agent.endpoint().request(result(1, ScanMode::Quick)).await,
            Ok(Reply::Stale)
        );

        let current = surface.current().unwrap();
        assert_eq!(current.kind(), OverlayKind::Progress);
        assert_eq!(current.cycle, Some(CycleId(2)));
    }

    #[tokio::test]
    async fn test_stale_result_shown_under_show_policy() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        agent.endpoint().request(progress(1)).await.unwrap();
        agent.endpoint().request(progress(2)).await.unwrap();
        assert_eq!(
            agent.endpoint().request(result(1, ScanMode::Quick)).await,
            Ok(Reply::Done)
        );

        let overlays = surface.overlays();
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].cycle, Some(CycleId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_auto_dismiss_depends_on_mode() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        agent.endpoint().request(result(1, ScanMode::Enhanced)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(surface.overlays().len(), 1, "deep result outlives the quick timeout");

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(surface.overlays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_never_auto_dismisses() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        agent.endpoint().request(progress(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(surface.overlays().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_auto_dismiss() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        agent
            .endpoint()
            .request(Message::ShowError {
                message: "API Error: 502 - bad gateway".to_string(),
                cycle: None,
            })
            .await
            .unwrap();
        assert_eq!(surface.current().unwrap().kind(), OverlayKind::Error);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(surface.overlays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_timer_does_not_remove_newer_overlay() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        agent.endpoint().request(result(1, ScanMode::Quick)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        agent.endpoint().request(progress(2)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let current = surface.current().unwrap();
        assert_eq!(current.kind(), OverlayKind::Progress);
    }

    #[tokio::test]
    async fn test_close_and_backdrop_dismiss_but_panel_does_not() {
        let surface = MemorySurface::new();
        let agent = PageAgent::spawn(surface.clone(), settings());

        agent.endpoint().request(result(1, ScanMode::Quick)).await.unwrap();

        assert!(agent.click(ClickTarget::Panel));
        agent.endpoint().request(Message::Ping).await.unwrap();
        assert_eq!(surface.overlays().len(), 1);

        assert!(agent.click(ClickTarget::Backdrop));
        agent.endpoint().request(Message::Ping).await.unwrap();
        assert!(surface.overlays().is_empty());

        agent.endpoint().request(progress(2)).await.unwrap();
        assert!(agent.click(ClickTarget::CloseButton));
        agent.endpoint().request(Message::Ping).await.unwrap();
        assert!(surface.overlays().is_empty());
    }
}
