use super::view::{OverlayKind, OverlayView};
use crate::model::CycleId;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub type OverlayId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub id: OverlayId,
    pub cycle: Option<CycleId>,
    pub view: OverlayView,
}

impl Overlay {
    pub fn kind(&self) -> OverlayKind {
        self.view.kind()
    }
}

/// Where a user clicked on or around an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    CloseButton,
    /// The dimmed area around the panel.
    Backdrop,
    /// The panel itself. Never dismisses.
    Panel,
}

impl ClickTarget {
    pub fn dismisses(&self) -> bool {
        matches!(self, ClickTarget::CloseButton | ClickTarget::Backdrop)
    }
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface is detached: {0}")]
    Detached(String),
}

/// A page the agent can draw overlays on.
pub trait Surface: Send + Sync {
    fn mount(&self, overlay: Overlay) -> Result<(), SurfaceError>;

    fn unmount(&self, id: OverlayId) -> Option<Overlay>;

    fn mounted(&self) -> Vec<OverlayId>;
}

/// In-memory surface. Keeps every mounted overlay so callers can inspect
/// what a page currently shows.
#[derive(Debug, Default)]
pub struct MemorySurface {
    overlays: Mutex<Vec<Overlay>>,
    detached: Mutex<Option<String>>,
}

impl MemorySurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn overlays(&self) -> Vec<Overlay> {
        self.overlays.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn current(&self) -> Option<Overlay> {
        self.overlays().pop()
    }

    /// Simulates a page that no longer accepts DOM changes.
    pub fn detach(&self, reason: impl Into<String>) {
        if let Ok(mut detached) = self.detached.lock() {
            *detached = Some(reason.into());
        }
    }
}

impl Surface for MemorySurface {
    fn mount(&self, overlay: Overlay) -> Result<(), SurfaceError> {
        if let Some(reason) = self.detached.lock().ok().and_then(|d| d.clone()) {
            return Err(SurfaceError::Detached(reason));
        }
        if let Ok(mut overlays) = self.overlays.lock() {
            overlays.push(overlay);
        }
        Ok(())
    }

    fn unmount(&self, id: OverlayId) -> Option<Overlay> {
        let mut overlays = self.overlays.lock().ok()?;
        let pos = overlays.iter().position(|o| o.id == id)?;
        Some(overlays.remove(pos))
    }

    fn mounted(&self) -> Vec<OverlayId> {
        self.overlays
            .lock()
            .map(|o| o.iter().map(|overlay| overlay.id).collect())
            .unwrap_or_default()
    }
}
