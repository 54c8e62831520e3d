//! A [`Surface`] that draws overlays on the terminal.
//!
//! Progress overlays become a spinner on stderr; result and error overlays
//! are printed to stdout in the chosen format.

use super::{render_overlay, OutputFormat};
use crate::agent::{Overlay, OverlayId, OverlayKind, Surface, SurfaceError};
use crate::coordinator::{Notification, Notifier};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct TerminalSurface {
    format: OutputFormat,
    interactive: bool,
    mounted: Mutex<Vec<OverlayId>>,
    spinner: Mutex<Option<(OverlayId, ProgressBar)>>,
}

impl TerminalSurface {
    pub fn new(format: OutputFormat, interactive: bool) -> Arc<Self> {
        Arc::new(Self {
            format,
            interactive,
            mounted: Mutex::new(Vec::new()),
            spinner: Mutex::new(None),
        })
    }

    fn start_spinner(&self, id: OverlayId, message: String) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(message);

        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some((_, previous)) = spinner.replace((id, pb)) {
                previous.finish_and_clear();
            }
        }
    }

    fn stop_spinner(&self, id: Option<OverlayId>) {
        if let Ok(mut spinner) = self.spinner.lock() {
            let matches = match (&*spinner, id) {
                (Some((current, _)), Some(id)) => *current == id,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if matches {
                if let Some((_, pb)) = spinner.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }
}

impl Surface for TerminalSurface {
    fn mount(&self, overlay: Overlay) -> Result<(), SurfaceError> {
        match overlay.kind() {
            OverlayKind::Progress if self.interactive => {
                let message = render_overlay(&overlay.view, OutputFormat::Text)
                    .lines()
                    .take(2)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.start_spinner(overlay.id, message);
            }
            OverlayKind::Progress => {}
            OverlayKind::Result | OverlayKind::Error => {
                self.stop_spinner(None);
                println!("{}", render_overlay(&overlay.view, self.format));
            }
        }

        if let Ok(mut mounted) = self.mounted.lock() {
            mounted.push(overlay.id);
        }
        Ok(())
    }

    fn unmount(&self, id: OverlayId) -> Option<Overlay> {
        self.stop_spinner(Some(id));
        if let Ok(mut mounted) = self.mounted.lock() {
            mounted.retain(|m| *m != id);
        }
        // Printed output cannot be taken back, so nothing is returned.
        None
    }

    fn mounted(&self) -> Vec<OverlayId> {
        self.mounted.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// Prints notifications to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!(
            "\x1b[33m{}\x1b[0m\n{}",
            notification.title, notification.message
        );
    }
}
