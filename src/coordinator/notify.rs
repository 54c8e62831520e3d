use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn api_unavailable() -> Self {
        Self {
            title: "LinkScanner API not available".to_string(),
            message: "Please start the scanner service (e.g. run \"docker-compose up\").".to_string(),
        }
    }
}

/// System notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log only.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        warn!("{}: {}", notification.title, notification.message);
    }
}
