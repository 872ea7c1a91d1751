//! Transient user notifications

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// A short notification shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    /// Headline
    pub title: String,
    /// Body text
    pub description: String,
}

impl Toast {
    /// Create a toast
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Sink for toasts
pub trait Notifier: Send + Sync {
    /// Show a toast
    fn notify(&self, toast: Toast);
}

/// Forwards toasts into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Toast>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, toast: Toast) {
        if self.tx.send(toast).is_err() {
            debug!("toast receiver dropped");
        }
    }
}

/// Writes toasts to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        info!(title = %toast.title, description = %toast.description, "notification");
    }
}
