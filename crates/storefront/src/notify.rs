//! User-facing notifications ("toasts").
//!
//! Components never print; they push a [`Notification`] into the channel and
//! whichever front end owns the receiver decides how to show it.

use std::fmt;

use tokio::sync::mpsc;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        })
    }
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Sending half of the notification channel.
///
/// Cloning is cheap. Sending never fails: if the receiver is gone the
/// notification is only logged.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

/// Receiving half of the notification channel.
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

impl Notifier {
    /// Create a connected notifier/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, NotificationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push a notification.
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%level, %message, "notification");
        if self.tx.send(Notification { level, message }).is_err() {
            tracing::trace!("notification receiver dropped");
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// Drain every notification currently queued without waiting.
pub fn drain(rx: &mut NotificationReceiver) -> Vec<Notification> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
