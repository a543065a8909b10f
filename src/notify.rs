//! Transient user-facing notifications ("toasts")

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success<T: Into<String>, M: fmt::Display>(title: T, message: M) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            message: message.to_string(),
        }
    }

    pub fn info<T: Into<String>, M: fmt::Display>(title: T, message: M) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.to_string(),
        }
    }

    pub fn error<T: Into<String>, M: fmt::Display>(title: T, message: M) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.to_string(),
        }
    }
}

/// Receives notifications raised by the stores
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => {
                tracing::warn!(title = %notification.title, "{}", notification.message)
            }
            _ => tracing::info!(title = %notification.title, "{}", notification.message),
        }
    }
}

/// Collects notifications until a UI (or a test) drains them
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: Mutex<VecDeque<Notification>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NotificationQueue {
    fn notify(&self, notification: Notification) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order() {
        let queue = NotificationQueue::new();
        queue.notify(Notification::success("Saved", "Item added"));
        queue.notify(Notification::error("Failed", "Network down"));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained[0].level, NotificationLevel::Success);
        assert_eq!(drained[1].message, "Network down");
        assert!(queue.is_empty());
    }
}
