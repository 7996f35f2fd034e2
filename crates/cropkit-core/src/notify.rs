//! A shared, observable notification slot.
//!
//! One [`NotificationCenter`] is created by the host and cloned into every
//! component that reports to the user. Clones share the same state. Writers
//! call [`publish`](NotificationCenter::publish); readers either poll
//! [`current`](NotificationCenter::current) or subscribe.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

/// Handle returned by [`NotificationCenter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener = Rc<dyn Fn(&Notification)>;

#[derive(Default)]
struct State {
    current: Option<Notification>,
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Cheap-clone handle to a single notification state.
///
/// Single-threaded: the state lives behind `Rc<RefCell<_>>`.
#[derive(Clone, Default)]
pub struct NotificationCenter {
    inner: Rc<RefCell<State>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current notification and notify every subscriber.
    ///
    /// Listeners run after the internal borrow is released, so they may
    /// publish or unsubscribe themselves.
    pub fn publish(&self, notification: Notification) {
        log::debug!(
            "notification ({:?}): {}",
            notification.severity,
            notification.message
        );
        let listeners: Vec<Listener> = {
            let mut state = self.inner.borrow_mut();
            state.current = Some(notification.clone());
            state.listeners.iter().map(|(_, l)| Rc::clone(l)).collect()
        };
        for listener in listeners {
            listener(&notification);
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&Notification) + 'static) -> Subscription {
        let mut state = self.inner.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, Rc::new(listener)));
        Subscription(id)
    }

    /// Returns false if the subscription was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut state = self.inner.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|(id, _)| *id != subscription.0);
        state.listeners.len() != before
    }

    pub fn current(&self) -> Option<Notification> {
        self.inner.borrow().current.clone()
    }

    /// Dismiss the current notification without notifying subscribers.
    pub fn clear(&self) {
        self.inner.borrow_mut().current = None;
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("NotificationCenter")
            .field("current", &state.current)
            .field("subscribers", &state.listeners.len())
            .finish()
    }
}
