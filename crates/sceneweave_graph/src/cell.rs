// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observable values and change signals.
//!
//! Listeners are registered with [`Signal::subscribe`] and stay registered for
//! as long as the returned [`Subscription`] is alive. Notification is
//! synchronous and runs in subscription order.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

struct ListenerList<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// A list of listeners notified whenever a value is emitted.
pub struct Signal<T> {
    listeners: Rc<RefCell<ListenerList<T>>>,
}

impl<T: 'static> Signal<T> {
    /// Create a signal with no listeners
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(ListenerList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a listener. It is removed when the returned token is dropped.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut list = self.listeners.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, Rc::new(listener)));
            id
        };

        let list: Weak<RefCell<ListenerList<T>>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(list) = list.upgrade() {
                list.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Notify every listener registered at the time of the call
    pub fn emit(&self, value: &T) {
        // Listeners may subscribe or unsubscribe while being notified.
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(value);
        }
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.borrow().entries.len())
            .finish()
    }
}

/// Registration token for a listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Keep the listener registered for the lifetime of the signal
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A single mutable attribute that notifies listeners when it changes.
pub struct ObservableCell<T> {
    value: T,
    changed: Signal<T>,
}

impl<T: Clone + PartialEq + 'static> ObservableCell<T> {
    /// Create a cell holding `value`
    pub fn new(value: T) -> Self {
        Self {
            value,
            changed: Signal::new(),
        }
    }

    /// Current value
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Store a new value, notifying listeners only if it differs.
    ///
    /// Returns whether the value changed.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.changed.emit(&self.value);
        true
    }

    /// Listen for changes to the value
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.changed.subscribe(listener)
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.changed.listener_count()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCell")
            .field("value", &self.value)
            .field("changed", &self.changed)
            .finish()
    }
}
