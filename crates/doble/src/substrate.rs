//! Backing storage for auto-tracked properties and events.
//!
//! The mock records `get_X`/`set_X`/`add_X`/`remove_X` invocations around
//! these stores; the stores themselves only hold state.

use crate::result::InjectedFault;
use crate::value::{EventHandler, Value};
use std::collections::HashMap;

/// Current values of auto-tracked properties
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    slots: HashMap<String, Value>,
}

impl PropertyStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or reseed) a slot
    pub fn track(&mut self, name: &str, initial: Value) {
        self.slots.insert(name.to_string(), initial);
    }

    /// Whether `name` is auto-tracked
    #[must_use]
    pub fn is_tracked(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Current value of a tracked slot
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Overwrite a tracked slot; returns `false` if `name` is not tracked
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.slots.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Forget every slot
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Subscriber lists per event
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    subscribers: HashMap<String, Vec<EventHandler>>,
}

impl EventRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber
    pub fn subscribe(&mut self, event: &str, handler: EventHandler) {
        self.subscribers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove the first subscription identical to `handler`
    pub fn unsubscribe(&mut self, event: &str, handler: &EventHandler) -> bool {
        let Some(handlers) = self.subscribers.get_mut(event) else {
            return false;
        };
        match handlers.iter().position(|h| h.ptr_eq(handler)) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Snapshot of current subscribers in subscription order
    #[must_use]
    pub fn subscribers(&self, event: &str) -> Vec<EventHandler> {
        self.subscribers.get(event).cloned().unwrap_or_default()
    }

    /// Number of subscribers for `event`
    #[must_use]
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers.get(event).map_or(0, Vec::len)
    }

    /// Forget every subscription
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

/// Invoke handlers in order, stopping at the first failure
///
/// The failing handler's own fault is returned unchanged.
pub fn dispatch(handlers: &[EventHandler], args: &[Value]) -> Result<(), InjectedFault> {
    handlers.iter().try_for_each(|handler| handler.call(args))
}
