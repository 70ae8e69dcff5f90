//! Optional callback hooks
//!
//! A hook is an event with at most one subscriber. Invoking an empty hook does nothing.

use std::fmt;

/// Single-subscriber callback slot
pub struct EventHook<T> {
    callback: Option<Box<dyn FnMut(&T)>>,
}

impl<T> EventHook<T> {
    /// Create an empty hook
    pub fn new() -> Self {
        Self { callback: None }
    }

    /// Install a callback, replacing any previous one
    pub fn set(&mut self, callback: impl FnMut(&T) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Remove the callback
    pub fn clear(&mut self) {
        self.callback = None;
    }

    /// Whether a callback is installed
    pub fn is_set(&self) -> bool {
        self.callback.is_some()
    }

    /// Call the callback if one is installed
    pub fn invoke(&mut self, value: &T) {
        if let Some(callback) = self.callback.as_mut() {
            callback(value);
        }
    }
}

impl<T> Default for EventHook<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHook").field("set", &self.is_set()).finish()
    }
}
