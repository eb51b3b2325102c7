//! Single-subscriber "unauthorized" notification slot.

use parking_lot::Mutex;
use std::sync::Arc;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Observer slot fired when a refresh cycle fails and the session is dropped.
///
/// Holds at most one subscriber. Registering replaces the previous one.
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct UnauthorizedHook {
    slot: Arc<Mutex<Option<Callback>>>,
}

impl UnauthorizedHook {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`, replacing any previous subscriber.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.slot.lock() = Some(Arc::new(callback));
    }

    /// Remove the subscriber.
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    /// Whether a subscriber is registered.
    pub fn is_registered(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Invoke the subscriber, if any. Returns whether one was invoked.
    pub(crate) fn notify(&self) -> bool {
        // Called outside the lock so the callback may re-register.
        let callback = self.slot.lock().clone();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for UnauthorizedHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnauthorizedHook")
            .field("registered", &self.is_registered())
            .finish()
    }
}
