use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::protocol::{decode_payload, EventKind};
use tracing::{debug, trace, warn};

type Callback = Box<dyn Fn(&Value) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    active: AtomicBool,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<Arc<ListenerEntry>>>,
}

/// In-process fan-out of decoded gateway events to listeners, keyed by event
/// type and invoked in registration order.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "dropping the disposer leaves no way to remove the listener"]
    pub fn register<F>(&self, kind: EventKind, listener: F) -> Disposer
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .listeners
            .entry(kind)
            .or_default()
            .push(Arc::new(ListenerEntry {
                id,
                active: AtomicBool::new(true),
                callback: Box::new(listener),
            }));

        Disposer {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
            disposed: AtomicBool::new(false),
        }
    }

    /// Registers a listener that receives the payload decoded as `T`. Payloads
    /// that do not decode are skipped for this listener only.
    #[must_use = "dropping the disposer leaves no way to remove the listener"]
    pub fn register_typed<T, F>(&self, kind: EventKind, listener: F) -> Disposer
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.register(kind, move |payload| match decode_payload::<T>(payload) {
            Ok(value) => listener(value),
            Err(err) => debug!(
                event = kind.as_str(),
                error = %err,
                "dispatcher: payload skipped by typed listener"
            ),
        })
    }

    /// Returns how many listeners ran.
    pub fn dispatch(&self, kind: EventKind, payload: &Value) -> usize {
        let listeners = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            match registry.listeners.get(&kind) {
                Some(listeners) => listeners.clone(),
                None => {
                    trace!(event = kind.as_str(), "dispatcher: no listeners, event dropped");
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        for entry in listeners {
            // A listener disposed earlier in this same dispatch must not run.
            if !entry.active.load(Ordering::SeqCst) {
                continue;
            }
            delivered += 1;
            if panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)(payload))).is_err() {
                warn!(
                    event = kind.as_str(),
                    listener = entry.id,
                    "dispatcher: listener panicked"
                );
            }
        }
        delivered
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.listeners.get(&kind).map_or(0, Vec::len)
    }
}

/// Removes exactly one listener. Calling `dispose` again is a no-op.
pub struct Disposer {
    registry: Weak<Mutex<Registry>>,
    kind: EventKind,
    id: u64,
    disposed: AtomicBool,
}

impl Disposer {
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(listeners) = registry.listeners.get_mut(&self.kind) {
            listeners.retain(|entry| {
                if entry.id == self.id {
                    entry.active.store(false, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            });
            if listeners.is_empty() {
                registry.listeners.remove(&self.kind);
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
