//! Typed, in-process event emitter keyed by event type.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Subscription handle returned by [`EventEmitter::on`] and [`EventEmitter::once`].
pub type HandlerId = u64;

/// What a handler receives.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<T> {
    pub kind: String,
    pub data: Option<T>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Set when the handler being called was registered with `once`.
    pub once: bool,
}

type Handler<T> = Arc<dyn Fn(&Event<T>) + Send + Sync>;

struct Entry<T> {
    id: HandlerId,
    handler: Handler<T>,
    once: bool,
}

pub struct EventEmitter<T> {
    handlers: Arc<Mutex<HashMap<String, Vec<Entry<T>>>>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        EventEmitter {
            handlers: self.handlers.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        EventEmitter {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe<F>(&self, kind: &str, handler: F, once: bool) -> Option<HandlerId>
    where
        F: Fn(&Event<T>) + Send + Sync + 'static,
    {
        if kind.is_empty() {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind.to_string())
            .or_default()
            .push(Entry {
                id,
                handler: Arc::new(handler),
                once,
            });
        Some(id)
    }

    /// Call `handler` on every `kind` event. `None` for an empty event type.
    pub fn on<F>(&self, kind: &str, handler: F) -> Option<HandlerId>
    where
        F: Fn(&Event<T>) + Send + Sync + 'static,
    {
        self.subscribe(kind, handler, false)
    }

    /// Call `handler` on the next `kind` event only.
    pub fn once<F>(&self, kind: &str, handler: F) -> Option<HandlerId>
    where
        F: Fn(&Event<T>) + Send + Sync + 'static,
    {
        self.subscribe(kind, handler, true)
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn off(&self, kind: &str, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != id);
        before != list.len()
    }

    pub fn off_type(&self, kind: &str) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(kind);
    }

    pub fn off_all(&self) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn handler_count(&self, kind: &str) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to every `kind` handler in subscription order; returns how many were called.
    /// Handlers run outside the lock and may subscribe or unsubscribe.
    pub fn fire(&self, kind: &str, data: Option<T>) -> usize {
        if kind.is_empty() {
            return 0;
        }
        let called: Vec<(Handler<T>, bool)> = {
            let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(list) = handlers.get_mut(kind) else {
                return 0;
            };
            let called = list.iter().map(|e| (e.handler.clone(), e.once)).collect();
            list.retain(|e| !e.once);
            called
        };
        let mut event = Event {
            kind: kind.to_string(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
            once: false,
        };
        for (handler, once) in &called {
            event.once = *once;
            handler(&event);
        }
        called.len()
    }
}
