//! Listener registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler<T>)>>,
}

/// Publish/subscribe emitter.
///
/// Handlers run synchronously on [`EventEmitter::emit`] in registration
/// order. The registry lock is released before handlers are called, so a
/// handler may listen or unsubscribe re-entrantly.
pub struct EventEmitter<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(0),
                handlers: RwLock::new(Vec::new()),
            }),
        }
    }
}

impl<T> std::fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call every registered handler with `value`.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Handler<T>> = self
            .registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T: 'static> EventEmitter<T> {
    /// Register a handler.
    pub fn listen<F>(&self, handler: F) -> Listener
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));

        let weak: Weak<Registry<T>> = Arc::downgrade(&self.registry);
        Listener {
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry
                        .handlers
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }
}

/// Subscription handle returned by [`EventEmitter::listen`].
///
/// Dropping the handle keeps the subscription; call [`Listener::unsubscribe`]
/// to remove it.
pub struct Listener {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Listener {
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
