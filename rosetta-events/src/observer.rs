//! Boolean (or any comparable) state observers.
//!
//! The cache calls [`ValueObserver::notify`] before and after every load
//! batch. An observer recomputes its value and publishes only on change.

use std::sync::{Mutex, PoisonError};

use crate::{EventEmitter, Listener};

/// Recompute trigger.
pub trait ValueObserver: Send + Sync {
    fn notify(&self);
}

/// Observer that ignores notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ValueObserver for NoopObserver {
    fn notify(&self) {}
}

type Getter<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Observer holding the last computed value.
pub struct StateObserver<T> {
    value: Mutex<T>,
    getter: Getter<T>,
    changes: EventEmitter<T>,
}

impl<T> StateObserver<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new<F>(initial: T, getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            value: Mutex::new(initial),
            getter: Box::new(getter),
            changes: EventEmitter::new(),
        }
    }

    /// The last computed value.
    pub fn value(&self) -> T {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to value changes.
    pub fn listen<F>(&self, handler: F) -> Listener
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.changes.listen(handler)
    }
}

impl<T> ValueObserver for StateObserver<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn notify(&self) {
        let next = (self.getter)();
        let changed = {
            let mut current = self.value.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        };
        if changed {
            tracing::trace!("observed state changed");
            self.changes.emit(&next);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StateObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateObserver")
            .field("value", &self.value)
            .finish()
    }
}
