//! Cache change notifications.

use rosetta_core::CacheDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::EventEmitter;

/// A record or a single key of a record changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheChange {
    pub descriptor: CacheDescriptor,
    /// Set when one key was edited in place; `None` for whole-record writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl CacheChange {
    /// A whole record was (re)written.
    pub fn record(descriptor: CacheDescriptor) -> Self {
        Self {
            descriptor,
            key: None,
        }
    }

    /// One key of a record was edited.
    pub fn key(descriptor: CacheDescriptor, key: impl Into<String>) -> Self {
        Self {
            descriptor,
            key: Some(key.into()),
        }
    }
}

/// Sink the cache notifies synchronously after each mutation.
pub trait CacheChangeSink: Send + Sync {
    fn emit(&self, change: &CacheChange);
}

impl CacheChangeSink for EventEmitter<CacheChange> {
    fn emit(&self, change: &CacheChange) {
        EventEmitter::emit(self, change);
    }
}

/// Sink that drops every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl CacheChangeSink for NoopSink {
    fn emit(&self, _change: &CacheChange) {}
}

/// Selective subscription over namespaces and keys.
///
/// An empty set matches everything on that axis. Whole-record changes match
/// any key filter, since every key of the record may have changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyUpdateFilter {
    namespaces: HashSet<String>,
    keys: HashSet<String>,
}

impl KeyUpdateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_ns(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.insert(namespace.into());
        self
    }

    pub fn subscribe_key(mut self, key: impl Into<String>) -> Self {
        self.keys.insert(key.into());
        self
    }

    pub fn unsubscribe_key(mut self, key: &str) -> Self {
        self.keys.remove(key);
        self
    }

    pub fn matches(&self, change: &CacheChange) -> bool {
        let ns_ok =
            self.namespaces.is_empty() || self.namespaces.contains(&change.descriptor.namespace);
        let key_ok = match &change.key {
            None => true,
            Some(key) => self.keys.is_empty() || self.keys.contains(key),
        };
        ns_ok && key_ok
    }
}

impl EventEmitter<CacheChange> {
    /// Listen only to changes accepted by `filter`.
    pub fn listen_filtered<F>(&self, filter: KeyUpdateFilter, handler: F) -> crate::Listener
    where
        F: Fn(&CacheChange) + Send + Sync + 'static,
    {
        self.listen(move |change| {
            if filter.matches(change) {
                handler(change);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn en(ns: &str) -> CacheDescriptor {
        CacheDescriptor::new("en", ns)
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = KeyUpdateFilter::new();
        assert!(filter.matches(&CacheChange::record(en(""))));
        assert!(filter.matches(&CacheChange::key(en("menu"), "open")));
    }

    #[test]
    fn test_namespace_filter() {
        let filter = KeyUpdateFilter::new().subscribe_ns("menu");
        assert!(filter.matches(&CacheChange::record(en("menu"))));
        assert!(!filter.matches(&CacheChange::record(en("common"))));
    }

    #[test]
    fn test_key_filter_and_record_change() {
        let filter = KeyUpdateFilter::new().subscribe_key("title");
        assert!(filter.matches(&CacheChange::key(en(""), "title")));
        assert!(!filter.matches(&CacheChange::key(en(""), "subtitle")));
        assert!(filter.matches(&CacheChange::record(en(""))));
    }

    #[test]
    fn test_unsubscribe_key_widens_filter() {
        let filter = KeyUpdateFilter::new()
            .subscribe_key("a")
            .unsubscribe_key("a");
        assert!(filter.matches(&CacheChange::key(en(""), "b")));
    }

    #[test]
    fn test_listen_filtered() {
        let emitter = EventEmitter::<CacheChange>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _l = emitter.listen_filtered(KeyUpdateFilter::new().subscribe_ns("menu"), move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        CacheChangeSink::emit(&emitter, &CacheChange::record(en("menu")));
        CacheChangeSink::emit(&emitter, &CacheChange::record(en("other")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_change_serde_omits_missing_key() {
        let json = serde_json::to_string(&CacheChange::record(en("menu"))).unwrap();
        assert_eq!(json, r#"{"descriptor":{"language":"en","namespace":"menu"}}"#);
    }
}
