//! The record cache.
//!
//! One [`RecordCache`] is owned per client. It holds flattened records keyed
//! by [`CacheKey`], each stamped with the [`Epoch`] it was written at, plus
//! the static data registry and the in-flight fetch map used by
//! [`RecordCache::load_records`].
//!
//! All state sits behind one `RwLock` that is only held inside synchronous
//! sections. Change events and observer notifications are delivered after
//! the lock is released, so handlers may call back into the cache.

use rosetta_core::{
    flatten, CacheConfig, CacheDescriptor, CacheKey, DescriptorRequest, Epoch, FallbackList,
    FlatTranslations, RecordExport, TranslationValue, TreeTranslations,
};
use rosetta_events::{CacheChange, CacheChangeSink, NoopObserver, NoopSink, ValueObserver};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::{DevRecordBackend, RecordBackend};
use crate::freshness::{Freshness, RecordRead};
use crate::loader::{FetchSources, FetchToken, InFlight};
use crate::resolver::{find_namespace, find_value, NsLookup};
use crate::static_data::{StaticData, StaticEntry};

/// A stored record.
#[derive(Debug, Clone)]
pub(crate) struct CacheRecord {
    pub(crate) version: Epoch,
    pub(crate) data: Arc<FlatTranslations>,
}

pub(crate) struct CacheState {
    pub(crate) records: HashMap<CacheKey, CacheRecord>,
    pub(crate) in_flight: HashMap<CacheKey, InFlight>,
    pub(crate) static_data: StaticData,
    pub(crate) epoch: Epoch,
    next_token: u64,
}

impl CacheState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            in_flight: HashMap::new(),
            static_data: StaticData::new(),
            epoch: Epoch::BOOTSTRAP,
            next_token: 0,
        }
    }

    pub(crate) fn issue_token(&mut self) -> FetchToken {
        let token = FetchToken::new(self.next_token);
        self.next_token += 1;
        token
    }

    /// Store `data` under `key` at the current epoch.
    pub(crate) fn put(&mut self, key: CacheKey, data: FlatTranslations) {
        let version = self.epoch;
        self.records.insert(
            key,
            CacheRecord {
                version,
                data: Arc::new(data),
            },
        );
    }
}

type InitialLoadingFn = dyn Fn() -> bool + Send + Sync;

/// Versioned translation record cache.
pub struct RecordCache {
    pub(crate) config: CacheConfig,
    state: RwLock<CacheState>,
    pub(crate) sources: Arc<FetchSources>,
    on_change: Arc<dyn CacheChangeSink>,
    fetching_observer: Arc<dyn ValueObserver>,
    loading_observer: Arc<dyn ValueObserver>,
    initial_loading: Arc<InitialLoadingFn>,
}

impl RecordCache {
    /// Create an empty cache with no backends and no-op collaborators.
    pub fn new(config: CacheConfig) -> Self {
        let sources = FetchSources {
            dev_props: config.dev.clone(),
            ..FetchSources::default()
        };
        Self {
            config,
            state: RwLock::new(CacheState::new()),
            sources: Arc::new(sources),
            on_change: Arc::new(NoopSink),
            fetching_observer: Arc::new(NoopObserver),
            loading_observer: Arc::new(NoopObserver),
            initial_loading: Arc::new(|| false),
        }
    }

    /// Append a record backend. Backends are asked in insertion order.
    pub fn with_backend<B>(mut self, backend: B) -> Self
    where
        B: RecordBackend + 'static,
    {
        Arc::make_mut(&mut self.sources)
            .backends
            .push(Arc::new(backend));
        self
    }

    /// Set the dev-server backend used by dev loads.
    pub fn with_dev_backend<B>(mut self, backend: B) -> Self
    where
        B: DevRecordBackend + 'static,
    {
        Arc::make_mut(&mut self.sources).dev_backend = Some(Arc::new(backend));
        self
    }

    pub fn with_change_sink(mut self, sink: Arc<dyn CacheChangeSink>) -> Self {
        self.on_change = sink;
        self
    }

    pub fn with_fetching_observer(mut self, observer: Arc<dyn ValueObserver>) -> Self {
        self.fetching_observer = observer;
        self
    }

    pub fn with_loading_observer(mut self, observer: Arc<dyn ValueObserver>) -> Self {
        self.loading_observer = observer;
        self
    }

    /// Probe for the client's initial-loading phase.
    ///
    /// While it returns `true`, [`is_fetching`](Self::is_fetching) and
    /// [`is_loading`](Self::is_loading) report `true`.
    pub fn with_initial_loading<F>(mut self, probe: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.initial_loading = Arc::new(probe);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Merge static data into the registry.
    ///
    /// Literal entries are installed at [`Epoch::BOOTSTRAP`] unless a fetched
    /// record already occupies the key. Lazy entries are only registered.
    pub fn add_static_data(&self, data: StaticData) {
        let literals: Vec<(CacheKey, FlatTranslations)> = data
            .iter()
            .filter_map(|(key, entry)| match entry {
                StaticEntry::Literal(tree) => Some((key.clone(), flatten(tree))),
                StaticEntry::Lazy(_) => None,
            })
            .collect();

        let mut installed = Vec::new();
        {
            let mut state = self.write();
            for (key, flat) in literals {
                let seeded = state
                    .records
                    .get(&key)
                    .map_or(true, |record| record.version.is_bootstrap());
                if seeded {
                    installed.push(key.descriptor());
                    state.records.insert(
                        key,
                        CacheRecord {
                            version: Epoch::BOOTSTRAP,
                            data: Arc::new(flat),
                        },
                    );
                } else {
                    tracing::debug!(key = %key, "Keeping fetched record over static data");
                }
            }
            state.static_data.merge(data);
        }

        for descriptor in installed {
            tracing::debug!(descriptor = %descriptor, "Installed static record");
            self.on_change.emit(&CacheChange::record(descriptor));
        }
    }

    /// Drop all in-flight fetches and advance the epoch.
    ///
    /// Cached records stay readable; they are simply no longer strict-fresh.
    pub fn invalidate(&self) {
        let epoch = {
            let mut state = self.write();
            state.in_flight.clear();
            state.epoch = state.epoch.next();
            state.epoch
        };
        tracing::debug!(epoch = %epoch, "Cache invalidated");
    }

    /// Flatten `tree` and store it at the current epoch.
    pub fn add_record(&self, descriptor: &CacheDescriptor, tree: &TreeTranslations) {
        let flat = flatten(tree);
        self.write().put(CacheKey::encode(descriptor), flat);
        self.on_change.emit(&CacheChange::record(descriptor.clone()));
    }

    /// Edit one key of an existing record in place.
    ///
    /// The record's version is unchanged. A change event is emitted even when
    /// the record is absent.
    pub fn change_translation(&self, descriptor: &CacheDescriptor, key: &str, value: TranslationValue) {
        {
            let mut state = self.write();
            if let Some(record) = state.records.get_mut(&CacheKey::encode(descriptor)) {
                Arc::make_mut(&mut record.data).insert(key.to_string(), value);
            }
        }
        self.on_change.emit(&CacheChange::key(descriptor.clone(), key));
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn exists(&self, descriptor: &CacheDescriptor, freshness: Freshness) -> bool {
        let state = self.read();
        state
            .records
            .get(&CacheKey::encode(descriptor))
            .is_some_and(|record| freshness.accepts(record.version, state.epoch))
    }

    /// Read a record with its version. `None` when absent or, for strict
    /// reads, stale.
    pub fn read_record(&self, descriptor: &CacheDescriptor, freshness: Freshness) -> Option<RecordRead> {
        let state = self.read();
        let record = state.records.get(&CacheKey::encode(descriptor))?;
        if !freshness.accepts(record.version, state.epoch) {
            return None;
        }
        Some(RecordRead::new(
            Arc::clone(&record.data),
            record.version,
            state.epoch,
        ))
    }

    /// Record data for a request, filling in the default namespace.
    pub fn get_record(&self, request: &DescriptorRequest) -> Option<Arc<FlatTranslations>> {
        let descriptor = request.with_default_ns(&self.config.default_ns);
        self.record_data(&CacheKey::encode(&descriptor))
    }

    pub(crate) fn record_data(&self, key: &CacheKey) -> Option<Arc<FlatTranslations>> {
        self.read()
            .records
            .get(key)
            .map(|record| Arc::clone(&record.data))
    }

    /// The stored value for `key`. The outer `None` means the key (or the
    /// whole record) is absent; `Some(None)` is an explicit null.
    pub fn get_translation(&self, descriptor: &CacheDescriptor, key: &str) -> Option<TranslationValue> {
        self.read()
            .records
            .get(&CacheKey::encode(descriptor))
            .and_then(|record| record.data.get(key).cloned())
    }

    /// First namespace holding a usable value for `key`, or every searched
    /// namespace when none does.
    pub fn get_translation_ns(&self, namespaces: &[String], languages: &[String], key: &str) -> NsLookup {
        find_namespace(&self.read().records, namespaces, languages, key)
    }

    /// First usable value for `key` across `namespaces` x `languages`.
    pub fn get_translation_fallback(
        &self,
        namespaces: &[String],
        languages: &[String],
        key: &str,
    ) -> Option<String> {
        find_value(&self.read().records, namespaces, languages, key)
    }

    /// Whether anything matching `ns` is being fetched.
    ///
    /// `FallbackList::None` matches any in-flight fetch.
    pub fn is_fetching(&self, ns: &FallbackList) -> bool {
        if (self.initial_loading)() {
            return true;
        }
        let state = self.read();
        match ns {
            FallbackList::None => !state.in_flight.is_empty(),
            _ => {
                let namespaces = ns.to_vec();
                state
                    .in_flight
                    .keys()
                    .any(|key| namespaces.contains(&key.descriptor().namespace))
            }
        }
    }

    /// Whether `language` is waiting on a fetch for data it has none of yet.
    ///
    /// An empty `ns` matches every namespace.
    pub fn is_loading(&self, language: &str, ns: &FallbackList) -> bool {
        if (self.initial_loading)() {
            return true;
        }
        let namespaces = ns.to_vec();
        let state = self.read();
        let mut probe = String::new();
        state.in_flight.keys().any(|key| {
            let descriptor = key.descriptor();
            if !namespaces.is_empty() && !namespaces.contains(&descriptor.namespace) {
                return false;
            }
            CacheKey::write_encoded(language, &descriptor.namespace, &mut probe);
            !state.records.contains_key(probe.as_str())
        })
    }

    /// Export every record, sorted by key.
    pub fn get_all_records(&self) -> Vec<RecordExport> {
        let state = self.read();
        let mut entries: Vec<_> = state.records.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(key, record)| {
                let descriptor = key.descriptor();
                RecordExport {
                    language: descriptor.language,
                    namespace: descriptor.namespace,
                    data: Arc::clone(&record.data),
                }
            })
            .collect()
    }

    pub fn epoch(&self) -> Epoch {
        self.read().epoch
    }

    pub fn record_count(&self) -> usize {
        self.read().records.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.read().in_flight.len()
    }

    /// Keys registered as static data, literal or lazy.
    pub fn static_data_keys(&self) -> Vec<CacheKey> {
        self.read().static_data.keys().cloned().collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    pub(crate) fn notify_observers(&self) {
        self.fetching_observer.notify();
        self.loading_observer.notify();
    }

    pub(crate) fn emit(&self, change: &CacheChange) {
        self.on_change.emit(change);
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("RecordCache")
            .field("epoch", &state.epoch)
            .field("records", &state.records.len())
            .field("in_flight", &state.in_flight.len())
            .field("static_data", &state.static_data.len())
            .field("backends", &self.sources.backends.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosetta_core::parse_tree_str;
    use rosetta_events::EventEmitter;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn tree(json: &str) -> TreeTranslations {
        parse_tree_str(json).unwrap()
    }

    fn en() -> CacheDescriptor {
        CacheDescriptor::default_ns("en")
    }

    fn recording_cache() -> (RecordCache, Arc<Mutex<Vec<CacheChange>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let emitter = EventEmitter::<CacheChange>::new();
        let sink = Arc::clone(&seen);
        let _listener = emitter.listen(move |change: &CacheChange| {
            sink.lock().unwrap().push(change.clone());
        });
        let cache = RecordCache::new(CacheConfig::new()).with_change_sink(Arc::new(emitter));
        (cache, seen)
    }

    #[test]
    fn test_add_record_flattens_and_emits() {
        let (cache, seen) = recording_cache();
        cache.add_record(&en(), &tree(r#"{"greet":{"formal":"Good day"}}"#));

        assert_eq!(
            cache.get_translation(&en(), "greet.formal"),
            Some(Some("Good day".to_string()))
        );
        assert_eq!(seen.lock().unwrap().as_slice(), &[CacheChange::record(en())]);
    }

    #[test]
    fn test_get_translation_distinguishes_null_from_absent() {
        let cache = RecordCache::new(CacheConfig::new());
        cache.add_record(&en(), &tree(r#"{"empty":null}"#));

        assert_eq!(cache.get_translation(&en(), "empty"), Some(None));
        assert_eq!(cache.get_translation(&en(), "missing"), None);
        assert_eq!(cache.get_translation(&CacheDescriptor::default_ns("de"), "empty"), None);
    }

    #[test]
    fn test_exists_strict_after_invalidate() {
        let cache = RecordCache::new(CacheConfig::new());
        cache.invalidate();
        cache.add_record(&en(), &tree(r#"{"a":"b"}"#));
        assert!(cache.exists(&en(), Freshness::Strict));

        cache.invalidate();
        assert!(cache.exists(&en(), Freshness::BestEffort));
        assert!(!cache.exists(&en(), Freshness::Strict));
        assert!(cache.read_record(&en(), Freshness::Strict).is_none());

        let stale = cache.read_record(&en(), Freshness::BestEffort).unwrap();
        assert!(!stale.is_fresh());
        assert_eq!(stale.version(), Epoch::new(1));
    }

    #[test]
    fn test_static_literal_installed_at_bootstrap() {
        let (cache, seen) = recording_cache();
        cache.add_static_data(StaticData::new().literal("en", tree(r#"{"hello":"world"}"#)));

        let read = cache.read_record(&en(), Freshness::BestEffort).unwrap();
        assert!(read.is_bootstrap());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_static_literal_does_not_overwrite_fetched_record() {
        let (cache, seen) = recording_cache();
        cache.invalidate();
        cache.add_record(&en(), &tree(r#"{"hello":"fetched"}"#));
        cache.add_static_data(StaticData::new().literal("en", tree(r#"{"hello":"static"}"#)));

        assert_eq!(
            cache.get_translation(&en(), "hello"),
            Some(Some("fetched".to_string()))
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_static_literal_refreshes_bootstrap_slot() {
        let cache = RecordCache::new(CacheConfig::new());
        cache.add_static_data(StaticData::new().literal("en", tree(r#"{"v":"1"}"#)));
        cache.add_static_data(StaticData::new().literal("en", tree(r#"{"v":"2"}"#)));
        assert_eq!(cache.get_translation(&en(), "v"), Some(Some("2".to_string())));
    }

    #[test]
    fn test_lazy_static_is_registered_only() {
        let (cache, seen) = recording_cache();
        cache.add_static_data(
            StaticData::new().lazy("de:menu", || async { Ok(TreeTranslations::new()) }),
        );
        assert_eq!(cache.record_count(), 0);
        assert_eq!(cache.static_data_keys().len(), 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_change_translation_edits_in_place() {
        let (cache, seen) = recording_cache();
        cache.add_record(&en(), &tree(r#"{"a":"old"}"#));
        let before = cache.read_record(&en(), Freshness::BestEffort).unwrap().version();

        cache.change_translation(&en(), "a", Some("new".to_string()));

        assert_eq!(cache.get_translation(&en(), "a"), Some(Some("new".to_string())));
        assert_eq!(cache.read_record(&en(), Freshness::BestEffort).unwrap().version(), before);
        assert_eq!(seen.lock().unwrap().last(), Some(&CacheChange::key(en(), "a")));
    }

    #[test]
    fn test_change_translation_absent_record_still_emits() {
        let (cache, seen) = recording_cache();
        cache.change_translation(&en(), "a", Some("x".to_string()));

        assert_eq!(cache.record_count(), 0);
        assert_eq!(seen.lock().unwrap().as_slice(), &[CacheChange::key(en(), "a")]);
    }

    #[test]
    fn test_snapshot_survives_in_place_edit() {
        let cache = RecordCache::new(CacheConfig::new());
        cache.add_record(&en(), &tree(r#"{"a":"old"}"#));
        let snapshot = cache.get_record(&DescriptorRequest::language("en")).unwrap();

        cache.change_translation(&en(), "a", Some("new".to_string()));

        assert_eq!(snapshot.get("a"), Some(&Some("old".to_string())));
    }

    #[test]
    fn test_get_record_uses_default_namespace() {
        let cache = RecordCache::new(CacheConfig::new().with_default_ns("common"));
        cache.add_record(&CacheDescriptor::new("en", "common"), &tree(r#"{"a":"b"}"#));

        assert!(cache.get_record(&DescriptorRequest::language("en")).is_some());
        assert!(cache
            .get_record(&DescriptorRequest::with_namespace("en", ""))
            .is_none());
    }

    #[test]
    fn test_get_all_records_sorted() {
        let cache = RecordCache::new(CacheConfig::new());
        cache.add_record(&CacheDescriptor::new("en", "b"), &TreeTranslations::new());
        cache.add_record(&CacheDescriptor::default_ns("de"), &TreeTranslations::new());
        cache.add_record(&CacheDescriptor::new("en", "a"), &TreeTranslations::new());

        let descriptors: Vec<_> = cache
            .get_all_records()
            .iter()
            .map(RecordExport::descriptor)
            .collect();
        assert_eq!(
            descriptors,
            vec![
                CacheDescriptor::default_ns("de"),
                CacheDescriptor::new("en", "a"),
                CacheDescriptor::new("en", "b"),
            ]
        );
    }

    #[test]
    fn test_initial_loading_forces_flags() {
        let flag = Arc::new(AtomicBool::new(true));
        let probe = Arc::clone(&flag);
        let cache = RecordCache::new(CacheConfig::new())
            .with_initial_loading(move || probe.load(Ordering::SeqCst));

        assert!(cache.is_fetching(&FallbackList::None));
        assert!(cache.is_loading("en", &FallbackList::None));

        flag.store(false, Ordering::SeqCst);
        assert!(!cache.is_fetching(&FallbackList::None));
        assert!(!cache.is_loading("en", &FallbackList::None));
    }

    #[test]
    fn test_translation_ns_lookup() {
        let cache = RecordCache::new(CacheConfig::new());
        cache.add_record(&CacheDescriptor::new("de", "ns2"), &tree(r#"{"k":"Wert"}"#));

        let ns = vec!["ns1".to_string(), "ns2".to_string()];
        let langs = vec!["en".to_string(), "de".to_string()];
        assert_eq!(cache.get_translation_ns(&ns, &langs, "k"), NsLookup::Found("ns2".into()));
        assert_eq!(cache.get_translation_fallback(&ns, &langs, "k").as_deref(), Some("Wert"));
        assert_eq!(cache.get_translation_ns(&ns, &langs, "x"), NsLookup::Searched(ns.clone()));
    }

    #[test]
    fn test_token_issue_is_monotonic() {
        let mut state = CacheState::new();
        let a = state.issue_token();
        let b = state.issue_token();
        assert!(b > a);
    }
}
