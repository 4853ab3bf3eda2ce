//! ROSETTA Test Utilities
//!
//! Centralized test infrastructure for the ROSETTA workspace:
//! - Mock record backends (counting, gated, failing, dev)
//! - Proptest generators for descriptors and translation trees
//! - Test fixtures for common scenarios
//! - Custom assertions for ROSETTA-specific validation

// Re-export core types for convenience
pub use rosetta_cache::{
    DevRecordBackend, Freshness, NsLookup, RecordBackend, RecordCache, StaticData,
};
pub use rosetta_core::{
    BackendError, CacheConfig, CacheDescriptor, CacheKey, DescriptorRequest, DevProps,
    FallbackList, FlatTranslations, RosettaError, RosettaResult, TranslationValue,
    TreeTranslations, TreeValue,
};
pub use rosetta_events::{CacheChange, CacheChangeSink, ValueObserver};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

// ============================================================================
// MOCK BACKENDS
// ============================================================================

/// In-memory record backend that counts calls.
///
/// With a gate installed every call waits for one
/// [`Notify::notify_one`] permit before answering, which lets tests hold a
/// fetch open across an `invalidate()` or a second load.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    records: Arc<Mutex<HashMap<CacheKey, TreeTranslations>>>,
    calls: Arc<AtomicUsize>,
    requested: Arc<Mutex<Vec<CacheDescriptor>>>,
    gate: Option<Arc<Notify>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `tree` for `descriptor`.
    pub fn with_record(self, descriptor: &CacheDescriptor, tree: TreeTranslations) -> Self {
        self.insert(descriptor, tree);
        self
    }

    /// Hold every call until the returned gate is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Replace the tree served for `descriptor`.
    pub fn insert(&self, descriptor: &CacheDescriptor, tree: TreeTranslations) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(CacheKey::encode(descriptor), tree);
    }

    /// Number of `get_record` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Descriptors requested so far, in call order.
    pub fn requested(&self) -> Vec<CacheDescriptor> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RecordBackend for MockBackend {
    async fn get_record(
        &self,
        descriptor: &CacheDescriptor,
    ) -> RosettaResult<Option<TreeTranslations>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(descriptor.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&CacheKey::encode(descriptor))
            .cloned())
    }
}

/// Backend that fails every call with [`BackendError::FetchFailed`].
#[derive(Debug, Clone)]
pub struct FailingBackend {
    reason: String,
    calls: Arc<AtomicUsize>,
}

impl FailingBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordBackend for FailingBackend {
    async fn get_record(
        &self,
        descriptor: &CacheDescriptor,
    ) -> RosettaResult<Option<TreeTranslations>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::FetchFailed {
            language: descriptor.language.clone(),
            namespace: descriptor.namespace.clone(),
            reason: self.reason.clone(),
        }
        .into())
    }
}

/// Backend that fails only for the listed namespaces and serves an empty
/// tree otherwise.
#[derive(Debug, Clone, Default)]
pub struct SelectiveFailingBackend {
    failing: Vec<String>,
}

impl SelectiveFailingBackend {
    pub fn failing_for<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: namespaces.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RecordBackend for SelectiveFailingBackend {
    async fn get_record(
        &self,
        descriptor: &CacheDescriptor,
    ) -> RosettaResult<Option<TreeTranslations>> {
        if self.failing.contains(&descriptor.namespace) {
            return Err(BackendError::FetchFailed {
                language: descriptor.language.clone(),
                namespace: descriptor.namespace.clone(),
                reason: "namespace unavailable".to_string(),
            }
            .into());
        }
        Ok(Some(TreeTranslations::new()))
    }
}

#[derive(Debug, Clone)]
enum DevBehavior {
    Serve(TreeTranslations),
    Empty,
    Fail,
}

/// Dev backend with a fixed behavior that records the props it was given.
#[derive(Debug, Clone)]
pub struct MockDevBackend {
    behavior: DevBehavior,
    calls: Arc<AtomicUsize>,
    props_seen: Arc<Mutex<Vec<DevProps>>>,
}

impl MockDevBackend {
    fn with_behavior(behavior: DevBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            props_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every call with `tree`.
    pub fn serving(tree: TreeTranslations) -> Self {
        Self::with_behavior(DevBehavior::Serve(tree))
    }

    /// Answer every call with `Ok(None)`.
    pub fn empty() -> Self {
        Self::with_behavior(DevBehavior::Empty)
    }

    /// Fail every call with [`BackendError::DevFetchFailed`].
    pub fn failing() -> Self {
        Self::with_behavior(DevBehavior::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn props_seen(&self) -> Vec<DevProps> {
        self.props_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DevRecordBackend for MockDevBackend {
    async fn get_dev_record(
        &self,
        descriptor: &CacheDescriptor,
        props: &DevProps,
    ) -> RosettaResult<Option<TreeTranslations>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.props_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(props.clone());

        match &self.behavior {
            DevBehavior::Serve(tree) => Ok(Some(tree.clone())),
            DevBehavior::Empty => Ok(None),
            DevBehavior::Fail => Err(BackendError::DevFetchFailed {
                language: descriptor.language.clone(),
                namespace: descriptor.namespace.clone(),
                reason: "dev server unreachable".to_string(),
            }
            .into()),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for ROSETTA data types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a language tag such as `en` or `pt-BR`.
    pub fn arb_language() -> impl Strategy<Value = String> {
        "[a-z]{2}(-[A-Z]{2})?".prop_map(|s| s)
    }

    /// Generate a namespace, including the default and separator-heavy ones.
    pub fn arb_namespace() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-z]{1,8}".prop_map(|s| s),
            "[a-z:\\\\]{1,8}".prop_map(|s| s),
        ]
    }

    /// Generate a CacheDescriptor.
    pub fn arb_descriptor() -> impl Strategy<Value = CacheDescriptor> {
        (arb_language(), arb_namespace())
            .prop_map(|(language, namespace)| CacheDescriptor::new(language, namespace))
    }

    /// Generate a translation key segment (never contains the flatten separator).
    pub fn arb_segment() -> impl Strategy<Value = String> {
        "[a-z_]{1,6}".prop_map(|s| s)
    }

    /// Generate a leaf value: mostly text, sometimes explicit null.
    pub fn arb_leaf() -> impl Strategy<Value = TreeValue> {
        prop_oneof![
            4 => "[a-zA-Z ]{0,12}".prop_map(|s: String| TreeValue::Leaf(Some(s))),
            1 => Just(TreeValue::Leaf(None)),
        ]
    }

    /// Generate a nested translation tree up to `depth` levels deep.
    pub fn arb_tree(depth: u32) -> impl Strategy<Value = TreeTranslations> {
        arb_leaf()
            .prop_recursive(depth, 32, 4, |inner| {
                prop::collection::btree_map(arb_segment(), inner, 1..4).prop_map(TreeValue::Branch)
            })
            .prop_flat_map(|root| match root {
                TreeValue::Branch(tree) => Just(tree).boxed(),
                leaf => prop::collection::btree_map(arb_segment(), Just(leaf), 1..3).boxed(),
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use rosetta_core::tree_from_paths;

    /// Build a tree from dotted `(key, value)` pairs.
    pub fn tree(pairs: &[(&str, &str)]) -> TreeTranslations {
        let paths: Vec<Vec<&str>> = pairs.iter().map(|(key, _)| key.split('.').collect()).collect();
        tree_from_paths(
            paths
                .iter()
                .zip(pairs)
                .map(|(path, (_, value))| (path.as_slice(), Some(value.to_string()))),
        )
    }

    /// `{ "hello": "world" }`
    pub fn hello_world() -> TreeTranslations {
        tree(&[("hello", "world")])
    }

    /// `{ "greet": { "formal": "Good day" } }`
    pub fn greet_formal() -> TreeTranslations {
        tree(&[("greet.formal", "Good day")])
    }

    /// Descriptor in the default namespace.
    pub fn en() -> CacheDescriptor {
        CacheDescriptor::default_ns("en")
    }

    pub fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// Change sink that remembers every change it sees.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        changes: Mutex<Vec<CacheChange>>,
    }

    impl RecordingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn changes(&self) -> Vec<CacheChange> {
            self.changes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn len(&self) -> usize {
            self.changes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl CacheChangeSink for RecordingSink {
        fn emit(&self, change: &CacheChange) {
            self.changes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(change.clone());
        }
    }

    /// Observer that counts notifications.
    #[derive(Debug, Default)]
    pub struct CountingObserver {
        count: AtomicUsize,
    }

    impl CountingObserver {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    impl ValueObserver for CountingObserver {
        fn notify(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Cache wired to a recording sink and two counting observers.
    pub struct Harness {
        pub cache: RecordCache,
        pub sink: Arc<RecordingSink>,
        pub fetching: Arc<CountingObserver>,
        pub loading: Arc<CountingObserver>,
    }

    impl Harness {
        /// Wrap a configured cache, replacing its sink and observers.
        pub fn wrap(cache: RecordCache) -> Self {
            let sink = RecordingSink::new();
            let fetching = CountingObserver::new();
            let loading = CountingObserver::new();
            let cache = cache
                .with_change_sink(sink.clone())
                .with_fetching_observer(fetching.clone())
                .with_loading_observer(loading.clone());
            Self {
                cache,
                sink,
                fetching,
                loading,
            }
        }

        pub fn with_backend(backend: MockBackend) -> Self {
            Self::wrap(RecordCache::new(CacheConfig::new()).with_backend(backend))
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for ROSETTA-specific validation.

    use super::*;

    /// Assert that a RosettaResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &RosettaResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a RosettaResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &RosettaResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a RosettaResult is a Backend error.
    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(result: &RosettaResult<T>) {
        match result {
            Err(RosettaError::Backend(_)) => {}
            other => panic!("Expected Backend error, got: {:?}", other),
        }
    }

    /// Assert that a RosettaResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &RosettaResult<T>) {
        match result {
            Err(RosettaError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a RosettaResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &RosettaResult<T>) {
        match result {
            Err(RosettaError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert the stored text for `key`.
    #[track_caller]
    pub fn assert_translation(cache: &RecordCache, descriptor: &CacheDescriptor, key: &str, expected: &str) {
        match cache.get_translation(descriptor, key) {
            Some(Some(value)) => assert_eq!(
                value, expected,
                "Translation mismatch for {} in {}",
                key, descriptor
            ),
            other => panic!("Expected {:?} for {} in {}, got: {:?}", expected, key, descriptor, other),
        }
    }

    /// Assert that no record is cached for `descriptor`.
    #[track_caller]
    pub fn assert_absent(cache: &RecordCache, descriptor: &CacheDescriptor) {
        assert!(
            !cache.exists(descriptor, Freshness::BestEffort),
            "Expected no record for {}",
            descriptor
        );
    }

    /// Assert that the record for `descriptor` was written at the current epoch.
    #[track_caller]
    pub fn assert_fresh(cache: &RecordCache, descriptor: &CacheDescriptor) {
        assert!(
            cache.exists(descriptor, Freshness::Strict),
            "Expected a fresh record for {} at epoch {}",
            descriptor,
            cache.epoch()
        );
    }

    /// Assert that a record exists for `descriptor` but is stale.
    #[track_caller]
    pub fn assert_stale(cache: &RecordCache, descriptor: &CacheDescriptor) {
        assert!(
            cache.exists(descriptor, Freshness::BestEffort),
            "Expected a record for {}",
            descriptor
        );
        assert!(
            !cache.exists(descriptor, Freshness::Strict),
            "Expected the record for {} to be stale",
            descriptor
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
