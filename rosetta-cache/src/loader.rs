//! Deduplicated async record loading.
//!
//! [`RecordCache::load_records`] registers every missing fetch in the
//! in-flight map before it returns its future, so two loads issued back to
//! back share one underlying fetch. Each in-flight entry carries a
//! [`FetchToken`]; a result is applied only while the map still holds the
//! token captured at registration. [`RecordCache::invalidate`] clears the map,
//! which turns every outstanding result into a discard.

use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use rosetta_core::{
    flatten, BackendError, CacheDescriptor, CacheKey, DescriptorRequest, DevProps,
    FlatTranslations, RosettaResult, TreeTranslations,
};
use rosetta_events::CacheChange;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::backend::{DevRecordBackend, RecordBackend};
use crate::static_data::StaticEntry;
use crate::store::RecordCache;

pub(crate) type SharedFetch = Shared<BoxFuture<'static, RosettaResult<Arc<TreeTranslations>>>>;

/// Output of one [`RecordCache::load_records`] call, one entry per request.
pub type LoadResult = RosettaResult<Vec<Option<Arc<FlatTranslations>>>>;

/// Identity of one registered fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchToken(u64);

impl FetchToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// In-flight map entry.
pub(crate) struct InFlight {
    pub(crate) token: FetchToken,
    pub(crate) fetch: SharedFetch,
}

/// Everything a fetch needs, detached from the cache's lifetime.
#[derive(Clone, Default)]
pub(crate) struct FetchSources {
    pub(crate) backends: Vec<Arc<dyn RecordBackend>>,
    pub(crate) dev_backend: Option<Arc<dyn DevRecordBackend>>,
    pub(crate) dev_props: DevProps,
}

/// One request of a batch after registration.
struct PendingLoad {
    descriptor: CacheDescriptor,
    key: CacheKey,
    token: FetchToken,
    fetch: SharedFetch,
}

impl RecordCache {
    /// Load records for `requests`, fetching what is not already in flight.
    ///
    /// Registration and the first observer notification happen before this
    /// method returns. The future resolves to the cached record for every
    /// request, in request order. If any fetch failed, the first error is
    /// returned after the successful results have been written and the
    /// observers notified a second time. Dropping the future before it
    /// resolves releases the fetches no other load shares.
    pub fn load_records(
        &self,
        requests: Vec<DescriptorRequest>,
        is_dev: bool,
    ) -> impl Future<Output = LoadResult> + Send + '_ {
        let batch = BatchGuard {
            cache: self,
            pending: self.register_batch(requests, is_dev),
            settled: false,
        };
        self.notify_observers();

        async move {
            let mut batch = batch;
            let results = join_all(batch.pending.iter_mut().map(|load| &mut load.fetch)).await;

            let mut first_error = None;
            for (load, result) in batch.pending.iter().zip(results) {
                match result {
                    Ok(tree) => self.complete(load, Some(&*tree)),
                    Err(err) => {
                        self.complete(load, None);
                        first_error.get_or_insert(err);
                    }
                }
            }
            batch.settled = true;
            self.notify_observers();

            if let Some(err) = first_error {
                return Err(err);
            }
            Ok(batch
                .pending
                .iter()
                .map(|load| self.record_data(&load.key))
                .collect())
        }
    }

    fn register_batch(&self, requests: Vec<DescriptorRequest>, is_dev: bool) -> Vec<PendingLoad> {
        let mut state = self.write();
        requests
            .into_iter()
            .map(|request| {
                let descriptor = request.with_default_ns(&self.config.default_ns);
                let key = CacheKey::encode(&descriptor);

                if let Some(existing) = state.in_flight.get(&key) {
                    tracing::trace!(key = %key, token = %existing.token, "Joining in-flight fetch");
                    return PendingLoad {
                        descriptor,
                        key,
                        token: existing.token,
                        fetch: existing.fetch.clone(),
                    };
                }

                let token = state.issue_token();
                let static_entry = state.static_data.get(&key).cloned();
                let fetch = fetch_data(
                    Arc::clone(&self.sources),
                    descriptor.clone(),
                    static_entry,
                    is_dev,
                )
                .shared();
                state.in_flight.insert(
                    key.clone(),
                    InFlight {
                        token,
                        fetch: fetch.clone(),
                    },
                );
                tracing::trace!(key = %key, token = %token, "Registered fetch");

                PendingLoad {
                    descriptor,
                    key,
                    token,
                    fetch,
                }
            })
            .collect()
    }

    /// Apply a settled fetch if its token is still current.
    fn complete(&self, load: &PendingLoad, tree: Option<&TreeTranslations>) {
        let flat = tree.map(flatten);
        let written = {
            let mut state = self.write();
            let current = state
                .in_flight
                .get(&load.key)
                .is_some_and(|entry| entry.token == load.token);
            if !current {
                tracing::debug!(
                    key = %load.key,
                    token = %load.token,
                    "Fetch result not applied, entry superseded"
                );
                return;
            }
            state.in_flight.remove(&load.key);
            match flat {
                Some(flat) => {
                    state.put(load.key.clone(), flat);
                    true
                }
                None => false,
            }
        };

        if written {
            self.emit(&CacheChange::record(load.descriptor.clone()));
        }
    }
}

/// Owns the registered loads of one batch until their results are applied.
///
/// Dropping an unsettled batch releases every entry it was the last holder
/// of, so an abandoned load does not keep reporting as in flight.
struct BatchGuard<'a> {
    cache: &'a RecordCache,
    pending: Vec<PendingLoad>,
    settled: bool,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // Release our handles first so the map's handle counts only others.
        let abandoned: Vec<(CacheKey, FetchToken)> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|load| (load.key, load.token))
            .collect();

        let released: Vec<InFlight> = {
            let mut state = self.cache.write();
            abandoned
                .iter()
                .filter_map(|(key, token)| {
                    let orphaned = state.in_flight.get(key).is_some_and(|entry| {
                        entry.token == *token && entry.fetch.strong_count() == Some(1)
                    });
                    if !orphaned {
                        return None;
                    }
                    tracing::debug!(key = %key, token = %token, "Released abandoned fetch");
                    state.in_flight.remove(key)
                })
                .collect()
        };

        // Cancels the fetches outside the lock.
        if !released.is_empty() {
            drop(released);
            self.cache.notify_observers();
        }
    }
}

/// Build the fetch for one descriptor.
///
/// Dev loads try the dev backend first and fall back to the normal path on
/// error or when it has no record.
fn fetch_data(
    sources: Arc<FetchSources>,
    descriptor: CacheDescriptor,
    static_entry: Option<StaticEntry>,
    is_dev: bool,
) -> BoxFuture<'static, RosettaResult<Arc<TreeTranslations>>> {
    async move {
        if is_dev {
            if let Some(dev) = &sources.dev_backend {
                match dev.get_dev_record(&descriptor, &sources.dev_props).await {
                    Ok(Some(tree)) => {
                        tracing::trace!(descriptor = %descriptor, "Fetched from dev backend");
                        return Ok(Arc::new(tree));
                    }
                    Ok(None) => {
                        tracing::trace!(descriptor = %descriptor, "Dev backend has no record");
                    }
                    Err(e) => {
                        tracing::warn!(
                            descriptor = %descriptor,
                            error = %e,
                            "Failed to fetch data from dev backend, falling back"
                        );
                    }
                }
            }
        }
        fetch_normal(&sources, &descriptor, static_entry).await
    }
    .boxed()
}

async fn fetch_normal(
    sources: &FetchSources,
    descriptor: &CacheDescriptor,
    static_entry: Option<StaticEntry>,
) -> RosettaResult<Arc<TreeTranslations>> {
    match static_entry {
        Some(StaticEntry::Literal(tree)) => {
            tracing::trace!(descriptor = %descriptor, "Serving literal static data");
            return Ok(tree);
        }
        Some(StaticEntry::Lazy(loader)) => {
            tracing::trace!(descriptor = %descriptor, "Loading lazy static data");
            let tree = loader.load().await.map_err(|e| BackendError::LazyStaticFailed {
                key: CacheKey::encode(descriptor).into_string(),
                reason: e.to_string(),
            })?;
            return Ok(Arc::new(tree));
        }
        None => {}
    }

    for (idx, backend) in sources.backends.iter().enumerate() {
        if let Some(tree) = backend.get_record(descriptor).await? {
            tracing::trace!(descriptor = %descriptor, backend_index = idx, "Fetched from backend");
            return Ok(Arc::new(tree));
        }
    }

    tracing::trace!(descriptor = %descriptor, "No source for record, using empty tree");
    Ok(Arc::new(TreeTranslations::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::backend_fn;
    use crate::freshness::Freshness;
    use crate::static_data::StaticData;
    use async_trait::async_trait;
    use rosetta_core::{parse_tree_str, CacheConfig, DevProps, RosettaError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tree(json: &str) -> TreeTranslations {
        parse_tree_str(json).unwrap()
    }

    fn counting_backend(calls: Arc<AtomicUsize>, json: &'static str) -> crate::backend::FnBackend {
        backend_fn(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { parse_tree_str(json).map(Some) }
        })
    }

    struct BrokenDev;

    #[async_trait]
    impl DevRecordBackend for BrokenDev {
        async fn get_dev_record(
            &self,
            descriptor: &CacheDescriptor,
            _props: &DevProps,
        ) -> RosettaResult<Option<TreeTranslations>> {
            Err(BackendError::DevFetchFailed {
                language: descriptor.language.clone(),
                namespace: descriptor.namespace.clone(),
                reason: "connection refused".to_string(),
            }
            .into())
        }
    }

    #[test]
    fn test_fetch_token_display() {
        assert_eq!(FetchToken::new(7).to_string(), "#7");
        assert_eq!(FetchToken::new(7).value(), 7);
    }

    #[tokio::test]
    async fn test_load_without_sources_yields_empty_record() {
        let cache = RecordCache::new(CacheConfig::new());
        let records = cache
            .load_records(vec![DescriptorRequest::language("en")], false)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].as_ref().is_some_and(|r| r.is_empty()));
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_registration_happens_before_await() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RecordCache::new(CacheConfig::new())
            .with_backend(counting_backend(Arc::clone(&calls), r#"{"a":"b"}"#));

        let first = cache.load_records(vec![DescriptorRequest::language("en")], false);
        assert_eq!(cache.in_flight_count(), 1);
        let second = cache.load_records(vec![DescriptorRequest::language("en")], false);
        assert_eq!(cache.in_flight_count(), 1);

        let (a, b) = futures_util::join!(first, second);
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_request_in_one_batch_shares_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RecordCache::new(CacheConfig::new())
            .with_backend(counting_backend(Arc::clone(&calls), r#"{"a":"b"}"#));

        let records = cache
            .load_records(
                vec![DescriptorRequest::language("en"), DescriptorRequest::language("en")],
                false,
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backends_asked_in_order() {
        let cache = RecordCache::new(CacheConfig::new())
            .with_backend(backend_fn(|_| async { Ok::<_, RosettaError>(None) }))
            .with_backend(backend_fn(|_| async { parse_tree_str(r#"{"src":"second"}"#).map(Some) }))
            .with_backend(backend_fn(|_| async { parse_tree_str(r#"{"src":"third"}"#).map(Some) }));

        cache
            .load_records(vec![DescriptorRequest::language("en")], false)
            .await
            .unwrap();
        assert_eq!(
            cache.get_translation(&CacheDescriptor::default_ns("en"), "src"),
            Some(Some("second".to_string()))
        );
    }

    #[tokio::test]
    async fn test_literal_static_skips_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = RecordCache::new(CacheConfig::new())
            .with_backend(counting_backend(Arc::clone(&calls), r#"{"a":"b"}"#));
        cache.add_static_data(StaticData::new().literal("en", tree(r#"{"hello":"world"}"#)));
        cache.invalidate();

        cache
            .load_records(vec![DescriptorRequest::language("en")], false)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.exists(&CacheDescriptor::default_ns("en"), Freshness::Strict));
    }

    #[tokio::test]
    async fn test_lazy_static_failure_is_wrapped() {
        let cache = RecordCache::new(CacheConfig::new());
        cache.add_static_data(StaticData::new().lazy("en", || async {
            Err::<TreeTranslations, RosettaError>(
                BackendError::FetchFailed {
                    language: "en".to_string(),
                    namespace: String::new(),
                    reason: "missing bundle".to_string(),
                }
                .into(),
            )
        }));

        let err = cache
            .load_records(vec![DescriptorRequest::language("en")], false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RosettaError::Backend(BackendError::LazyStaticFailed { ref key, .. }) if key == "en"
        ));
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_dev_failure_falls_back_to_normal_path() {
        let cache = RecordCache::new(CacheConfig::new())
            .with_dev_backend(BrokenDev)
            .with_backend(backend_fn(|_| async { parse_tree_str(r#"{"src":"normal"}"#).map(Some) }));

        let records = cache
            .load_records(vec![DescriptorRequest::language("en")], true)
            .await
            .unwrap();
        assert_eq!(
            records[0].as_ref().and_then(|r| r.get("src").cloned()),
            Some(Some("normal".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dev_backend_ignored_when_not_dev() {
        let cache = RecordCache::new(CacheConfig::new()).with_dev_backend(BrokenDev);
        assert!(cache
            .load_records(vec![DescriptorRequest::language("en")], false)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalidate_discards_pending_result() {
        let cache = RecordCache::new(CacheConfig::new())
            .with_backend(backend_fn(|_| async { parse_tree_str(r#"{"a":"b"}"#).map(Some) }));

        let load = cache.load_records(vec![DescriptorRequest::language("en")], false);
        cache.invalidate();
        let records = load.await.unwrap();

        assert_eq!(records, vec![None]);
        assert_eq!(cache.record_count(), 0);
    }
}
