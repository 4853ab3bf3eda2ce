//! Record backend traits.
//!
//! The cache never talks to a network itself. A [`RecordBackend`] produces
//! translation trees for a descriptor; a [`DevRecordBackend`] does the same
//! against a dev server and may fail without failing the load.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use rosetta_core::{CacheDescriptor, DevProps, RosettaResult, TreeTranslations};
use std::future::Future;
use std::sync::Arc;

/// General record source.
///
/// `Ok(None)` means this backend does not serve the descriptor; the next
/// backend is asked. An `Err` fails the whole load batch.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn get_record(
        &self,
        descriptor: &CacheDescriptor,
    ) -> RosettaResult<Option<TreeTranslations>>;
}

/// Dev-server record source.
///
/// Errors and `Ok(None)` both fall back to the normal fetch path.
#[async_trait]
pub trait DevRecordBackend: Send + Sync {
    async fn get_dev_record(
        &self,
        descriptor: &CacheDescriptor,
        props: &DevProps,
    ) -> RosettaResult<Option<TreeTranslations>>;
}

type RecordFn =
    dyn Fn(CacheDescriptor) -> BoxFuture<'static, RosettaResult<Option<TreeTranslations>>> + Send + Sync;

/// Closure-backed [`RecordBackend`].
#[derive(Clone)]
pub struct FnBackend {
    inner: Arc<RecordFn>,
}

impl std::fmt::Debug for FnBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBackend").finish_non_exhaustive()
    }
}

/// Adapt an async closure into a [`RecordBackend`].
pub fn backend_fn<F, Fut>(f: F) -> FnBackend
where
    F: Fn(CacheDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RosettaResult<Option<TreeTranslations>>> + Send + 'static,
{
    FnBackend {
        inner: Arc::new(move |descriptor| f(descriptor).boxed()),
    }
}

#[async_trait]
impl RecordBackend for FnBackend {
    async fn get_record(
        &self,
        descriptor: &CacheDescriptor,
    ) -> RosettaResult<Option<TreeTranslations>> {
        (self.inner)(descriptor.clone()).await
    }
}

#[async_trait]
impl<T: RecordBackend + ?Sized> RecordBackend for Arc<T> {
    async fn get_record(
        &self,
        descriptor: &CacheDescriptor,
    ) -> RosettaResult<Option<TreeTranslations>> {
        (**self).get_record(descriptor).await
    }
}
