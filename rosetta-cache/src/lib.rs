//! ROSETTA Cache - Versioned Translation Record Cache
//!
//! Holds flattened translation records per `(language, namespace)`, loads
//! missing records through pluggable backends with per-key deduplication,
//! and resolves keys across namespace and language fallback lists.
//!
//! # Quick Start
//!
//! ```no_run
//! use rosetta_cache::{backend_fn, RecordCache, StaticData};
//! use rosetta_core::{parse_tree_str, CacheConfig, DescriptorRequest};
//!
//! # async fn demo() -> rosetta_core::RosettaResult<()> {
//! let cache = RecordCache::new(CacheConfig::new())
//!     .with_backend(backend_fn(|_| async { parse_tree_str(r#"{"hi":"there"}"#).map(Some) }));
//! cache.add_static_data(StaticData::from_json_str(r#"{"en":{"hello":"world"}}"#)?);
//!
//! let records = cache
//!     .load_records(vec![DescriptorRequest::language("de")], false)
//!     .await?;
//! assert!(records[0].is_some());
//! # Ok(())
//! # }
//! ```

mod backend;
mod freshness;
mod loader;
mod resolver;
mod static_data;
mod store;

pub use backend::{backend_fn, DevRecordBackend, FnBackend, RecordBackend};
pub use freshness::{Freshness, RecordRead};
pub use loader::{FetchToken, LoadResult};
pub use resolver::NsLookup;
pub use static_data::{LazyLoader, StaticData, StaticEntry};
pub use store::RecordCache;
