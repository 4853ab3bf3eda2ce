//! Static data registry.
//!
//! Static data is supplied up front, keyed by the `language[:namespace]`
//! string form. An entry is either a literal tree, installed into the cache
//! immediately, or a lazy loader invoked the first time the record is
//! fetched.

use futures_util::future::{BoxFuture, FutureExt};
use rosetta_core::{
    parse_tree_value, CacheKey, RosettaResult, TreeTranslations, ValidationError,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

type LoaderFn = dyn Fn() -> BoxFuture<'static, RosettaResult<TreeTranslations>> + Send + Sync;

/// Zero-argument async producer of a translation tree.
#[derive(Clone)]
pub struct LazyLoader {
    inner: Arc<LoaderFn>,
}

impl LazyLoader {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RosettaResult<TreeTranslations>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move || f().boxed()),
        }
    }

    /// Start the load.
    pub fn load(&self) -> BoxFuture<'static, RosettaResult<TreeTranslations>> {
        (self.inner)()
    }
}

impl std::fmt::Debug for LazyLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LazyLoader")
    }
}

/// One static data entry.
#[derive(Debug, Clone)]
pub enum StaticEntry {
    Literal(Arc<TreeTranslations>),
    Lazy(LazyLoader),
}

impl StaticEntry {
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

/// Static data keyed by cache key.
#[derive(Debug, Clone, Default)]
pub struct StaticData {
    entries: BTreeMap<CacheKey, StaticEntry>,
}

impl StaticData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal tree under a `language[:namespace]` key.
    pub fn literal(mut self, key: &str, tree: TreeTranslations) -> Self {
        self.entries
            .insert(parse_key(key), StaticEntry::Literal(Arc::new(tree)));
        self
    }

    /// Add a lazily loaded tree under a `language[:namespace]` key.
    pub fn lazy<F, Fut>(mut self, key: &str, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RosettaResult<TreeTranslations>> + Send + 'static,
    {
        self.entries
            .insert(parse_key(key), StaticEntry::Lazy(LazyLoader::new(f)));
        self
    }

    /// Parse the `{ "lang[:ns]": tree }` JSON shape. Every entry is a literal.
    pub fn from_json(value: &serde_json::Value) -> RosettaResult<Self> {
        let object = value.as_object().ok_or_else(|| ValidationError::InvalidTree {
            reason: "static data must be a JSON object".to_string(),
        })?;

        let mut data = Self::new();
        for (key, tree) in object {
            if key.is_empty() {
                return Err(ValidationError::InvalidStaticKey { key: key.clone() }.into());
            }
            data = data.literal(key, parse_tree_value(tree)?);
        }
        Ok(data)
    }

    /// Parse static data from JSON text.
    pub fn from_json_str(json: &str) -> RosettaResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidTree {
                reason: e.to_string(),
            })?;
        Self::from_json(&value)
    }

    /// Shallow merge; entries of `other` overwrite ours.
    pub fn merge(&mut self, other: StaticData) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &CacheKey) -> Option<&StaticEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &StaticEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_key(key: &str) -> CacheKey {
    match key.parse::<CacheKey>() {
        Ok(parsed) => parsed,
        Err(never) => match never {},
    }
}
