//! ROSETTA Core - Translation Data Types
//!
//! Descriptors, the cache key codec, translation trees and their flattened
//! form, fallback lists, configuration, and the error taxonomy. All other
//! crates depend on this. There is no I/O here.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod fallback;
pub mod flatten;
pub mod key;
pub mod tree;

pub use config::{CacheConfig, DevProps};
pub use descriptor::{
    CacheDescriptor, DescriptorRequest, FlatTranslations, RecordExport, TranslationValue,
};
pub use error::{BackendError, ConfigError, RosettaError, RosettaResult, ValidationError};
pub use fallback::{namespace_chain, unique, FallbackLanguages, FallbackList};
pub use flatten::{flatten, unflatten, KEY_SEPARATOR};
pub use key::CacheKey;
pub use tree::{parse_tree_str, parse_tree_value, tree_from_paths, TreeTranslations, TreeValue};

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// EPOCH
// ============================================================================

/// Global cache version.
///
/// Starts at [`Epoch::BOOTSTRAP`] and is bumped by every invalidation. A
/// record is strictly fresh when its epoch equals the cache's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Epoch(u64);

impl Epoch {
    /// Version of static data that no real fetch has replaced.
    pub const BOOTSTRAP: Epoch = Epoch(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The following epoch.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn is_bootstrap(&self) -> bool {
        *self == Self::BOOTSTRAP
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
