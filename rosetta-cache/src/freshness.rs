//! Freshness contracts for cache reads.
//!
//! Callers state whether a stale record is acceptable. A record is fresh
//! when it was written at the cache's current epoch, i.e. no invalidation
//! happened since.

use rosetta_core::{Epoch, FlatTranslations};
use std::sync::Arc;

/// Freshness requirement for existence checks and reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Accept a record written at any epoch.
    ///
    /// Stale data stays servable while a refetch happens lazily.
    #[default]
    BestEffort,

    /// Require a record written at the current epoch.
    Strict,
}

impl Freshness {
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }

    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::BestEffort)
    }

    /// Whether a record at `version` satisfies this requirement when the
    /// cache is at `current`.
    pub fn accepts(&self, version: Epoch, current: Epoch) -> bool {
        match self {
            Self::BestEffort => true,
            Self::Strict => version == current,
        }
    }
}

impl From<bool> for Freshness {
    /// `true` means strict.
    fn from(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::BestEffort
        }
    }
}

/// Result of a record read, carrying its version.
#[derive(Debug, Clone)]
pub struct RecordRead {
    data: Arc<FlatTranslations>,
    version: Epoch,
    fresh: bool,
}

impl RecordRead {
    pub(crate) fn new(data: Arc<FlatTranslations>, version: Epoch, current: Epoch) -> Self {
        Self {
            data,
            version,
            fresh: version == current,
        }
    }

    /// Consume the wrapper and return the data.
    pub fn into_data(self) -> Arc<FlatTranslations> {
        self.data
    }

    pub fn data(&self) -> &FlatTranslations {
        &self.data
    }

    /// Epoch the record was written at.
    pub fn version(&self) -> Epoch {
        self.version
    }

    /// Whether the record was written at the current epoch.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Static data that no fetch has replaced yet.
    pub fn is_bootstrap(&self) -> bool {
        self.version.is_bootstrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_default_is_best_effort() {
        assert!(Freshness::default().is_best_effort());
        assert!(!Freshness::default().is_strict());
    }

    #[test]
    fn test_freshness_from_bool() {
        assert_eq!(Freshness::from(true), Freshness::Strict);
        assert_eq!(Freshness::from(false), Freshness::BestEffort);
    }

    #[test]
    fn test_accepts() {
        let current = Epoch::new(2);
        assert!(Freshness::BestEffort.accepts(Epoch::new(1), current));
        assert!(!Freshness::Strict.accepts(Epoch::new(1), current));
        assert!(Freshness::Strict.accepts(current, current));
    }

    #[test]
    fn test_record_read_flags() {
        let read = RecordRead::new(Arc::new(FlatTranslations::new()), Epoch::BOOTSTRAP, Epoch::new(1));
        assert!(!read.is_fresh());
        assert!(read.is_bootstrap());
        assert_eq!(read.version(), Epoch::BOOTSTRAP);
        assert!(read.data().is_empty());
    }
}
