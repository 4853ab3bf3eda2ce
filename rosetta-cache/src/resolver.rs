//! Fallback resolution over cached records.
//!
//! Both searches walk namespaces in the outer loop and languages in the
//! inner loop, in caller order. A value counts only when it is present and
//! not null.

use rosetta_core::{unique, CacheKey};
use std::collections::HashMap;

use crate::store::CacheRecord;

/// Outcome of a namespace search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NsLookup {
    /// First namespace holding a usable value.
    Found(String),
    /// No match; every searched namespace, deduplicated in order.
    Searched(Vec<String>),
}

impl NsLookup {
    pub fn found(&self) -> Option<&str> {
        match self {
            Self::Found(ns) => Some(ns),
            Self::Searched(_) => None,
        }
    }

    /// Namespaces a caller should consider: the match alone, or all searched.
    pub fn namespaces(&self) -> Vec<String> {
        match self {
            Self::Found(ns) => vec![ns.clone()],
            Self::Searched(all) => all.clone(),
        }
    }
}

pub(crate) fn find_namespace(
    records: &HashMap<CacheKey, CacheRecord>,
    namespaces: &[String],
    languages: &[String],
    key: &str,
) -> NsLookup {
    match first_match(records, namespaces, languages, key) {
        Some((namespace, _)) => NsLookup::Found(namespace.to_string()),
        None => NsLookup::Searched(unique(namespaces.iter().cloned())),
    }
}

pub(crate) fn find_value(
    records: &HashMap<CacheKey, CacheRecord>,
    namespaces: &[String],
    languages: &[String],
    key: &str,
) -> Option<String> {
    first_match(records, namespaces, languages, key).map(|(_, value)| value.to_string())
}

fn first_match<'a>(
    records: &'a HashMap<CacheKey, CacheRecord>,
    namespaces: &'a [String],
    languages: &[String],
    key: &str,
) -> Option<(&'a str, &'a str)> {
    let mut probe = String::new();
    for namespace in namespaces {
        for language in languages {
            CacheKey::write_encoded(language, namespace, &mut probe);
            let value = records
                .get(probe.as_str())
                .and_then(|record| record.data.get(key))
                .and_then(Option::as_deref);
            if let Some(value) = value {
                return Some((namespace.as_str(), value));
            }
        }
    }
    None
}
