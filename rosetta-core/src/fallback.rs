//! Fallback lists for namespaces and languages.
//!
//! These produce the ordered namespace and language lists that the cache
//! resolver walks. Order is precedence; duplicates keep their first position.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

/// An optional single value or list.
///
/// Deserializes from `null`, `false`, a string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FallbackList {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl FallbackList {
    /// The values in order.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::One(_) => false,
            Self::Many(values) => values.is_empty(),
        }
    }
}

impl From<&str> for FallbackList {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<String>> for FallbackList {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<&[&str]> for FallbackList {
    fn from(values: &[&str]) -> Self {
        Self::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

impl Serialize for FallbackList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_none(),
            Self::One(value) => serializer.serialize_str(value),
            Self::Many(values) => values.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FallbackList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            One(String),
            Many(Vec<String>),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(false)) => Ok(Self::None),
            Some(Raw::Flag(true)) => Err(de::Error::custom(
                "`true` is not a valid fallback; use a string or list",
            )),
            Some(Raw::One(value)) => Ok(Self::One(value)),
            Some(Raw::Many(values)) => Ok(Self::Many(values)),
        }
    }
}

/// Language fallback configuration.
///
/// Either one list applied to every language, or a per-language map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FallbackLanguages {
    List(FallbackList),
    PerLanguage(BTreeMap<String, FallbackList>),
}

impl Default for FallbackLanguages {
    fn default() -> Self {
        Self::List(FallbackList::None)
    }
}

impl FallbackLanguages {
    /// Fallbacks configured for `language`, excluding the language itself.
    pub fn fallbacks_for(&self, language: &str) -> Vec<String> {
        match self {
            Self::List(list) => list.to_vec(),
            Self::PerLanguage(map) => map.get(language).map(FallbackList::to_vec).unwrap_or_default(),
        }
    }

    /// `[language, ...fallbacks]` without duplicates.
    pub fn languages_for(&self, language: &str) -> Vec<String> {
        let mut chain = vec![language.to_string()];
        chain.extend(self.fallbacks_for(language));
        unique(chain)
    }
}

/// Deduplicate preserving first occurrence.
pub fn unique<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Namespace search order: requested (or default) namespaces, then fallbacks.
pub fn namespace_chain(ns: &FallbackList, default_ns: &str, fallback_ns: &[String]) -> Vec<String> {
    let mut chain = if ns.is_empty() {
        vec![default_ns.to_string()]
    } else {
        ns.to_vec()
    };
    chain.extend(fallback_ns.iter().cloned());
    unique(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_list_to_vec() {
        assert!(FallbackList::None.to_vec().is_empty());
        assert_eq!(FallbackList::from("de").to_vec(), vec!["de"]);
        assert_eq!(
            FallbackList::from(&["a", "b"][..]).to_vec(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_fallback_list_deserialize_shapes() {
        let none: FallbackList = serde_json::from_str("null").unwrap();
        let off: FallbackList = serde_json::from_str("false").unwrap();
        let one: FallbackList = serde_json::from_str("\"en\"").unwrap();
        let many: FallbackList = serde_json::from_str("[\"en\",\"de\"]").unwrap();

        assert_eq!(none, FallbackList::None);
        assert_eq!(off, FallbackList::None);
        assert_eq!(one, FallbackList::One("en".to_string()));
        assert_eq!(many.to_vec(), vec!["en", "de"]);
        assert!(serde_json::from_str::<FallbackList>("true").is_err());
    }

    #[test]
    fn test_languages_for_per_language_map() {
        let config: FallbackLanguages =
            serde_json::from_str(r#"{"de-AT":["de","en"],"cs":"en"}"#).unwrap();

        assert_eq!(config.languages_for("de-AT"), vec!["de-AT", "de", "en"]);
        assert_eq!(config.languages_for("cs"), vec!["cs", "en"]);
        assert_eq!(config.languages_for("fr"), vec!["fr"]);
    }

    #[test]
    fn test_languages_for_dedups_self() {
        let config = FallbackLanguages::List(FallbackList::from(&["en", "de"][..]));
        assert_eq!(config.languages_for("en"), vec!["en", "de"]);
    }

    #[test]
    fn test_unique_preserves_first_occurrence() {
        let values = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(unique(values), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_namespace_chain_uses_default_when_empty() {
        let chain = namespace_chain(&FallbackList::None, "common", &["shared".to_string()]);
        assert_eq!(chain, vec!["common", "shared"]);
    }

    #[test]
    fn test_namespace_chain_explicit() {
        let chain = namespace_chain(
            &FallbackList::from("menu"),
            "common",
            &["menu".to_string(), "shared".to_string()],
        );
        assert_eq!(chain, vec!["menu", "shared"]);
    }
}
