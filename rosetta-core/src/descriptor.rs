//! Descriptor types identifying one translation page.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::CacheKey;

/// A single stored translation.
///
/// `Some` holds the text, `None` is an explicit "no translation" marker.
/// Map absence is one level up: lookups return `Option<TranslationValue>`.
pub type TranslationValue = Option<String>;

/// Flat mapping from joined key path to translation.
pub type FlatTranslations = HashMap<String, TranslationValue>;

/// Fully-qualified descriptor of one `(language, namespace)` page.
///
/// An empty namespace is the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheDescriptor {
    pub language: String,
    #[serde(default)]
    pub namespace: String,
}

impl CacheDescriptor {
    /// Create a descriptor for an explicit namespace.
    pub fn new(language: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a descriptor for the default (empty) namespace.
    pub fn default_ns(language: impl Into<String>) -> Self {
        Self::new(language, String::new())
    }

    /// Whether this descriptor addresses the default namespace.
    pub fn is_default_ns(&self) -> bool {
        self.namespace.is_empty()
    }
}

/// Formats as the encoded [`CacheKey`], so distinct descriptors never print alike.
impl fmt::Display for CacheDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&CacheKey::encode(self), f)
    }
}

/// Caller-facing descriptor whose namespace may be omitted.
///
/// Normalized into a [`CacheDescriptor`] with the configured default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorRequest {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl DescriptorRequest {
    /// Request a language in the default namespace.
    pub fn language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            namespace: None,
        }
    }

    /// Request a language in an explicit namespace.
    pub fn with_namespace(language: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Fill in the namespace with `default_ns` when absent.
    pub fn with_default_ns(&self, default_ns: &str) -> CacheDescriptor {
        CacheDescriptor {
            language: self.language.clone(),
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| default_ns.to_string()),
        }
    }
}

impl From<&str> for DescriptorRequest {
    fn from(language: &str) -> Self {
        Self::language(language)
    }
}

impl From<CacheDescriptor> for DescriptorRequest {
    fn from(descriptor: CacheDescriptor) -> Self {
        Self {
            language: descriptor.language,
            namespace: Some(descriptor.namespace),
        }
    }
}

impl From<&CacheDescriptor> for DescriptorRequest {
    fn from(descriptor: &CacheDescriptor) -> Self {
        descriptor.clone().into()
    }
}

/// One exported record from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordExport {
    pub language: String,
    pub namespace: String,
    pub data: Arc<FlatTranslations>,
}

impl RecordExport {
    /// The descriptor this record is stored under.
    pub fn descriptor(&self) -> CacheDescriptor {
        CacheDescriptor::new(self.language.clone(), self.namespace.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_default_ns_fills_missing_namespace() {
        let request = DescriptorRequest::language("en");
        assert_eq!(
            request.with_default_ns("common"),
            CacheDescriptor::new("en", "common")
        );
    }

    #[test]
    fn test_with_default_ns_keeps_explicit_namespace() {
        let request = DescriptorRequest::with_namespace("en", "");
        assert_eq!(request.with_default_ns("common"), CacheDescriptor::default_ns("en"));
    }

    #[test]
    fn test_descriptor_display() {
        assert_eq!(CacheDescriptor::default_ns("de").to_string(), "de");
        assert_eq!(CacheDescriptor::new("de", "menu").to_string(), "de:menu");
    }

    #[test]
    fn test_descriptor_display_escapes_language() {
        let colon_language = CacheDescriptor::new("en:a", "b");
        let colon_namespace = CacheDescriptor::new("en", "a:b");

        assert_eq!(colon_language.to_string(), "en\\:a:b");
        assert_eq!(colon_namespace.to_string(), "en:a:b");
        assert_ne!(colon_language.to_string(), colon_namespace.to_string());
    }

    #[test]
    fn test_descriptor_deserializes_without_namespace() {
        let d: CacheDescriptor = serde_json::from_str(r#"{"language":"cs"}"#).unwrap();
        assert!(d.is_default_ns());
        assert_eq!(d.language, "cs");
    }
}
