//! Cache key codec.
//!
//! A [`CacheKey`] is the encoded string form of a [`CacheDescriptor`] and is
//! the identity used by every cache map.
//!
//! # String Format
//!
//! - `language` when the namespace is empty
//! - `language:namespace` otherwise
//!
//! This is the documented key shape of static data (`"en"`, `"en:common"`).
//! Inside the language component `:` and `\` are escaped with a backslash;
//! the namespace is everything after the first unescaped `:`, verbatim. A
//! namespace may therefore contain `:` without aliasing another pair.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::CacheDescriptor;

/// Separator between the language and namespace components.
pub const SEPARATOR: char = ':';

/// Escape character for the language component.
const ESCAPE: char = '\\';

/// Encoded cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Encode a descriptor.
    pub fn encode(descriptor: &CacheDescriptor) -> Self {
        let mut out = String::with_capacity(descriptor.language.len() + descriptor.namespace.len() + 1);
        Self::write_encoded(&descriptor.language, &descriptor.namespace, &mut out);
        Self(out)
    }

    /// Encode `(language, namespace)` into a reusable buffer.
    ///
    /// The buffer is cleared first. Lookup loops use this with
    /// `HashMap<CacheKey, _>::get(buf.as_str())` to probe without allocating.
    pub fn write_encoded(language: &str, namespace: &str, out: &mut String) {
        out.clear();
        for c in language.chars() {
            if c == SEPARATOR || c == ESCAPE {
                out.push(ESCAPE);
            }
            out.push(c);
        }
        if !namespace.is_empty() {
            out.push(SEPARATOR);
            out.push_str(namespace);
        }
    }

    /// Decode an arbitrary key string.
    ///
    /// Every string decodes. A trailing lone escape is kept as a literal
    /// backslash in the language.
    pub fn decode(key: &str) -> CacheDescriptor {
        let mut language = String::with_capacity(key.len());
        let mut escaped = false;
        for (idx, c) in key.char_indices() {
            if escaped {
                language.push(c);
                escaped = false;
            } else if c == ESCAPE {
                escaped = true;
            } else if c == SEPARATOR {
                return CacheDescriptor {
                    language,
                    namespace: key[idx + SEPARATOR.len_utf8()..].to_string(),
                };
            } else {
                language.push(c);
            }
        }
        if escaped {
            language.push(ESCAPE);
        }
        CacheDescriptor {
            language,
            namespace: String::new(),
        }
    }

    /// Decode this key back into its descriptor.
    pub fn descriptor(&self) -> CacheDescriptor {
        Self::decode(&self.0)
    }

    /// The encoded string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the encoded string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&CacheDescriptor> for CacheKey {
    fn from(descriptor: &CacheDescriptor) -> Self {
        Self::encode(descriptor)
    }
}

impl FromStr for CacheKey {
    type Err = Infallible;

    /// Parse a key string as written in static data.
    ///
    /// The result is always re-encoded so non-canonical spellings (`"en:"`)
    /// compare equal to their canonical form (`"en"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::encode(&Self::decode(s)))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::encode(&Self::decode(&raw)))
    }
}
