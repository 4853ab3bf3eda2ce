//! Configuration types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ConfigError, FallbackLanguages, RosettaResult};

/// Connection properties passed to a dev backend.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl fmt::Debug for DevProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevProps")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace used when a descriptor omits one.
    pub default_ns: String,
    /// Namespaces searched after the requested ones.
    pub fallback_ns: Vec<String>,
    /// Language fallback chain.
    pub fallback_language: FallbackLanguages,
    /// Dev backend connection.
    pub dev: DevProps,
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON text and validate it.
    pub fn from_json_str(json: &str) -> RosettaResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the default namespace.
    pub fn with_default_ns(mut self, ns: impl Into<String>) -> Self {
        self.default_ns = ns.into();
        self
    }

    /// Set the fallback namespaces.
    pub fn with_fallback_ns<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_ns = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Set the language fallback chain.
    pub fn with_fallback_language(mut self, fallback: FallbackLanguages) -> Self {
        self.fallback_language = fallback;
        self
    }

    /// Set the dev backend props.
    pub fn with_dev(mut self, dev: DevProps) -> Self {
        self.dev = dev;
        self
    }

    /// Validate field values.
    pub fn validate(&self) -> RosettaResult<()> {
        if self.default_ns.contains('\\') {
            return Err(ConfigError::InvalidValue {
                field: "default_ns".to_string(),
                value: self.default_ns.clone(),
                reason: "must not contain a backslash".to_string(),
            }
            .into());
        }

        if let Some(url) = &self.dev.api_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "dev.api_url".to_string(),
                    value: url.clone(),
                    reason: "must be an http(s) url".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RosettaError;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::new()
            .with_default_ns("common")
            .with_fallback_ns(["shared"])
            .with_dev(DevProps {
                api_url: Some("https://app.example.com".to_string()),
                api_key: None,
            });

        assert_eq!(config.default_ns, "common");
        assert_eq!(config.fallback_ns, vec!["shared"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_str_partial() {
        let config = CacheConfig::from_json_str(
            r#"{"default_ns":"app","fallback_language":{"de-AT":"de"}}"#,
        )
        .unwrap();
        assert_eq!(config.default_ns, "app");
        assert_eq!(config.fallback_language.languages_for("de-AT"), vec!["de-AT", "de"]);
        assert!(config.fallback_ns.is_empty());
    }

    #[test]
    fn test_from_json_str_rejects_bad_url() {
        let err = CacheConfig::from_json_str(r#"{"dev":{"api_url":"ftp://x"}}"#).unwrap_err();
        assert!(matches!(
            err,
            RosettaError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "dev.api_url"
        ));
    }

    #[test]
    fn test_from_json_str_parse_error() {
        let err = CacheConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, RosettaError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_dev_props_debug_redacts_key() {
        let props = DevProps {
            api_url: None,
            api_key: Some("tgpak_secret".to_string()),
        };
        let out = format!("{:?}", props);
        assert!(!out.contains("tgpak_secret"));
        assert!(out.contains("redacted"));
    }
}
