//! Error types for ROSETTA operations

use thiserror::Error;

/// Backend and fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Fetch failed for {language}:{namespace}: {reason}")]
    FetchFailed {
        language: String,
        namespace: String,
        reason: String,
    },

    #[error("Dev backend fetch failed for {language}:{namespace}: {reason}")]
    DevFetchFailed {
        language: String,
        namespace: String,
        reason: String,
    },

    #[error("Lazy static data for {key} failed: {reason}")]
    LazyStaticFailed { key: String, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid translation tree: {reason}")]
    InvalidTree { reason: String },

    #[error("Invalid static data key: {key:?}")]
    InvalidStaticKey { key: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config parse failed: {reason}")]
    Parse { reason: String },
}

/// Master error type for all ROSETTA errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosettaError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for ROSETTA operations.
pub type RosettaResult<T> = Result<T, RosettaError>;

// =============================================================================
// TESTS
// =============================================================================
