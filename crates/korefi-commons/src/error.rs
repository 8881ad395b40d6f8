//! Error types for korefi-commons
//!
//! One thiserror enum per component, plus the degraded-state indicator the
//! feature flag client reports instead of failing.

use std::path::PathBuf;
use thiserror::Error;

// ===================
// Feature flags
// ===================

/// Why a feature flag refresh failed.
///
/// Never surfaced by `FeatureFlagService::is_on`; the service logs it and
/// keeps serving the previous snapshot.
#[derive(Error, Debug)]
pub enum FlagSourceError {
    #[error("Failed to read feature flag file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse feature flag JSON from {origin}")]
    JsonParse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Feature flag payload from {origin} is not a JSON object")]
    NotAnObject { origin: String },

    #[error("Missing AppConfig identifiers: {}", .missing.join(", "))]
    MissingIdentifiers { missing: Vec<&'static str> },

    #[error("Failed to acquire initial AppConfig token")]
    NoToken,

    #[error("Configuration backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Configuration backend error during {operation}: {message}")]
    Backend { operation: String, message: String },
}

/// Health of the feature flag cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagHealth {
    /// No refresh attempted yet
    Uninitialized,
    /// Last refresh succeeded (or was a no-op fetch)
    Healthy,
    /// Last refresh failed; reads are served from the previous snapshot
    Degraded { reason: String },
}

impl FlagHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, FlagHealth::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FlagHealth::Degraded { .. })
    }
}

// ===================
// Object store backend
// ===================

/// Error reported by an [`ObjectStore`](crate::storage::ObjectStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Object store client error - Code: {code}, Message: {message}")]
    Client { code: String, message: String },

    #[error("Object store connection error: {message}")]
    Connection { message: String },

    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Local file error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object store error: {message}")]
    Other { message: String },
}

impl StoreError {
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Client {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Client and connection errors are worth another attempt.
    ///
    /// A missing object is reported by the store as a client error too, but it
    /// never heals by retrying, so `NotFound` is excluded.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Client { .. } | Self::Connection { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ===================
// Storage client
// ===================

/// Error returned by [`StorageService`](crate::storage::StorageService)
/// uploads and downloads.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to upload {key}: {message}")]
    Upload {
        key: String,
        message: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("Failed to download {key}: {message}")]
    Download {
        key: String,
        message: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("Storage backend unavailable: {0}")]
    Config(#[from] ConfigError),
}

impl StorageError {
    pub(crate) fn upload(key: &str, source: StoreError) -> Self {
        Self::Upload {
            key: key.to_string(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn download(key: &str, source: StoreError) -> Self {
        Self::Download {
            key: key.to_string(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// The backend error behind an upload or download failure, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Upload { source, .. } | Self::Download { source, .. } => source.as_ref(),
            Self::Config(_) => None,
        }
    }
}

// ===================
// Path helpers
// ===================

/// Invalid input to a storage path or URI helper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("Invalid UUID format for {field}: {value}")]
    InvalidUuid { field: &'static str, value: String },

    #[error("Invalid storage URI: {uri} - {reason}")]
    InvalidUri { uri: String, reason: String },
}

// ===================
// Bill schema
// ===================

/// Error raised by the bill schema store.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration failed: {0:#}")]
    Migration(anyhow::Error),

    #[error("Field {field} exceeds {max} characters ({len})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Bill header not found: {id}")]
    HeaderNotFound { id: uuid::Uuid },

    #[error("Corrupt value in column {column}: {value}")]
    CorruptValue { column: &'static str, value: String },
}

// ===================
// Configuration
// ===================

/// Invalid or unloadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::client("500", "boom").is_transient());
        assert!(StoreError::connection("reset by peer").is_transient());
        assert!(!StoreError::not_found("a/b").is_transient());
        assert!(!StoreError::Other {
            message: "bad".into()
        }
        .is_transient());
    }

    #[test]
    fn test_missing_identifiers_message_lists_names() {
        let err = FlagSourceError::MissingIdentifiers {
            missing: vec!["A_ID", "B_ID"],
        };
        assert_eq!(err.to_string(), "Missing AppConfig identifiers: A_ID, B_ID");
    }

    #[test]
    fn test_storage_error_keeps_cause() {
        let err = StorageError::upload("k.json", StoreError::client("500", "Test error"));
        assert!(err.to_string().contains("Test error"));
        assert!(matches!(
            err.store_error(),
            Some(StoreError::Client { code, .. }) if code == "500"
        ));
    }
}
