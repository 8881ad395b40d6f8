//! Object storage client
//!
//! [`StorageService`] uploads JSON/XML documents, downloads files and answers
//! existence checks against a single bucket. The actual transport is an
//! [`ObjectStore`] backend:
//! - [`S3ObjectStore`] (feature `aws`), built by [`StorageService::new`]
//! - [`FsObjectStore`] or any other implementation, injected through
//!   [`StorageService::with_store`]
//!
//! Uploads and file downloads go through the service's [`RetryPolicy`]; only
//! transient failures are retried and the final error is wrapped in
//! [`StorageError`].

pub mod backend;
pub mod fs;
pub mod retry;
#[cfg(feature = "aws")]
pub mod s3;

pub use backend::{ObjectStore, PutObject};
pub use fs::{FsObjectStore, StoredObjectInfo};
pub use retry::RetryPolicy;
#[cfg(feature = "aws")]
pub use s3::S3ObjectStore;

use crate::config::StorageConfig;
use crate::error::{ConfigError, StorageError, StoreError};
use crate::paths::parse_storage_uri;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Blocking storage client bound to one bucket
pub struct StorageService {
    config: StorageConfig,
    retry: RetryPolicy,
    store: Arc<dyn ObjectStore>,
}

impl StorageService {
    /// Validate `config` and connect the default backend.
    ///
    /// Every operation blocks the calling thread, including from inside a
    /// tokio runtime; use `spawn_blocking` there.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let store = default_store(&config)?;
        Ok(Self::assemble(config, store))
    }

    /// Validate `config` and use `store` as the backend
    pub fn with_store(
        config: StorageConfig,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, StorageError> {
        config.validate()?;
        Ok(Self::assemble(config, store))
    }

    fn assemble(config: StorageConfig, store: Arc<dyn ObjectStore>) -> Self {
        let retry = RetryPolicy::from_config(&config);
        debug!(bucket = %config.bucket_name, ?retry, "Storage service ready");
        Self {
            config,
            retry,
            store,
        }
    }

    /// Replace the retry policy derived from the config
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn bucket_name(&self) -> &str {
        &self.config.bucket_name
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Serialize `data` as JSON and store it under `key`
    pub fn upload_json<T>(&self, data: &T, key: &str) -> Result<bool, StorageError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(data).map_err(|e| {
            error!(key, error = %e, "Failed to serialize upload payload");
            StorageError::Upload {
                key: key.to_string(),
                message: format!("Failed to serialize JSON: {e}"),
                source: None,
            }
        })?;
        self.upload(body, key, JSON_CONTENT_TYPE)
    }

    /// Store an XML document under `key` as-is
    pub fn upload_xml(&self, data: &str, key: &str) -> Result<bool, StorageError> {
        self.upload(data.as_bytes().to_vec(), key, XML_CONTENT_TYPE)
    }

    fn upload(&self, body: Vec<u8>, key: &str, content_type: &str) -> Result<bool, StorageError> {
        let bucket = self.bucket_name();

        self.retry
            .run("upload", |attempt| {
                let object = PutObject {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    body: body.clone(),
                    content_type: content_type.to_string(),
                    metadata: upload_metadata(content_type, attempt),
                };
                self.store.put_object(&object)
            })
            .map_err(|e| {
                log_store_error("upload", &e);
                StorageError::upload(key, e)
            })?;

        info!(bucket, key, content_type, "Successfully uploaded object");
        Ok(true)
    }

    /// Download `key` to `local_path`.
    ///
    /// The key is resolved by prefix first, so an extension-less key finds the
    /// stored object. With no match the literal key is tried.
    pub fn download_file(
        &self,
        key: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<bool, StorageError> {
        let local_path = local_path.as_ref();
        let bucket = self.bucket_name();
        info!(bucket, key, local_path = %local_path.display(), "Start download");

        let resolved = self
            .retry
            .run("download", |_| {
                let resolved = match self.find_actual_file_key(key)? {
                    Some(found) => found,
                    None => {
                        warn!(bucket, key, "No object matches prefix, using key as-is");
                        key.to_string()
                    }
                };
                self.store.download_to(bucket, &resolved, local_path)?;
                Ok(resolved)
            })
            .map_err(|e| {
                log_store_error("download", &e);
                StorageError::download(key, e)
            })?;

        info!(key = %resolved, local_path = %local_path.display(), "Successfully downloaded object");
        Ok(true)
    }

    /// Fetch and decode a JSON document addressed by `s3://bucket/key`.
    ///
    /// Not retried; the key must match exactly.
    pub fn download_json(&self, uri: &str) -> Result<serde_json::Value, StorageError> {
        let location = parse_storage_uri(uri).map_err(|e| StorageError::Download {
            key: uri.to_string(),
            message: e.to_string(),
            source: None,
        })?;

        let bytes = self
            .store
            .get_object(&location.bucket, &location.key)
            .map_err(|e| {
                log_store_error("download_json", &e);
                StorageError::download(&location.key, e)
            })?;

        let text = String::from_utf8(bytes).map_err(|e| StorageError::Download {
            key: location.key.clone(),
            message: format!("Object is not valid UTF-8: {e}"),
            source: None,
        })?;

        serde_json::from_str(&text).map_err(|e| StorageError::Download {
            key: location.key.clone(),
            message: format!("Object is not valid JSON: {e}"),
            source: None,
        })
    }

    /// `Ok(false)` when the object is missing; other backend errors are
    /// returned unchanged.
    pub fn check_file_exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.store.head_object(self.bucket_name(), key) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// First stored key starting with `prefix`
    pub fn find_actual_file_key(&self, prefix: &str) -> Result<Option<String>, StoreError> {
        let keys = self.store.list_keys(self.bucket_name(), prefix, 1)?;
        Ok(keys.into_iter().next())
    }
}

impl fmt::Debug for StorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageService")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn upload_metadata(content_type: &str, attempt: u32) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ContentType".to_string(), content_type.to_string()),
        ("NumberOfRetries".to_string(), attempt.to_string()),
    ])
}

fn log_store_error(operation: &str, err: &StoreError) {
    match err {
        StoreError::Client { code, message } => {
            error!(operation, code = %code, message = %message, "Object store client error");
        }
        other => error!(operation, error = %other, "Object store operation failed"),
    }
}

#[cfg(feature = "aws")]
fn default_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    Ok(Arc::new(S3ObjectStore::new(config)?))
}

#[cfg(not(feature = "aws"))]
fn default_store(_config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    Err(ConfigError::Invalid {
        message: "no default object store without the `aws` feature; \
                  use StorageService::with_store"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_metadata_records_attempt() {
        let metadata = upload_metadata(JSON_CONTENT_TYPE, 0);
        assert_eq!(metadata["ContentType"], "application/json");
        assert_eq!(metadata["NumberOfRetries"], "0");
        assert_eq!(upload_metadata(XML_CONTENT_TYPE, 2)["NumberOfRetries"], "2");
    }

    #[cfg(not(feature = "aws"))]
    #[test]
    fn test_new_without_backend_is_config_error() {
        let err = StorageService::new(StorageConfig::new("bucket")).unwrap_err();
        assert!(matches!(err, StorageError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_backend() {
        let dir = tempfile::tempdir().unwrap();
        let err = StorageService::with_store(
            StorageConfig::new(""),
            Arc::new(FsObjectStore::new(dir.path())),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_huge_wait_is_config_error_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorageConfig::new("bucket");
        config.max_wait_seconds = 1e20;

        let err = StorageService::with_store(config, Arc::new(FsObjectStore::new(dir.path())))
            .unwrap_err();
        assert!(matches!(err, StorageError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_find_actual_file_key_on_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()));
        let service = StorageService::with_store(StorageConfig::new("bucket"), store)
            .unwrap()
            .with_retry_policy(RetryPolicy::no_wait(3));

        service.upload_xml("<a/>", "uc/docs/file.xml").unwrap();

        assert_eq!(
            service.find_actual_file_key("uc/docs/file").unwrap().as_deref(),
            Some("uc/docs/file.xml")
        );
        assert_eq!(service.find_actual_file_key("uc/none").unwrap(), None);
    }
}
