//! Object store backend interface

use crate::error::StoreError;
use std::collections::BTreeMap;
use std::path::Path;

/// A single put request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// User metadata stored alongside the object
    pub metadata: BTreeMap<String, String>,
}

/// Key-addressed blob store, bucket-scoped per call
///
/// Implementations report a missing object as [`StoreError::NotFound`] so the
/// storage client can tell "doesn't exist" apart from "couldn't check".
pub trait ObjectStore: Send + Sync {
    fn put_object(&self, object: &PutObject) -> Result<(), StoreError>;

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    fn download_to(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError>;

    /// Existence probe
    fn head_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Keys starting with `prefix` in lexicographic order, at most `max_keys`
    fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError>;
}
