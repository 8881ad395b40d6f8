//! Directory-backed object store
//!
//! Layout under the root directory:
//! - `<root>/<bucket>/<key>`: object bytes
//! - `<root>/.meta/<bucket>/<key>.json`: content type + user metadata
//!
//! Meant for local development and tests; keys map one-to-one onto relative
//! paths, so `.`/`..` segments and empty segments are rejected.

use super::backend::{ObjectStore, PutObject};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const METADATA_DIR: &str = ".meta";

/// Content type and metadata recorded on put
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObjectInfo {
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content type and metadata of a stored object
    pub fn object_info(&self, bucket: &str, key: &str) -> Result<StoredObjectInfo, StoreError> {
        let path = self.metadata_path(bucket, key)?;
        let bytes = std::fs::read(&path).map_err(|e| map_io(key, &path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Other {
            message: format!("Corrupt metadata for {key}: {e}"),
        })
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty()
            || bucket.starts_with('.')
            || bucket.contains('/')
            || bucket.contains('\\')
        {
            return Err(StoreError::InvalidKey {
                key: bucket.to_string(),
                reason: "invalid bucket name".to_string(),
            });
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.bucket_dir(bucket)?;
        for segment in key_segments(key)? {
            path.push(segment);
        }
        Ok(path)
    }

    fn metadata_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        self.bucket_dir(bucket)?;
        let segments = key_segments(key)?;
        let mut path = self.root.join(METADATA_DIR).join(bucket);
        if let Some((last, parents)) = segments.split_last() {
            for segment in parents {
                path.push(segment);
            }
            path.push(format!("{last}.json"));
        }
        Ok(path)
    }
}

fn key_segments(key: &str) -> Result<Vec<&str>, StoreError> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key cannot be empty"));
    }
    if key.contains('\\') {
        return Err(invalid("backslashes are not allowed"));
    }

    let segments: Vec<&str> = key.split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == "..")
    {
        return Err(invalid("empty, '.' and '..' segments are not allowed"));
    }
    Ok(segments)
}

fn map_io(key: &str, path: &Path, source: io::Error) -> StoreError {
    if source.kind() == io::ErrorKind::NotFound {
        StoreError::not_found(key)
    } else {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let to_store_error = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_store_error)?;
    }
    std::fs::write(path, bytes).map_err(to_store_error)
}

impl ObjectStore for FsObjectStore {
    fn put_object(&self, object: &PutObject) -> Result<(), StoreError> {
        let path = self.object_path(&object.bucket, &object.key)?;
        let meta_path = self.metadata_path(&object.bucket, &object.key)?;

        write_file(&path, &object.body)?;

        let info = StoredObjectInfo {
            content_type: object.content_type.clone(),
            metadata: object.metadata.clone(),
        };
        let meta = serde_json::to_vec_pretty(&info).map_err(|e| StoreError::Other {
            message: format!("Failed to serialize metadata: {e}"),
        })?;
        write_file(&meta_path, &meta)?;

        debug!(path = %path.display(), bytes = object.body.len(), "Stored object");
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        std::fs::read(&path).map_err(|e| map_io(key, &path, e))
    }

    fn download_to(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if !path.is_file() {
            return Err(StoreError::not_found(key));
        }
        std::fs::copy(&path, local_path).map_err(|source| StoreError::Io {
            path: local_path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(StoreError::not_found(key)),
            Err(e) => Err(map_io(key, &path, e)),
        }
    }

    fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys: Vec<String> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&dir).ok()?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                Some(key)
            })
            .filter(|key| key.starts_with(prefix))
            .collect();

        keys.sort();
        keys.truncate(max_keys);
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(store: &FsObjectStore, key: &str, body: &str) {
        store
            .put_object(&PutObject {
                bucket: "bucket".to_string(),
                key: key.to_string(),
                body: body.as_bytes().to_vec(),
                content_type: "text/plain".to_string(),
                metadata: BTreeMap::from([("Owner".to_string(), "tests".to_string())]),
            })
            .unwrap();
    }

    #[test]
    fn test_put_get_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        put(&store, "uc/docs/file.txt", "hello");

        assert_eq!(store.get_object("bucket", "uc/docs/file.txt").unwrap(), b"hello");
        let info = store.object_info("bucket", "uc/docs/file.txt").unwrap();
        assert_eq!(info.content_type, "text/plain");
        assert_eq!(info.metadata["Owner"], "tests");
    }

    #[test]
    fn test_list_keys_is_sorted_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        put(&store, "uc/docs/b.pdf", "b");
        put(&store, "uc/docs/a.pdf", "a");
        put(&store, "uc/images/c.png", "c");

        assert_eq!(
            store.list_keys("bucket", "uc/docs/", 10).unwrap(),
            vec!["uc/docs/a.pdf", "uc/docs/b.pdf"]
        );
        assert_eq!(store.list_keys("bucket", "uc/", 1).unwrap(), vec!["uc/docs/a.pdf"]);
        assert!(store.list_keys("bucket", "other/", 1).unwrap().is_empty());
        assert!(store.list_keys("empty-bucket", "", 1).unwrap().is_empty());
    }

    #[test]
    fn test_metadata_tree_is_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        put(&store, "a.json", "{}");

        assert_eq!(store.list_keys("bucket", "", 10).unwrap(), vec!["a.json"]);
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        assert!(store.head_object("bucket", "nope").unwrap_err().is_not_found());
        assert!(store.get_object("bucket", "nope").unwrap_err().is_not_found());
        assert!(store
            .download_to("bucket", "nope", &dir.path().join("out"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        for key in ["", "../escape", "a//b", "a/./b", "a\\b"] {
            let err = store.get_object("bucket", key).unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "key {key:?}");
            assert!(!err.is_transient());
        }
        assert!(matches!(
            store.get_object(".meta", "a").unwrap_err(),
            StoreError::InvalidKey { .. }
        ));
    }
}
