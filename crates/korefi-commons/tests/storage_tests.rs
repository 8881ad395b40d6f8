//! Integration tests for the storage client against fake and directory-backed stores

use korefi_commons::storage::{
    FsObjectStore, ObjectStore, PutObject, RetryPolicy, StorageService, JSON_CONTENT_TYPE,
    XML_CONTENT_TYPE,
};
use korefi_commons::{StorageConfig, StorageError, StoreError};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

/// In-memory store that records calls and can fail on demand
#[derive(Default)]
struct FakeStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    puts: Mutex<Vec<PutObject>>,
    downloads: Mutex<Vec<String>>,
    put_failures: Mutex<VecDeque<StoreError>>,
    download_failures: Mutex<VecDeque<StoreError>>,
    head_failure: Mutex<Option<StoreError>>,
}

impl FakeStore {
    fn insert(&self, bucket: &str, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
    }

    fn fail_puts(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.put_failures.lock().extend(errors);
    }

    fn fail_downloads(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.download_failures.lock().extend(errors);
    }
}

impl ObjectStore for FakeStore {
    fn put_object(&self, object: &PutObject) -> Result<(), StoreError> {
        self.puts.lock().push(object.clone());
        if let Some(err) = self.put_failures.lock().pop_front() {
            return Err(err);
        }
        self.insert(&object.bucket, &object.key, &object.body);
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn download_to(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        self.downloads.lock().push(key.to_string());
        if let Some(err) = self.download_failures.lock().pop_front() {
            return Err(err);
        }
        let body = self.get_object(bucket, key)?;
        std::fs::write(local_path, body).map_err(|source| StoreError::Io {
            path: local_path.to_path_buf(),
            source,
        })
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        if let Some(err) = self.head_failure.lock().take() {
            return Err(err);
        }
        self.get_object(bucket, key).map(|_| ())
    }

    fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .take(max_keys)
            .collect())
    }
}

fn service(store: Arc<FakeStore>) -> StorageService {
    StorageService::with_store(StorageConfig::new("test-bucket"), store)
        .unwrap()
        .with_retry_policy(RetryPolicy::no_wait(3))
}

#[test]
fn test_upload_json_puts_once_with_metadata() {
    let store = Arc::new(FakeStore::default());
    let service = service(store.clone());

    assert!(service
        .upload_json(&json!({"test": "data"}), "test/file.json")
        .unwrap());

    let puts = store.puts.lock();
    assert_eq!(puts.len(), 1);
    let put = &puts[0];
    assert_eq!(put.bucket, "test-bucket");
    assert_eq!(put.key, "test/file.json");
    assert_eq!(put.body, br#"{"test":"data"}"#);
    assert_eq!(put.content_type, JSON_CONTENT_TYPE);
    assert_eq!(put.metadata["ContentType"], "application/json");
    assert_eq!(put.metadata["NumberOfRetries"], "0");
}

#[test]
fn test_upload_retries_transient_errors_then_fails() {
    let store = Arc::new(FakeStore::default());
    store.fail_puts((0..3).map(|_| StoreError::client("500", "Test error")));
    let service = service(store.clone());

    let err = service
        .upload_json(&json!({"test": "data"}), "test/file.json")
        .unwrap_err();

    assert!(matches!(err, StorageError::Upload { ref key, .. } if key == "test/file.json"));
    assert!(err.to_string().contains("Test error"));
    assert_eq!(store.puts.lock().len(), 3);
}

#[test]
fn test_upload_succeeds_on_second_attempt() {
    let store = Arc::new(FakeStore::default());
    store.fail_puts([StoreError::connection("connection reset")]);
    let service = service(store.clone());

    assert!(service.upload_json(&json!([1, 2, 3]), "a.json").unwrap());

    let puts = store.puts.lock();
    assert_eq!(puts.len(), 2);
    assert_eq!(puts[1].metadata["NumberOfRetries"], "1");
}

#[test]
fn test_upload_does_not_retry_permanent_errors() {
    let store = Arc::new(FakeStore::default());
    store.fail_puts([StoreError::Other {
        message: "access denied by policy".to_string(),
    }]);
    let service = service(store.clone());

    let err = service.upload_xml("<a/>", "a.xml").unwrap_err();

    assert!(matches!(err, StorageError::Upload { .. }));
    assert_eq!(store.puts.lock().len(), 1);
}

#[test]
fn test_upload_xml_content_type() {
    let store = Arc::new(FakeStore::default());
    let service = service(store.clone());
    let xml = r#"<?xml version="1.0"?><invoice id="1"/>"#;

    assert!(service.upload_xml(xml, "uc/invoices/1.xml").unwrap());

    let puts = store.puts.lock();
    assert_eq!(puts[0].body, xml.as_bytes());
    assert_eq!(puts[0].content_type, XML_CONTENT_TYPE);
    assert_eq!(puts[0].metadata["ContentType"], "application/xml");
}

#[test]
fn test_check_file_exists() {
    let store = Arc::new(FakeStore::default());
    store.insert("test-bucket", "present.json", b"{}");
    let service = service(store.clone());

    assert!(service.check_file_exists("present.json").unwrap());
    assert!(!service.check_file_exists("absent.json").unwrap());
}

#[test]
fn test_check_file_exists_propagates_other_errors() {
    let store = Arc::new(FakeStore::default());
    *store.head_failure.lock() = Some(StoreError::client("403", "Forbidden"));
    let service = service(store);

    let err = service.check_file_exists("secret.json").unwrap_err();
    assert!(matches!(err, StoreError::Client { ref code, .. } if code == "403"));
}

#[test]
fn test_find_actual_file_key() {
    let store = Arc::new(FakeStore::default());
    store.insert("test-bucket", "uc/docs/file-1.pdf", b"pdf");
    store.insert("other-bucket", "uc/docs/file-0.pdf", b"pdf");
    let service = service(store);

    assert_eq!(
        service.find_actual_file_key("uc/docs/file").unwrap(),
        Some("uc/docs/file-1.pdf".to_string())
    );
    assert_eq!(service.find_actual_file_key("uc/none").unwrap(), None);
}

#[test]
fn test_download_file_resolves_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FakeStore::default());
    store.insert("test-bucket", "uc/docs/abc.pdf", b"%PDF");
    let service = service(store.clone());
    let target = dir.path().join("abc.pdf");

    assert!(service.download_file("uc/docs/abc", &target).unwrap());

    assert_eq!(std::fs::read(&target).unwrap(), b"%PDF");
    assert_eq!(*store.downloads.lock(), vec!["uc/docs/abc.pdf"]);
}

#[test]
fn test_download_file_retries_transient_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FakeStore::default());
    store.insert("test-bucket", "uc/docs/abc.pdf", b"%PDF");
    store.fail_downloads([StoreError::connection("connection reset")]);
    let service = service(store.clone());
    let target = dir.path().join("abc.pdf");

    assert!(service.download_file("uc/docs/abc", &target).unwrap());

    assert_eq!(std::fs::read(&target).unwrap(), b"%PDF");
    assert_eq!(
        *store.downloads.lock(),
        vec!["uc/docs/abc.pdf", "uc/docs/abc.pdf"]
    );
}

#[test]
fn test_download_file_gives_up_after_max_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FakeStore::default());
    store.insert("test-bucket", "uc/docs/abc.pdf", b"%PDF");
    store.fail_downloads((0..3).map(|_| StoreError::connection("connection reset")));
    let service = service(store.clone());
    let target = dir.path().join("abc.pdf");

    let err = service.download_file("uc/docs/abc", &target).unwrap_err();

    assert!(matches!(err, StorageError::Download { .. }));
    assert_eq!(store.downloads.lock().len(), 3);
    assert!(!target.exists());
}

#[test]
fn test_download_file_missing_is_download_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FakeStore::default());
    let service = service(store.clone());

    let err = service
        .download_file("uc/docs/missing", dir.path().join("out"))
        .unwrap_err();

    assert!(matches!(err, StorageError::Download { .. }));
    assert!(err.store_error().is_some_and(StoreError::is_not_found));
    // Not-found is permanent: one attempt, using the literal key
    assert_eq!(*store.downloads.lock(), vec!["uc/docs/missing"]);
}

#[test]
fn test_download_json_reads_uri_bucket() {
    let store = Arc::new(FakeStore::default());
    store.insert("reports", "uc/summary.json", br#"{"total": 42}"#);
    let service = service(store);

    let value = service.download_json("s3://reports/uc/summary.json").unwrap();
    assert_eq!(value, json!({"total": 42}));
}

#[test]
fn test_download_json_failures() {
    let store = Arc::new(FakeStore::default());
    store.insert("reports", "bad.json", b"not json");
    let service = service(store);

    for uri in [
        "https://reports/bad.json",
        "s3://reports/bad.json",
        "s3://reports/missing.json",
    ] {
        assert!(
            matches!(service.download_json(uri), Err(StorageError::Download { .. })),
            "uri {uri}"
        );
    }
}

#[test]
fn test_fs_store_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let store = Arc::new(FsObjectStore::new(root.path()));
    let service = StorageService::with_store(StorageConfig::new("documents"), store.clone())
        .unwrap()
        .with_retry_policy(RetryPolicy::no_wait(3));

    service
        .upload_json(&json!({"invoice": 1}), "uc/invoices/inv-1.json")
        .unwrap();

    assert!(service.check_file_exists("uc/invoices/inv-1.json").unwrap());
    assert!(!service.check_file_exists("uc/invoices/inv-2.json").unwrap());

    let target = out.path().join("inv.json");
    service.download_file("uc/invoices/inv-1", &target).unwrap();
    let downloaded: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&target).unwrap()).unwrap();
    assert_eq!(downloaded, json!({"invoice": 1}));

    let info = store.object_info("documents", "uc/invoices/inv-1.json").unwrap();
    assert_eq!(info.content_type, JSON_CONTENT_TYPE);
    assert_eq!(info.metadata["NumberOfRetries"], "0");

    assert_eq!(
        service
            .download_json("s3://documents/uc/invoices/inv-1.json")
            .unwrap(),
        json!({"invoice": 1})
    );
}
