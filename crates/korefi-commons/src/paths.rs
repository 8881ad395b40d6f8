//! Storage key and URI helpers
//!
//! Keys are namespaced by use case: `<uc_uuid>/<file_category>/<file_uuid>`.

use crate::error::PathError;
use std::fmt;
use uuid::Uuid;

const URI_SCHEME: &str = "s3://";

/// `<uc_uuid>/<file_category>/<file_uuid>`
///
/// Components are used verbatim; only emptiness is checked.
pub fn build_storage_path(
    file_uuid: &str,
    file_category: &str,
    uc_uuid: &str,
) -> Result<String, PathError> {
    require("file_uuid", file_uuid)?;
    require("file_category", file_category)?;
    require("uc_uuid", uc_uuid)?;

    Ok(format!("{uc_uuid}/{file_category}/{file_uuid}"))
}

/// `s3://<bucket>/<uc_uuid>/<file_category>/<file_uuid>`
///
/// Both identifiers must parse as UUIDs; they are emitted as given.
pub fn build_storage_uri(
    bucket_name: &str,
    uc_uuid: &str,
    file_category: &str,
    file_uuid: &str,
) -> Result<String, PathError> {
    require("bucket_name", bucket_name)?;
    require("file_category", file_category)?;
    require_uuid("uc_uuid", uc_uuid)?;
    require_uuid("file_uuid", file_uuid)?;

    Ok(format!(
        "{URI_SCHEME}{bucket_name}/{uc_uuid}/{file_category}/{file_uuid}"
    ))
}

/// Bucket + key pair addressed by a storage URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{URI_SCHEME}{}/{}", self.bucket, self.key)
    }
}

/// Split `s3://bucket/key` into its bucket and key
pub fn parse_storage_uri(uri: &str) -> Result<StorageLocation, PathError> {
    let invalid = |reason: &str| PathError::InvalidUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };

    let rest = uri
        .strip_prefix(URI_SCHEME)
        .ok_or_else(|| invalid("expected s3:// scheme"))?;
    let (bucket, key) = rest
        .split_once('/')
        .ok_or_else(|| invalid("missing object key"))?;

    if bucket.is_empty() {
        return Err(invalid("missing bucket name"));
    }
    if key.is_empty() {
        return Err(invalid("missing object key"));
    }

    Ok(StorageLocation {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

fn require(field: &'static str, value: &str) -> Result<(), PathError> {
    if value.is_empty() {
        Err(PathError::EmptyField { field })
    } else {
        Ok(())
    }
}

fn require_uuid(field: &'static str, value: &str) -> Result<(), PathError> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| PathError::InvalidUuid {
            field,
            value: value.to_string(),
        })
}
