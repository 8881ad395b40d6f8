//! Amazon S3 backend (feature = "aws")
//!
//! Same blocking model as the AppConfig client: a private current-thread
//! runtime drives each SDK future to completion, on a helper thread when the
//! caller is itself inside a tokio runtime.

use super::backend::{ObjectStore, PutObject};
use crate::config::StorageConfig;
use crate::error::{ConfigError, StoreError};
use crate::runtime;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

const CREDENTIALS_PROVIDER_NAME: &str = "korefi-commons";

/// Blocking S3 client.
///
/// Safe to call from inside a tokio runtime, but each call then blocks the
/// calling worker; async callers should prefer `spawn_blocking`.
pub struct S3ObjectStore {
    client: Client,
    runtime: Runtime,
}

impl S3ObjectStore {
    /// Client for the configured region, with explicit credentials when both
    /// halves are set and the ambient chain otherwise
    pub fn new(config: &StorageConfig) -> Result<Self, ConfigError> {
        let runtime = runtime::backend_runtime().map_err(|e| ConfigError::Invalid {
            message: format!("failed to start S3 runtime: {e}"),
        })?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region_name {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some((access_key_id, secret_access_key)) = config.credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));
        }
        let sdk_config = runtime::block_on(&runtime, loader.load())
            .map_err(|message| ConfigError::Invalid { message })?;

        debug!(
            bucket = %config.bucket_name,
            region = config.region_name.as_deref().unwrap_or("default"),
            explicit_credentials = config.credentials().is_some(),
            "S3 client created"
        );

        Ok(Self {
            client: Client::new(&sdk_config),
            runtime,
        })
    }

    fn run<F, T>(&self, future: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        runtime::block_on(&self.runtime, future).map_err(|message| StoreError::Other { message })?
    }
}

/// Map an SDK failure onto the store taxonomy.
///
/// Service errors become client errors unless they say the object is missing;
/// transport failures become connection errors.
fn classify<E>(key: &str, err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            let code = context
                .err()
                .code()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            if status == 404 || matches!(code.as_str(), "NoSuchKey" | "NotFound" | "404") {
                return StoreError::not_found(key);
            }
            let message = context
                .err()
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
            StoreError::client(code, message)
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            StoreError::connection(DisplayErrorContext(&err).to_string())
        }
        _ => StoreError::Other {
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

impl ObjectStore for S3ObjectStore {
    fn put_object(&self, object: &PutObject) -> Result<(), StoreError> {
        let metadata: HashMap<String, String> = object
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.run(async {
            self.client
                .put_object()
                .bucket(&object.bucket)
                .key(&object.key)
                .body(ByteStream::from(object.body.clone()))
                .content_type(&object.content_type)
                .set_metadata(Some(metadata))
                .send()
                .await
                .map_err(|e| classify(&object.key, e))?;
            Ok(())
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.run(async {
            let output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| classify(key, e))?;

            let body = output.body.collect().await.map_err(|e| {
                StoreError::connection(format!("failed to read body of {key}: {e}"))
            })?;
            Ok(body.into_bytes().to_vec())
        })
    }

    fn download_to(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let bytes = self.get_object(bucket, key)?;
        std::fs::write(local_path, bytes).map_err(|source| StoreError::Io {
            path: local_path.to_path_buf(),
            source,
        })
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.run(async {
            self.client
                .head_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| classify(key, e))?;
            Ok(())
        })
    }

    fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<String>, StoreError> {
        let output = self.run(async {
            self.client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
                .send()
                .await
                .map_err(|e| classify(prefix, e))
        })?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .take(max_keys)
            .collect())
    }
}
