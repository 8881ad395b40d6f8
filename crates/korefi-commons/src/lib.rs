//! korefi-commons - shared building blocks for KoreFi services
//!
//! Provides a cached feature flag client, a retrying object storage client,
//! storage path helpers and the bill schema store.

pub mod clock;
pub mod config;
pub mod error;
pub mod flags;
pub mod paths;
#[cfg(feature = "aws")]
mod runtime;
pub mod schema;
pub mod storage;

pub use clock::{Clock, SystemClock};
pub use config::{FeatureFlagConfig, StorageConfig};
pub use error::{
    ConfigError, FlagHealth, FlagSourceError, PathError, SchemaError, StorageError, StoreError,
};
pub use flags::FeatureFlagService;
pub use paths::{build_storage_path, build_storage_uri, parse_storage_uri, StorageLocation};
pub use schema::BillDatabase;
pub use storage::{FsObjectStore, ObjectStore, RetryPolicy, StorageService};

pub use korefi_types::{BillHeader, BillLine, Ledger};
