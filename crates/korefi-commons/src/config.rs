//! Client configuration
//!
//! - [`FeatureFlagConfig`]: local override file + AppConfig identifiers, read
//!   once from the environment.
//! - [`StorageConfig`]: bucket, credentials and retry tuning. Deserializable from
//!   TOML or JSON so services can keep it next to their other settings.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the AppConfig application identifier
pub const APPLICATION_ENV_VAR: &str = "KORE_FEATURE_FLAGS_APPLICATION_ID";
/// Environment variable holding the AppConfig environment identifier
pub const ENVIRONMENT_ENV_VAR: &str = "KORE_FEATURE_FLAGS_ENVIRONMENT_ID";
/// Environment variable holding the AppConfig configuration profile identifier
pub const PROFILE_ENV_VAR: &str = "KORE_FEATURE_FLAGS_PROFILE_ID";
/// Optional override for the local flag file location
pub const LOCAL_PATH_ENV_VAR: &str = "KORE_FEATURE_FLAGS_LOCAL_PATH";

/// File name of the local development override
pub const DEFAULT_LOCAL_FILE: &str = "feature-flags.json";
/// AppConfig region (Mumbai)
pub const DEFAULT_REGION: &str = "ap-south-1";
/// Refresh window shared by every flag client
pub const DEFAULT_TTL: Duration = Duration::from_secs(45);
/// Upper bound accepted for `initial_wait_seconds` / `max_wait_seconds`
pub const MAX_WAIT_SECONDS_LIMIT: f64 = 3600.0;

/// `<deployment root>/feature-flags.json`, where the deployment root is the
/// process working directory.
pub fn default_local_path() -> PathBuf {
    std::env::current_dir()
        .map(|dir| dir.join(DEFAULT_LOCAL_FILE))
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOCAL_FILE))
}

/// Configuration for the feature flag client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlagConfig {
    /// Local JSON file that, when present, replaces AppConfig entirely
    pub local_path: PathBuf,

    /// AppConfig application identifier
    pub application_id: Option<String>,

    /// AppConfig environment identifier
    pub environment_id: Option<String>,

    /// AppConfig configuration profile identifier
    pub profile_id: Option<String>,

    /// AWS region of the AppConfig Data endpoint
    pub region: String,
}

impl Default for FeatureFlagConfig {
    fn default() -> Self {
        Self {
            local_path: default_local_path(),
            application_id: None,
            environment_id: None,
            profile_id: None,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl FeatureFlagConfig {
    /// Read identifiers (and an optional local path override) from the process
    /// environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        Self {
            local_path: read(LOCAL_PATH_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(default_local_path),
            application_id: read(APPLICATION_ENV_VAR),
            environment_id: read(ENVIRONMENT_ENV_VAR),
            profile_id: read(PROFILE_ENV_VAR),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = path.into();
        self
    }

    pub fn with_identifiers(
        mut self,
        application_id: impl Into<String>,
        environment_id: impl Into<String>,
        profile_id: impl Into<String>,
    ) -> Self {
        self.application_id = Some(application_id.into());
        self.environment_id = Some(environment_id.into());
        self.profile_id = Some(profile_id.into());
        self
    }

    /// Names of the environment variables whose identifier is missing
    pub fn missing_identifiers(&self) -> Vec<&'static str> {
        [
            (APPLICATION_ENV_VAR, &self.application_id),
            (ENVIRONMENT_ENV_VAR, &self.environment_id),
            (PROFILE_ENV_VAR, &self.profile_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_wait_seconds() -> f64 {
    1.0
}

fn default_max_wait_seconds() -> f64 {
    10.0
}

/// Configuration for the storage client
///
/// Credentials are optional; without them the backend falls back to the
/// ambient (environment / instance role) credential chain.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket_name: String,

    #[serde(default)]
    pub aws_access_key_id: Option<String>,

    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    #[serde(default)]
    pub region_name: Option<String>,

    /// Total attempts for retried operations
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff multiplier in seconds
    #[serde(default = "default_initial_wait_seconds")]
    pub initial_wait_seconds: f64,

    /// Upper bound of a single backoff sleep
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: f64,
}

impl StorageConfig {
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            region_name: None,
            max_retries: default_max_retries(),
            initial_wait_seconds: default_initial_wait_seconds(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region_name = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.aws_access_key_id = Some(access_key_id.into());
        self.aws_secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON object (the dict-style config services pass around)
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_name.is_empty() {
            return Err(invalid("bucket_name cannot be empty"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries must be at least 1"));
        }
        for (name, value) in [
            ("initial_wait_seconds", self.initial_wait_seconds),
            ("max_wait_seconds", self.max_wait_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{name} must be a non-negative number")));
            }
            if value > MAX_WAIT_SECONDS_LIMIT {
                return Err(invalid(format!(
                    "{name} must be at most {MAX_WAIT_SECONDS_LIMIT} seconds"
                )));
            }
        }
        if self.aws_access_key_id.is_some() != self.aws_secret_access_key.is_some() {
            return Err(invalid(
                "aws_access_key_id and aws_secret_access_key must be set together",
            ));
        }
        Ok(())
    }

    /// Explicit credentials, when both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

// Keeps the secret key out of logs.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket_name", &self.bucket_name)
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "***"),
            )
            .field("region_name", &self.region_name)
            .field("max_retries", &self.max_retries)
            .field("initial_wait_seconds", &self.initial_wait_seconds)
            .field("max_wait_seconds", &self.max_wait_seconds)
            .finish()
    }
}
