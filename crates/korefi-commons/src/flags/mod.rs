//! Feature flag lookup with a 45-second cache
//!
//! Flags come from one of two sources:
//! 1. **Local file** (`feature-flags.json` at the deployment root) - used whenever
//!    it exists, so local development and tests never touch AWS
//! 2. **AWS AppConfig** - polled with a session token when the file is absent
//!
//! ```no_run
//! use korefi_commons::flags::FeatureFlagService;
//!
//! let flags = FeatureFlagService::from_env();
//! if flags.is_on("example-flag", false) {
//!     // ...
//! }
//! ```
//!
//! Reads never fail: a broken source is logged and the previous snapshot (or
//! the caller's default) keeps being served.

#[cfg(feature = "aws")]
pub mod appconfig;
pub mod source;

#[cfg(feature = "aws")]
pub use appconfig::AppConfigDataClient;
pub use source::{
    default_client_factory, load_local_flags, parse_flag_document, ConfigClientFactory,
    ConfigDataClient, LatestConfiguration,
};

use crate::clock::{Clock, SystemClock};
use crate::config::{FeatureFlagConfig, DEFAULT_TTL};
use crate::error::{FlagHealth, FlagSourceError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What a successful refresh did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    /// Cache replaced from the local file
    LocalFile { flags: usize },
    /// Cache replaced from AppConfig
    Remote { flags: usize },
    /// AppConfig had nothing new; cache untouched
    RemoteUnchanged,
}

/// Mutable part of the service, guarded by one lock
struct FlagState {
    flags: HashMap<String, Value>,
    last_refresh: Option<Instant>,
    token: Option<String>,
    client: Option<Box<dyn ConfigDataClient>>,
    health: FlagHealth,
}

/// Cached feature flag client
///
/// Refresh and read happen under the same lock, so one instance can be shared
/// across threads behind an `Arc`.
///
/// `is_on` and `refresh_now` block while a refresh talks to the backend. They
/// are safe to call from inside a tokio runtime, but async callers should wrap
/// them in `spawn_blocking` to keep the worker free.
pub struct FeatureFlagService {
    config: FeatureFlagConfig,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    client_factory: ConfigClientFactory,
    state: Mutex<FlagState>,
}

impl FeatureFlagService {
    pub fn new(config: FeatureFlagConfig) -> Self {
        Self {
            config,
            ttl: DEFAULT_TTL,
            clock: Arc::new(SystemClock),
            client_factory: default_client_factory(),
            state: Mutex::new(FlagState {
                flags: HashMap::new(),
                last_refresh: None,
                token: None,
                client: None,
                health: FlagHealth::Uninitialized,
            }),
        }
    }

    /// Identifiers from `KORE_FEATURE_FLAGS_*`, default local file path
    pub fn from_env() -> Self {
        Self::new(FeatureFlagConfig::from_env())
    }

    /// Replace how the remote backend client is built
    pub fn with_backend_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&FeatureFlagConfig) -> Result<Box<dyn ConfigDataClient>, FlagSourceError>
            + Send
            + Sync
            + 'static,
    {
        self.client_factory = Box::new(factory);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FeatureFlagConfig {
        &self.config
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether `name` is on, falling back to `default` when the flag is missing
    /// or holds something other than a boolean.
    pub fn is_on(&self, name: &str, default: bool) -> bool {
        let mut state = self.state.lock();
        self.refresh_locked(&mut state, false);

        match state.flags.get(name) {
            None => default,
            Some(Value::Bool(value)) => *value,
            Some(other) => {
                warn!(
                    flag = name,
                    value = %other,
                    default,
                    "Feature flag contains non-boolean value, falling back to default"
                );
                default
            }
        }
    }

    /// Refresh immediately, ignoring the TTL window
    pub fn refresh_now(&self) -> FlagHealth {
        let mut state = self.state.lock();
        self.refresh_locked(&mut state, true);
        state.health.clone()
    }

    /// Outcome of the last refresh attempt
    pub fn health(&self) -> FlagHealth {
        self.state.lock().health.clone()
    }

    /// Current cache contents, without refreshing
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.state.lock().flags.clone()
    }

    fn refresh_locked(&self, state: &mut FlagState, force: bool) {
        let now = self.clock.now();

        if !force {
            if let Some(last) = state.last_refresh {
                if now.duration_since(last) < self.ttl {
                    debug!(
                        ttl_secs = self.ttl.as_secs(),
                        "Feature flags refreshed within TTL, skipping refresh"
                    );
                    return;
                }
            }
        }

        let result = self.fetch(state);
        state.last_refresh = Some(now);

        match result {
            Ok(RefreshOutcome::LocalFile { flags }) => {
                info!(
                    path = %self.config.local_path.display(),
                    flags,
                    "Loaded feature flags from local file"
                );
                state.health = FlagHealth::Healthy;
            }
            Ok(RefreshOutcome::Remote { flags }) => {
                info!(flags, "Loaded feature flags from AppConfig");
                state.health = FlagHealth::Healthy;
            }
            Ok(RefreshOutcome::RemoteUnchanged) => {
                debug!("AppConfig returned no new configuration");
                state.health = FlagHealth::Healthy;
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh feature flags");
                state.health = FlagHealth::Degraded {
                    reason: e.to_string(),
                };
            }
        }
    }

    fn fetch(&self, state: &mut FlagState) -> Result<RefreshOutcome, FlagSourceError> {
        let path = &self.config.local_path;
        if path.exists() {
            let flags = load_local_flags(path)?;
            let count = flags.len();
            state.flags = flags;
            return Ok(RefreshOutcome::LocalFile { flags: count });
        }

        self.fetch_remote(state)
    }

    fn fetch_remote(&self, state: &mut FlagState) -> Result<RefreshOutcome, FlagSourceError> {
        let FlagState {
            flags,
            token,
            client,
            ..
        } = state;

        if client.is_none() {
            *client = Some((self.client_factory)(&self.config)?);
        }
        let Some(client) = client.as_deref() else {
            return Err(FlagSourceError::BackendUnavailable {
                message: "configuration client was not created".to_string(),
            });
        };

        let missing = self.config.missing_identifiers();
        if !missing.is_empty() {
            return Err(FlagSourceError::MissingIdentifiers { missing });
        }
        let application = self.config.application_id.as_deref().unwrap_or_default();
        let environment = self.config.environment_id.as_deref().unwrap_or_default();
        let profile = self.config.profile_id.as_deref().unwrap_or_default();

        if token.is_none() {
            *token = client
                .start_session(application, environment, profile)?
                .filter(|t| !t.is_empty());
            debug!(acquired = token.is_some(), "Started AppConfig session");
        }

        let Some(current) = token.clone() else {
            return Err(FlagSourceError::NoToken);
        };

        let latest = client.get_latest(&current)?;
        if let Some(next) = latest.next_token.filter(|t| !t.is_empty()) {
            *token = Some(next);
        }

        if latest.body.is_empty() {
            return Ok(RefreshOutcome::RemoteUnchanged);
        }

        let parsed = parse_flag_document(&latest.body, "AppConfig")?;
        let count = parsed.len();
        *flags = parsed;
        Ok(RefreshOutcome::Remote { flags: count })
    }
}

impl std::fmt::Debug for FeatureFlagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureFlagService")
            .field("config", &self.config)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
