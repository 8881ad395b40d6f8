//! Flag sources: the local override file and the remote configuration backend

use crate::config::FeatureFlagConfig;
use crate::error::FlagSourceError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Response of a "get latest configuration" poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestConfiguration {
    /// Token for the next poll; `None` keeps the current one
    pub next_token: Option<String>,
    /// JSON document, empty when nothing changed since the last poll
    pub body: Vec<u8>,
}

/// Session-based configuration backend (AWS AppConfig Data protocol)
///
/// `start_session` yields the initial token, every `get_latest` call consumes
/// a token and hands back the next one.
pub trait ConfigDataClient: Send {
    fn start_session(
        &self,
        application: &str,
        environment: &str,
        profile: &str,
    ) -> Result<Option<String>, FlagSourceError>;

    fn get_latest(&self, token: &str) -> Result<LatestConfiguration, FlagSourceError>;
}

/// Builds the backend client on first remote refresh
pub type ConfigClientFactory = Box<
    dyn Fn(&FeatureFlagConfig) -> Result<Box<dyn ConfigDataClient>, FlagSourceError>
        + Send
        + Sync,
>;

/// AppConfig Data client when built with the `aws` feature, an
/// always-failing factory otherwise.
pub fn default_client_factory() -> ConfigClientFactory {
    Box::new(|config: &FeatureFlagConfig| {
        #[cfg(feature = "aws")]
        {
            let client = super::appconfig::AppConfigDataClient::new(&config.region)?;
            Ok(Box::new(client) as Box<dyn ConfigDataClient>)
        }
        #[cfg(not(feature = "aws"))]
        {
            Err(FlagSourceError::BackendUnavailable {
                message: format!(
                    "korefi-commons built without the `aws` feature (region {})",
                    config.region
                ),
            })
        }
    })
}

/// Parse a flag document: a JSON object of flag name to value
pub fn parse_flag_document(
    bytes: &[u8],
    origin: &str,
) -> Result<HashMap<String, Value>, FlagSourceError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|source| FlagSourceError::JsonParse {
            origin: origin.to_string(),
            source,
        })?;

    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(FlagSourceError::NotAnObject {
            origin: origin.to_string(),
        }),
    }
}

/// Read and parse the local override file
pub fn load_local_flags(path: &Path) -> Result<HashMap<String, Value>, FlagSourceError> {
    let bytes = std::fs::read(path).map_err(|source| FlagSourceError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    parse_flag_document(&bytes, &path.display().to_string())
}
