//! AWS AppConfig Data backend (feature = "aws")
//!
//! The SDK is async; every call is driven to completion on a private
//! current-thread runtime so the flag client stays blocking. Calls made from
//! inside another tokio runtime run on a helper thread (see `crate::runtime`).

use super::source::{ConfigDataClient, LatestConfiguration};
use crate::error::FlagSourceError;
use crate::runtime;
use aws_sdk_appconfigdata::config::Region;
use aws_sdk_appconfigdata::error::DisplayErrorContext;
use aws_sdk_appconfigdata::Client;
use tokio::runtime::Runtime;

/// Blocking AppConfig Data client; usable from sync code and from inside a
/// tokio runtime
pub struct AppConfigDataClient {
    client: Client,
    runtime: Runtime,
}

impl AppConfigDataClient {
    /// Client for `region` using the ambient credential chain
    pub fn new(region: &str) -> Result<Self, FlagSourceError> {
        let runtime =
            runtime::backend_runtime().map_err(|e| FlagSourceError::BackendUnavailable {
                message: format!("failed to start AppConfig runtime: {e}"),
            })?;

        let sdk_config = runtime::block_on(
            &runtime,
            aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load(),
        )
        .map_err(|message| FlagSourceError::BackendUnavailable { message })?;

        tracing::debug!(region, "AppConfig Data client created");

        Ok(Self {
            client: Client::new(&sdk_config),
            runtime,
        })
    }
}

fn backend_error<E>(operation: &str, err: E) -> FlagSourceError
where
    E: std::error::Error,
{
    FlagSourceError::Backend {
        operation: operation.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

impl ConfigDataClient for AppConfigDataClient {
    fn start_session(
        &self,
        application: &str,
        environment: &str,
        profile: &str,
    ) -> Result<Option<String>, FlagSourceError> {
        let output = runtime::block_on(
            &self.runtime,
            self.client
                .start_configuration_session()
                .application_identifier(application)
                .environment_identifier(environment)
                .configuration_profile_identifier(profile)
                .send(),
        )
        .map_err(|message| FlagSourceError::BackendUnavailable { message })?
        .map_err(|e| backend_error("StartConfigurationSession", e))?;

        Ok(output.initial_configuration_token().map(str::to_string))
    }

    fn get_latest(&self, token: &str) -> Result<LatestConfiguration, FlagSourceError> {
        let output = runtime::block_on(
            &self.runtime,
            self.client
                .get_latest_configuration()
                .configuration_token(token)
                .send(),
        )
        .map_err(|message| FlagSourceError::BackendUnavailable { message })?
        .map_err(|e| backend_error("GetLatestConfiguration", e))?;

        Ok(LatestConfiguration {
            next_token: output.next_poll_configuration_token().map(str::to_string),
            body: output
                .configuration()
                .map(|blob| blob.as_ref().to_vec())
                .unwrap_or_default(),
        })
    }
}
