use crate::config::{default_config_locations, load_config, Config};
use crate::service::{CloudWatchLogsClient, CredentialSource, LogService};
use crate::ship::{ExponentialBackoff, RunSummary, ShipOptions, ShippingOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config not found (searched {searched}); use --config <path> or run 'logship config init'")]
    ConfigNotFound { searched: String },

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("credentials error: {0}")]
    Credentials(#[from] crate::service::CredentialsError),

    #[error("service client error: {0}")]
    Client(#[from] crate::service::ServiceError),

    #[error(transparent)]
    Ship(#[from] crate::ship::RunError),
}

pub async fn run(config_path: Option<PathBuf>, dry_run: bool) -> Result<RunSummary, RunError> {
    let config_path = config_path.ok_or_else(|| RunError::ConfigNotFound {
        searched: default_config_locations()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })?;

    run_with_config_file(&config_path, dry_run).await
}

async fn run_with_config_file(config_path: &Path, dry_run: bool) -> Result<RunSummary, RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let credentials = CredentialSource::resolve(&config.credentials, &config.region).await;
    if !dry_run {
        // Surface missing credentials before touching the service
        credentials.credentials().await?;
        info!(origin = %credentials.origin(), "Credentials loaded");
    }

    let service = build_service(&config, credentials)?;
    let mut options = ShipOptions::from(&config);
    options.dry_run = dry_run;

    let mut orchestrator = ShippingOrchestrator::new(service, options)
        .with_retry_policy(ExponentialBackoff::from(&config.retry));

    Ok(orchestrator.run().await?)
}

/// Build the CloudWatch client once; every component shares it.
pub fn build_service(
    config: &Config,
    credentials: CredentialSource,
) -> Result<Arc<dyn LogService>, RunError> {
    let client = CloudWatchLogsClient::new(
        &config.region,
        config.endpoint.as_deref(),
        credentials,
        config.request_timeout,
    )?;

    info!(region = %config.region, endpoint = %client.endpoint(), "Service client ready");
    Ok(Arc::new(client))
}
