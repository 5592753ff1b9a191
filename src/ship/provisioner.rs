use crate::service::{LogService, ServiceError};
use crate::ship::identity::StreamIdentity;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to look up log group '{group}': {source}")]
    DescribeGroups {
        group: String,
        #[source]
        source: ServiceError,
    },

    #[error("failed to create log group '{group}': {source}")]
    CreateGroup {
        group: String,
        #[source]
        source: ServiceError,
    },

    #[error("failed to look up log stream '{stream}' in '{group}': {source}")]
    DescribeStreams {
        group: String,
        stream: String,
        #[source]
        source: ServiceError,
    },

    #[error("failed to create log stream '{stream}' in '{group}': {source}")]
    CreateStream {
        group: String,
        stream: String,
        #[source]
        source: ServiceError,
    },
}

/// Makes sure a group and stream exist before anything is appended.
pub struct StreamProvisioner {
    service: Arc<dyn LogService>,
}

impl StreamProvisioner {
    pub fn new(service: Arc<dyn LogService>) -> Self {
        Self { service }
    }

    /// Create the group and then the stream if either is missing.
    ///
    /// Each resource gets at most one create call. A concurrent creator that
    /// wins the race surfaces as "already exists", which counts as success.
    pub async fn ensure_stream(
        &self,
        identity: &StreamIdentity,
    ) -> Result<StreamIdentity, ProvisionError> {
        self.ensure_group(&identity.group).await?;
        self.ensure_stream_in_group(identity).await?;

        info!(group = %identity.group, stream = %identity.stream, "Log stream ready");
        Ok(identity.clone())
    }

    async fn ensure_group(&self, group: &str) -> Result<(), ProvisionError> {
        let existing = self
            .service
            .describe_groups(group)
            .await
            .map_err(|source| ProvisionError::DescribeGroups {
                group: group.to_string(),
                source,
            })?;

        if existing.iter().any(|name| name == group) {
            debug!(group = %group, "Log group exists");
            return Ok(());
        }

        match self.service.create_group(group).await {
            Ok(()) => {
                info!(group = %group, "Created log group");
                Ok(())
            }
            Err(ServiceError::AlreadyExists(message)) => {
                warn!(group = %group, message = %message, "Log group created concurrently");
                Ok(())
            }
            Err(source) => Err(ProvisionError::CreateGroup {
                group: group.to_string(),
                source,
            }),
        }
    }

    async fn ensure_stream_in_group(&self, identity: &StreamIdentity) -> Result<(), ProvisionError> {
        let StreamIdentity { group, stream } = identity;

        let existing = self
            .service
            .describe_streams(group, stream)
            .await
            .map_err(|source| ProvisionError::DescribeStreams {
                group: group.clone(),
                stream: stream.clone(),
                source,
            })?;

        if existing.iter().any(|name| name == stream) {
            debug!(group = %group, stream = %stream, "Log stream exists");
            return Ok(());
        }

        match self.service.create_stream(group, stream).await {
            Ok(()) => {
                info!(group = %group, stream = %stream, "Created log stream");
                Ok(())
            }
            Err(ServiceError::AlreadyExists(message)) => {
                warn!(group = %group, stream = %stream, message = %message, "Log stream created concurrently");
                Ok(())
            }
            Err(source) => Err(ProvisionError::CreateStream {
                group: group.clone(),
                stream: stream.clone(),
                source,
            }),
        }
    }
}
