pub mod cloudwatch;
pub mod credentials;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod sigv4;

use crate::source::LogEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cloudwatch::CloudWatchLogsClient;
pub use credentials::{CredentialSource, Credentials, CredentialsError};
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryLogService;

/// Opaque ordering token handed back by a successful append.
pub type SequenceToken = String;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid sequence token (expected {expected:?}): {message}")]
    InvalidSequenceToken {
        expected: Option<SequenceToken>,
        message: String,
    },

    #[error("batch already accepted (expected {expected:?}): {message}")]
    DataAlreadyAccepted {
        expected: Option<SequenceToken>,
        message: String,
    },

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("service returned {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

impl ServiceError {
    /// Errors worth retrying with backoff: throttling, server faults and
    /// transport failures.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Throttled(_) => true,
            ServiceError::Api { status, .. } => *status >= 500,
            ServiceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Indices of events the service dropped from an otherwise accepted batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEventsInfo {
    pub too_new_log_event_start_index: Option<usize>,
    pub too_old_log_event_end_index: Option<usize>,
    pub expired_log_event_end_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutEventsResponse {
    pub next_sequence_token: Option<SequenceToken>,
    pub rejected: Option<RejectedEventsInfo>,
}

/// The remote log-aggregation service.
///
/// Describe calls return every name that starts with `prefix`; implementations
/// follow pagination themselves.
#[async_trait]
pub trait LogService: Send + Sync {
    async fn describe_groups(&self, prefix: &str) -> Result<Vec<String>>;

    async fn create_group(&self, name: &str) -> Result<()>;

    async fn describe_streams(&self, group: &str, prefix: &str) -> Result<Vec<String>>;

    async fn create_stream(&self, group: &str, name: &str) -> Result<()>;

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutEventsResponse>;
}
