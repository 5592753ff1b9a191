use crate::service::{LogService, PutEventsResponse, SequenceToken, ServiceError};
use crate::ship::identity::StreamIdentity;
use crate::ship::retry::{NoRetry, RetryPolicy};
use crate::source::LogEvent;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("refusing to submit an empty batch")]
    EmptyBatch,

    #[error("sequence token for '{stream}' still rejected after retry: {message}")]
    TokenRetryExhausted { stream: String, message: String },

    #[error("failed to submit batch to '{stream}': {source}")]
    Service {
        stream: String,
        #[source]
        source: ServiceError,
    },
}

/// Appends batches to a stream, threading the sequence token between calls.
pub struct BatchSubmitter {
    service: Arc<dyn LogService>,
    retry: Box<dyn RetryPolicy>,
}

impl BatchSubmitter {
    pub fn new(service: Arc<dyn LogService>) -> Self {
        Self {
            service,
            retry: Box::new(NoRetry),
        }
    }

    /// Retry transient failures with `policy`. Token mismatches are handled
    /// separately and always get exactly one corrected retry.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Box::new(policy);
        self
    }

    /// Append `events` in order and return the token for the next call.
    ///
    /// `token` is what the previous submission to this stream returned, or
    /// `None` for the first one. A stale token is replaced by the one the
    /// service says it expects, once.
    pub async fn submit(
        &self,
        identity: &StreamIdentity,
        events: &[LogEvent],
        token: Option<SequenceToken>,
    ) -> Result<Option<SequenceToken>, SubmitError> {
        if events.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        match self.put(identity, events, token.as_deref()).await {
            Ok(response) => Ok(self.accepted(identity, response)),
            Err(ServiceError::InvalidSequenceToken { expected, message }) => {
                warn!(
                    stream = %identity,
                    sent = ?token,
                    expected = ?expected,
                    message = %message,
                    "Sequence token rejected, retrying with expected token"
                );
                self.retry_with_expected(identity, events, expected).await
            }
            Err(ServiceError::DataAlreadyAccepted { expected, message }) => {
                Ok(already_accepted(identity, expected, &message))
            }
            Err(source) => Err(SubmitError::Service {
                stream: identity.to_string(),
                source,
            }),
        }
    }

    async fn retry_with_expected(
        &self,
        identity: &StreamIdentity,
        events: &[LogEvent],
        expected: Option<SequenceToken>,
    ) -> Result<Option<SequenceToken>, SubmitError> {
        match self.put(identity, events, expected.as_deref()).await {
            Ok(response) => Ok(self.accepted(identity, response)),
            Err(ServiceError::InvalidSequenceToken { message, .. }) => {
                Err(SubmitError::TokenRetryExhausted {
                    stream: identity.to_string(),
                    message,
                })
            }
            Err(ServiceError::DataAlreadyAccepted { expected, message }) => {
                Ok(already_accepted(identity, expected, &message))
            }
            Err(source) => Err(SubmitError::Service {
                stream: identity.to_string(),
                source,
            }),
        }
    }

    /// One logical put, repeated while the retry policy allows.
    async fn put(
        &self,
        identity: &StreamIdentity,
        events: &[LogEvent],
        token: Option<&str>,
    ) -> Result<PutEventsResponse, ServiceError> {
        let mut attempt = 1;

        loop {
            debug!(
                stream = %identity,
                events = events.len(),
                token = ?token,
                attempt = attempt,
                "Submitting batch"
            );

            let error = match self
                .service
                .put_events(&identity.group, &identity.stream, events, token)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            let Some(delay) = self.retry.next_delay(attempt, &error) else {
                return Err(error);
            };

            warn!(
                stream = %identity,
                attempt = attempt,
                backoff_ms = delay.as_millis(),
                error = %error,
                "Submission failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn accepted(&self, identity: &StreamIdentity, response: PutEventsResponse) -> Option<SequenceToken> {
        if let Some(rejected) = &response.rejected {
            warn!(
                stream = %identity,
                too_new_start = ?rejected.too_new_log_event_start_index,
                too_old_end = ?rejected.too_old_log_event_end_index,
                expired_end = ?rejected.expired_log_event_end_index,
                "Service dropped events outside its accepted time range"
            );
        }
        response.next_sequence_token
    }
}

fn already_accepted(
    identity: &StreamIdentity,
    expected: Option<SequenceToken>,
    message: &str,
) -> Option<SequenceToken> {
    warn!(
        stream = %identity,
        message = %message,
        "Batch was already accepted, continuing with expected token"
    );
    expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::memory::{InMemoryLogService, Operation, ServiceCall};
    use crate::ship::retry::ExponentialBackoff;
    use std::time::Duration;

    fn identity() -> StreamIdentity {
        StreamIdentity::new("group", "stream_20240101")
    }

    fn events(n: i64) -> Vec<LogEvent> {
        (0..n)
            .map(|i| LogEvent {
                timestamp_millis: 1_704_067_200_000 + i,
                payload: format!(r#"{{"n":{}}}"#, i),
            })
            .collect()
    }

    fn setup() -> (Arc<InMemoryLogService>, BatchSubmitter) {
        let service = Arc::new(InMemoryLogService::new().with_stream("group", "stream_20240101"));
        let submitter = BatchSubmitter::new(service.clone());
        (service, submitter)
    }

    fn sent_token(call: &ServiceCall) -> Option<String> {
        match call {
            ServiceCall::PutEvents { sequence_token, .. } => sequence_token.clone(),
            other => panic!("not a put: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tokens_thread_between_submissions() {
        let (service, submitter) = setup();

        let mut token = None;
        for _ in 0..3 {
            token = submitter.submit(&identity(), &events(2), token).await.unwrap();
        }

        let puts = service.put_calls();
        assert_eq!(puts.len(), 3);
        assert_eq!(sent_token(&puts[0]), None);
        // Each call carries the token the previous one returned
        assert_eq!(sent_token(&puts[1]), Some("token-1".to_string()));
        assert_eq!(sent_token(&puts[2]), Some("token-2".to_string()));
        assert_eq!(token.as_deref(), Some("token-3"));
        assert_eq!(service.stored_events("group", "stream_20240101").len(), 6);
    }

    #[tokio::test]
    async fn test_stale_token_retried_once_with_expected() {
        let (service, submitter) = setup();
        let expected = service.advance_token("group", "stream_20240101").unwrap();

        let next = submitter.submit(&identity(), &events(1), None).await.unwrap();

        let puts = service.put_calls();
        assert_eq!(puts.len(), 2);
        assert_eq!(sent_token(&puts[0]), None);
        assert_eq!(sent_token(&puts[1]), Some(expected));
        assert!(next.is_some());
        assert_eq!(service.stored_events("group", "stream_20240101").len(), 1);
    }

    #[tokio::test]
    async fn test_second_token_mismatch_is_fatal() {
        let (service, submitter) = setup();
        service.fail_next(
            Operation::PutEvents,
            ServiceError::InvalidSequenceToken {
                expected: Some("a".into()),
                message: "stale".into(),
            },
        );
        service.fail_next(
            Operation::PutEvents,
            ServiceError::InvalidSequenceToken {
                expected: Some("b".into()),
                message: "stale again".into(),
            },
        );

        let err = submitter.submit(&identity(), &events(1), None).await.unwrap_err();

        assert!(matches!(err, SubmitError::TokenRetryExhausted { .. }));
        assert_eq!(service.count(Operation::PutEvents), 2);
        assert!(service.stored_events("group", "stream_20240101").is_empty());
    }

    #[tokio::test]
    async fn test_other_errors_not_retried_by_default() {
        let (service, submitter) = setup();
        service.fail_next(Operation::PutEvents, ServiceError::Throttled("Rate exceeded".into()));

        let err = submitter.submit(&identity(), &events(1), None).await.unwrap_err();

        assert!(matches!(
            err,
            SubmitError::Service {
                source: ServiceError::Throttled(_),
                ..
            }
        ));
        assert_eq!(service.count(Operation::PutEvents), 1);
    }

    #[tokio::test]
    async fn test_retry_policy_covers_transient_errors() {
        let (service, submitter) = setup();
        let submitter = submitter.with_retry_policy(ExponentialBackoff {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        });
        service.fail_next(Operation::PutEvents, ServiceError::Throttled("Rate exceeded".into()));
        service.fail_next(Operation::PutEvents, ServiceError::Throttled("Rate exceeded".into()));

        submitter.submit(&identity(), &events(1), None).await.unwrap();

        assert_eq!(service.count(Operation::PutEvents), 3);
        assert_eq!(service.stored_events("group", "stream_20240101").len(), 1);
    }

    #[tokio::test]
    async fn test_already_accepted_continues_with_expected_token() {
        let (service, submitter) = setup();
        service.fail_next(
            Operation::PutEvents,
            ServiceError::DataAlreadyAccepted {
                expected: Some("after-duplicate".into()),
                message: "The given batch of log events has already been accepted.".into(),
            },
        );

        let next = submitter.submit(&identity(), &events(1), None).await.unwrap();

        assert_eq!(next.as_deref(), Some("after-duplicate"));
        assert_eq!(service.count(Operation::PutEvents), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_without_call() {
        let (service, submitter) = setup();

        let err = submitter.submit(&identity(), &[], None).await.unwrap_err();

        assert!(matches!(err, SubmitError::EmptyBatch));
        assert!(service.calls().is_empty());
    }
}
