use super::{LogService, PutEventsResponse, Result, SequenceToken, ServiceError};
use crate::source::LogEvent;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// Which remote operation a call or an injected failure targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeGroups,
    CreateGroup,
    DescribeStreams,
    CreateStream,
    PutEvents,
}

/// One recorded call against [`InMemoryLogService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    DescribeGroups {
        prefix: String,
    },
    CreateGroup {
        name: String,
    },
    DescribeStreams {
        group: String,
        prefix: String,
    },
    CreateStream {
        group: String,
        name: String,
    },
    PutEvents {
        group: String,
        stream: String,
        events: Vec<LogEvent>,
        sequence_token: Option<SequenceToken>,
    },
}

impl ServiceCall {
    pub fn operation(&self) -> Operation {
        match self {
            ServiceCall::DescribeGroups { .. } => Operation::DescribeGroups,
            ServiceCall::CreateGroup { .. } => Operation::CreateGroup,
            ServiceCall::DescribeStreams { .. } => Operation::DescribeStreams,
            ServiceCall::CreateStream { .. } => Operation::CreateStream,
            ServiceCall::PutEvents { .. } => Operation::PutEvents,
        }
    }
}

#[derive(Debug, Default)]
struct StreamState {
    events: Vec<LogEvent>,
    expected_token: Option<SequenceToken>,
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<String, BTreeMap<String, StreamState>>,
    calls: Vec<ServiceCall>,
    failures: HashMap<Operation, VecDeque<ServiceError>>,
    concurrent_creator: bool,
    tokens_issued: u64,
}

/// In-process stand-in for the aggregation service.
///
/// Enforces sequence tokens the way the real service does, records every call,
/// and lets callers queue failures per operation.
#[derive(Debug, Default)]
pub struct InMemoryLogService {
    state: Mutex<State>,
}

impl InMemoryLogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing group.
    pub fn with_group(self, group: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .groups
            .entry(group.to_string())
            .or_default();
        self
    }

    /// Seed an existing stream (and its group).
    pub fn with_stream(self, group: &str, stream: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .groups
            .entry(group.to_string())
            .or_default()
            .entry(stream.to_string())
            .or_default();
        self
    }

    /// Make the next call to `operation` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, operation: Operation, error: ServiceError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Simulate another process creating resources between our describe and
    /// create: every create succeeds on the remote side but answers
    /// "already exists".
    pub fn set_concurrent_creator(&self, enabled: bool) {
        self.state.lock().unwrap().concurrent_creator = enabled;
    }

    /// Simulate another writer appending to the stream, which moves the
    /// expected token forward.
    pub fn advance_token(&self, group: &str, stream: &str) -> Option<SequenceToken> {
        let mut state = self.state.lock().unwrap();
        state.tokens_issued += 1;
        let token = format!("token-{}", state.tokens_issued);
        let entry = state.groups.get_mut(group)?.get_mut(stream)?;
        entry.expected_token = Some(token.clone());
        Some(token)
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn put_calls(&self) -> Vec<ServiceCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation() == Operation::PutEvents)
            .collect()
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.state.lock().unwrap().groups.contains_key(group)
    }

    pub fn has_stream(&self, group: &str, stream: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(group)
            .is_some_and(|streams| streams.contains_key(stream))
    }

    /// Every event stored in a stream, in append order.
    pub fn stored_events(&self, group: &str, stream: &str) -> Vec<LogEvent> {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(group)
            .and_then(|streams| streams.get(stream))
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: ServiceCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let operation = call.operation();
        state.calls.push(call);
        match state.failures.get_mut(&operation).and_then(|q| q.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn not_found(message: String) -> ServiceError {
    ServiceError::Api {
        status: 400,
        code: "ResourceNotFoundException".to_string(),
        message,
    }
}

#[async_trait]
impl LogService for InMemoryLogService {
    async fn describe_groups(&self, prefix: &str) -> Result<Vec<String>> {
        self.record(ServiceCall::DescribeGroups {
            prefix: prefix.to_string(),
        })?;

        let state = self.state.lock().unwrap();
        Ok(state
            .groups
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn create_group(&self, name: &str) -> Result<()> {
        self.record(ServiceCall::CreateGroup {
            name: name.to_string(),
        })?;

        let mut state = self.state.lock().unwrap();
        if state.groups.contains_key(name) {
            return Err(ServiceError::AlreadyExists(format!(
                "The specified log group already exists: {}",
                name
            )));
        }
        state.groups.insert(name.to_string(), BTreeMap::new());
        if state.concurrent_creator {
            return Err(ServiceError::AlreadyExists(format!(
                "The specified log group already exists: {}",
                name
            )));
        }
        Ok(())
    }

    async fn describe_streams(&self, group: &str, prefix: &str) -> Result<Vec<String>> {
        self.record(ServiceCall::DescribeStreams {
            group: group.to_string(),
            prefix: prefix.to_string(),
        })?;

        let state = self.state.lock().unwrap();
        let streams = state
            .groups
            .get(group)
            .ok_or_else(|| not_found(format!("The specified log group does not exist: {}", group)))?;
        Ok(streams
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn create_stream(&self, group: &str, name: &str) -> Result<()> {
        self.record(ServiceCall::CreateStream {
            group: group.to_string(),
            name: name.to_string(),
        })?;

        let mut state = self.state.lock().unwrap();
        let concurrent = state.concurrent_creator;
        let streams = state
            .groups
            .get_mut(group)
            .ok_or_else(|| not_found(format!("The specified log group does not exist: {}", group)))?;
        if streams.contains_key(name) {
            return Err(ServiceError::AlreadyExists(format!(
                "The specified log stream already exists: {}",
                name
            )));
        }
        streams.insert(name.to_string(), StreamState::default());
        if concurrent {
            return Err(ServiceError::AlreadyExists(format!(
                "The specified log stream already exists: {}",
                name
            )));
        }
        Ok(())
    }

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutEventsResponse> {
        self.record(ServiceCall::PutEvents {
            group: group.to_string(),
            stream: stream.to_string(),
            events: events.to_vec(),
            sequence_token: sequence_token.map(str::to_string),
        })?;

        let mut state = self.state.lock().unwrap();
        state.tokens_issued += 1;
        let next = format!("token-{}", state.tokens_issued);

        let entry = state
            .groups
            .get_mut(group)
            .and_then(|streams| streams.get_mut(stream))
            .ok_or_else(|| not_found(format!("The specified log stream does not exist: {}", stream)))?;

        if entry.expected_token.as_deref() != sequence_token {
            let expected = entry.expected_token.clone();
            return Err(ServiceError::InvalidSequenceToken {
                message: format!(
                    "The given sequenceToken is invalid. The next expected sequenceToken is: {}",
                    expected.as_deref().unwrap_or("null")
                ),
                expected,
            });
        }

        entry.events.extend_from_slice(events);
        entry.expected_token = Some(next.clone());

        Ok(PutEventsResponse {
            next_sequence_token: Some(next),
            rejected: None,
        })
    }
}
