use super::credentials::CredentialSource;
use super::sigv4::{self, SignableRequest, SigningParams};
use super::{LogService, PutEventsResponse, RejectedEventsInfo, Result, ServiceError};
use crate::source::LogEvent;
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

const SERVICE_NAME: &str = "logs";
const TARGET_PREFIX: &str = "Logs_20140328";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// HTTP client for the CloudWatch Logs JSON API.
#[derive(Debug)]
pub struct CloudWatchLogsClient {
    client: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: CredentialSource,
}

impl CloudWatchLogsClient {
    /// Build a client for `region`. `endpoint` overrides the regional URL,
    /// which is how local emulators and tests are reached.
    pub fn new(
        region: &str,
        endpoint: Option<&str>,
        credentials: impl Into<CredentialSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let raw = match endpoint {
            Some(url) => url.to_string(),
            None => format!("https://logs.{}.amazonaws.com/", region),
        };
        let endpoint = Url::parse(&raw).map_err(|_| ServiceError::InvalidEndpoint(raw.clone()))?;
        if endpoint.host_str().is_none() {
            return Err(ServiceError::InvalidEndpoint(raw));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            region: region.to_string(),
            credentials: credentials.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Sign and send one API operation.
    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)?;
        let target = format!("{}.{}", TARGET_PREFIX, operation);
        let host = self.host_header();
        let credentials = self.credentials.credentials().await?;

        let extra = [("content-type", CONTENT_TYPE), ("x-amz-target", target.as_str())];
        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                host: &host,
                path: self.endpoint.path(),
                headers: &extra,
                body: &body,
            },
            &SigningParams {
                credentials: &credentials,
                region: &self.region,
                service: SERVICE_NAME,
                time: Utc::now(),
            },
        );

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", &target);
        for (name, value) in signed {
            builder = builder.header(name, value);
        }

        tracing::debug!(operation = operation, bytes = body.len(), "Sending request");
        let response = builder.body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text));
        }

        // Create operations answer with an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }
}

#[async_trait]
impl LogService for CloudWatchLogsClient {
    async fn describe_groups(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let request = DescribeLogGroupsRequest {
                log_group_name_prefix: prefix,
                next_token: next_token.as_deref(),
            };
            let page: DescribeLogGroupsResponse = self.call("DescribeLogGroups", &request).await?;
            names.extend(page.log_groups.into_iter().map(|g| g.log_group_name));

            match page.next_token {
                Some(token) if next_token.as_ref() != Some(&token) => next_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn create_group(&self, name: &str) -> Result<()> {
        let request = CreateLogGroupRequest {
            log_group_name: name,
        };
        let _: serde_json::Value = self.call("CreateLogGroup", &request).await?;
        Ok(())
    }

    async fn describe_streams(&self, group: &str, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let request = DescribeLogStreamsRequest {
                log_group_name: group,
                log_stream_name_prefix: prefix,
                next_token: next_token.as_deref(),
            };
            let page: DescribeLogStreamsResponse =
                self.call("DescribeLogStreams", &request).await?;
            names.extend(page.log_streams.into_iter().map(|s| s.log_stream_name));

            match page.next_token {
                Some(token) if next_token.as_ref() != Some(&token) => next_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn create_stream(&self, group: &str, name: &str) -> Result<()> {
        let request = CreateLogStreamRequest {
            log_group_name: group,
            log_stream_name: name,
        };
        let _: serde_json::Value = self.call("CreateLogStream", &request).await?;
        Ok(())
    }

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutEventsResponse> {
        let request = PutLogEventsRequest {
            log_group_name: group,
            log_stream_name: stream,
            log_events: events
                .iter()
                .map(|e| InputLogEvent {
                    timestamp: e.timestamp_millis,
                    message: &e.payload,
                })
                .collect(),
            sequence_token,
        };
        let response: PutLogEventsResponse = self.call("PutLogEvents", &request).await?;

        Ok(PutEventsResponse {
            next_sequence_token: response.next_sequence_token,
            rejected: response.rejected_log_events_info,
        })
    }
}

/// Map an error response body onto [`ServiceError`].
fn classify_error(status: u16, body: &str) -> ServiceError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    // "__type" may be namespaced, e.g. "com.amazonaws.logs#ThrottlingException"
    let code = parsed
        .error_type
        .as_deref()
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| format!("HTTP{}", status));
    let message = parsed
        .message
        .or(parsed.message_upper)
        .unwrap_or_else(|| body.to_string());

    match code.as_str() {
        "ResourceAlreadyExistsException" => ServiceError::AlreadyExists(message),
        "InvalidSequenceTokenException" => ServiceError::InvalidSequenceToken {
            expected: parsed
                .expected_sequence_token
                .or_else(|| expected_token_from_message(&message)),
            message,
        },
        "DataAlreadyAcceptedException" => ServiceError::DataAlreadyAccepted {
            expected: parsed
                .expected_sequence_token
                .or_else(|| expected_token_from_message(&message)),
            message,
        },
        "ThrottlingException" => ServiceError::Throttled(message),
        _ => ServiceError::Api {
            status,
            code,
            message,
        },
    }
}

/// Pull the expected token out of a message such as
/// "The given sequenceToken is invalid. The next expected sequenceToken is: 4959...".
/// A literal `null` means the stream expects no token.
fn expected_token_from_message(message: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"expected sequenceToken is:\s*(\S+)").expect("static regex is valid")
    });

    let token = re.captures(message)?.get(1)?.as_str();
    if token == "null" {
        None
    } else {
        Some(token.to_string())
    }
}

// ===== Wire Types =====

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogGroupsRequest<'a> {
    log_group_name_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogGroupsResponse {
    #[serde(default)]
    log_groups: Vec<LogGroup>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogGroup {
    log_group_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<LogStream>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStream {
    log_stream_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: Vec<InputLogEvent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct InputLogEvent<'a> {
    timestamp: i64,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<RejectedEventsInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    message: Option<String>,
    #[serde(rename = "Message")]
    message_upper: Option<String>,
    #[serde(rename = "expectedSequenceToken")]
    expected_sequence_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Credentials;

    fn client(endpoint: Option<&str>) -> Result<CloudWatchLogsClient> {
        CloudWatchLogsClient::new(
            "eu-west-1",
            endpoint,
            Credentials::new("AKIDEXAMPLE", "secret"),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_regional_endpoint() {
        let client = client(None).unwrap();
        assert_eq!(client.endpoint().as_str(), "https://logs.eu-west-1.amazonaws.com/");
        assert_eq!(client.host_header(), "logs.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_endpoint_override_keeps_port() {
        let client = client(Some("http://127.0.0.1:4566")).unwrap();
        assert_eq!(client.host_header(), "127.0.0.1:4566");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            client(Some("not a url")),
            Err(ServiceError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_classify_already_exists() {
        let err = classify_error(
            400,
            r#"{"__type":"ResourceAlreadyExistsException","message":"The specified log group already exists"}"#,
        );
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[test]
    fn test_classify_invalid_token_from_field() {
        let err = classify_error(
            400,
            r#"{"__type":"InvalidSequenceTokenException","expectedSequenceToken":"49612","message":"bad token"}"#,
        );
        match err {
            ServiceError::InvalidSequenceToken { expected, .. } => {
                assert_eq!(expected.as_deref(), Some("49612"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_invalid_token_from_message() {
        let err = classify_error(
            400,
            r#"{"__type":"com.amazonaws.logs#InvalidSequenceTokenException","message":"The given sequenceToken is invalid. The next expected sequenceToken is: 4961234"}"#,
        );
        match err {
            ServiceError::InvalidSequenceToken { expected, .. } => {
                assert_eq!(expected.as_deref(), Some("4961234"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_expected_null_token() {
        assert_eq!(
            expected_token_from_message("The next expected sequenceToken is: null"),
            None
        );
    }

    #[test]
    fn test_classify_throttling_and_unknown() {
        assert!(matches!(
            classify_error(400, r#"{"__type":"ThrottlingException","message":"Rate exceeded"}"#),
            ServiceError::Throttled(_)
        ));

        match classify_error(502, "Bad Gateway") {
            ServiceError::Api { status, code, message } => {
                assert_eq!(status, 502);
                assert_eq!(code, "HTTP502");
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
