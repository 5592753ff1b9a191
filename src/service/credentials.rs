use crate::config::types::CredentialsConfig;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::provider_config::ProviderConfig;
use aws_config::Region;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use std::fmt;
use thiserror::Error;

const CONFIG_PROVIDER_NAME: &str = "LogshipConfig";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to load AWS credentials from {origin}: {detail}")]
    Provider { origin: String, detail: String },
}

/// Signing material for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }
}

impl From<&aws_credential_types::Credentials> for Credentials {
    fn from(credentials: &aws_credential_types::Credentials) -> Self {
        Self {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().map(str::to_string),
        }
    }
}

/// Where signing credentials come from.
///
/// Backed by an AWS credentials provider, which caches temporary credentials
/// (assumed roles, SSO, instance and container roles) and refreshes them
/// before they expire.
#[derive(Clone, Debug)]
pub struct CredentialSource {
    origin: String,
    provider: SharedCredentialsProvider,
}

impl CredentialSource {
    /// Pick the provider for `config`:
    ///
    /// 1. an explicit key pair from the config file;
    /// 2. a named profile from `~/.aws/credentials` or `~/.aws/config`,
    ///    including `role_arn`/`source_profile`, SSO and `credential_process`;
    /// 3. the default chain: environment variables, `AWS_PROFILE` (or
    ///    `default`), web identity, then ECS container and EC2 instance roles.
    ///
    /// Nothing is loaded until [`CredentialSource::credentials`] is called.
    pub async fn resolve(config: &CredentialsConfig, region: &str) -> Self {
        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            return Self::fixed(Credentials {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
                session_token: config.session_token.clone(),
            });
        }

        let region = Region::new(region.to_string());

        if let Some(profile) = &config.profile {
            let provider_config = ProviderConfig::without_region().with_region(Some(region));
            let provider = ProfileFileCredentialsProvider::builder()
                .configure(&provider_config)
                .profile_name(profile)
                .build();
            return Self {
                origin: format!("profile '{}'", profile),
                provider: SharedCredentialsProvider::new(provider),
            };
        }

        let chain = DefaultCredentialsChain::builder().region(region).build().await;
        Self {
            origin: "the default credential chain".to_string(),
            provider: SharedCredentialsProvider::new(chain),
        }
    }

    /// Always hand out `credentials`.
    pub fn fixed(credentials: Credentials) -> Self {
        let Credentials {
            access_key_id,
            secret_access_key,
            session_token,
        } = credentials;

        Self {
            origin: "config".to_string(),
            provider: SharedCredentialsProvider::new(aws_credential_types::Credentials::new(
                access_key_id,
                secret_access_key,
                session_token,
                None,
                CONFIG_PROVIDER_NAME,
            )),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Current credentials, loading or refreshing them as needed.
    pub async fn credentials(&self) -> Result<Credentials, CredentialsError> {
        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| CredentialsError::Provider {
                origin: self.origin.clone(),
                detail: error_chain(&e),
            })?;

        Ok(Credentials::from(&credentials))
    }
}

impl From<Credentials> for CredentialSource {
    fn from(credentials: Credentials) -> Self {
        Self::fixed(credentials)
    }
}

/// Provider errors keep the useful part in their sources.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_pair_wins() {
        let config = CredentialsConfig {
            profile: None,
            access_key_id: Some("AKIDCONFIG".to_string()),
            secret_access_key: Some("configsecret".to_string()),
            session_token: Some("sessiontoken".to_string()),
        };

        let source = CredentialSource::resolve(&config, "us-east-1").await;
        let creds = source.credentials().await.unwrap();

        assert_eq!(source.origin(), "config");
        assert_eq!(creds.access_key_id, "AKIDCONFIG");
        assert_eq!(creds.secret_access_key, "configsecret");
        assert_eq!(creds.session_token.as_deref(), Some("sessiontoken"));
    }

    #[tokio::test]
    async fn test_fixed_source_round_trips() {
        let source = CredentialSource::from(Credentials::new("AKIDEXAMPLE", "secret"));

        let creds = source.credentials().await.unwrap();
        assert_eq!(creds, Credentials::new("AKIDEXAMPLE", "secret"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("AKIDEXAMPLE", "supersecret");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("supersecret"));
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "no such profile");
        let outer = CredentialsError::Provider {
            origin: "x".to_string(),
            detail: error_chain(&inner),
        };
        assert!(outer.to_string().contains("no such profile"));
    }
}
