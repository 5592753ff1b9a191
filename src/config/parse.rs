use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config = parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(err) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), err),
        )),
        other => other,
    })?;

    Ok(config)
}

/// Parse, normalize and validate a config from YAML text.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml = expand_env_vars(yaml);

    check_unexpanded_vars(&yaml)?;

    let mut config: Config = serde_yaml::from_str(&yaml)?;

    config.input_path = expand_tilde(&config.input_path);
    if config.region.trim().is_empty() {
        config.region = region_from_env().unwrap_or_default();
    }

    validate_config(&config)?;

    Ok(config)
}

fn region_from_env() -> Option<String> {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.region.trim().is_empty() {
        errors.push(
            "region is required: set 'region' or the AWS_REGION environment variable".to_string(),
        );
    }
    if config.group_name.trim().is_empty() {
        errors.push("group_name cannot be empty".to_string());
    }
    if config.stream_prefix.trim().is_empty() {
        errors.push("stream_prefix cannot be empty".to_string());
    }
    if config.input_path.as_os_str().is_empty() {
        errors.push("input_path cannot be empty".to_string());
    }

    validate_extension(&config.file_extension, &mut errors);
    validate_credentials(&config.credentials, &mut errors);

    if config.retry.max_attempts == 0 {
        errors.push("retry.max_attempts must be at least 1".to_string());
    }
    if config.retry.initial_backoff > config.retry.max_backoff {
        errors.push("retry.initial_backoff cannot exceed retry.max_backoff".to_string());
    }
    if config.request_timeout.is_zero() {
        errors.push("request_timeout must be greater than zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_extension(extension: &str, errors: &mut Vec<String>) {
    if extension.is_empty() {
        errors.push("file_extension cannot be empty".to_string());
    } else if extension.starts_with('.') {
        errors.push(format!(
            "file_extension '{}' must not start with '.', use '{}'",
            extension,
            extension.trim_start_matches('.')
        ));
    } else if extension.contains('/') || extension.contains('\\') {
        errors.push(format!(
            "file_extension '{}' must not contain a path separator",
            extension
        ));
    }
}

fn validate_credentials(credentials: &CredentialsConfig, errors: &mut Vec<String>) {
    let has_key = credentials.access_key_id.is_some();
    let has_secret = credentials.secret_access_key.is_some();

    if credentials.profile.is_some() && (has_key || has_secret) {
        errors.push(
            "credentials: set either 'profile' or 'access_key_id'/'secret_access_key', not both"
                .to_string(),
        );
    }
    if has_key != has_secret {
        errors.push(
            "credentials: 'access_key_id' and 'secret_access_key' must be set together"
                .to_string(),
        );
    }
    if credentials.session_token.is_some() && !has_key {
        errors.push("credentials: 'session_token' requires an explicit key pair".to_string());
    }
}
