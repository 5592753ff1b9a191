use logship::config::{generate::generate_starter_config, load_config, Clock, ConfigError};
use logship::ship::ShipOptions;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.region, "us-east-1");
    assert_eq!(config.group_name, "python_logs_example");
    assert_eq!(config.stream_prefix, "default");
    assert_eq!(config.file_extension, "log");
    assert_eq!(config.clock, Clock::Local);
    assert!(!config.mark_shipped);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
}

#[test]
fn test_full_config_maps_to_ship_options() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        r#"
region: eu-west-1
group_name: payments
stream_prefix: api
input_path: /srv/logs
file_extension: jsonl
clock: utc
mark_shipped: true
endpoint: http://localhost:4566
request_timeout: 5s
credentials:
  access_key_id: AKIDEXAMPLE
  secret_access_key: secret
retry:
  max_attempts: 4
  initial_backoff: 100ms
  max_backoff: 2s
"#,
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let options = ShipOptions::from(&config);

    assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.retry.initial_backoff, Duration::from_millis(100));
    assert_eq!(options.group_name, "payments");
    assert_eq!(options.stream_prefix, "api");
    assert_eq!(options.input_path, PathBuf::from("/srv/logs"));
    assert_eq!(options.file_extension, "jsonl");
    assert_eq!(options.clock, Clock::Utc);
    assert!(options.mark_shipped);
    assert!(!options.dry_run);
}

#[test]
fn test_missing_file_names_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("absent.yml");

    let err = load_config(&config_path).unwrap_err();

    assert!(matches!(err, ConfigError::Io(_)));
    assert!(err.to_string().contains("absent.yml"));
}

#[test]
fn test_yaml_error_names_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("broken.yml");
    fs::write(&config_path, "region: [unterminated\n").unwrap();

    let err = load_config(&config_path).unwrap_err();

    assert!(err.to_string().contains("broken.yml"));
}

#[test]
fn test_unknown_field_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        "region: us-east-1\ninput_path: /srv/logs\nlog_group: typo\n",
    )
    .unwrap();

    assert!(load_config(&config_path).is_err());
}

#[test]
fn test_validation_errors_are_collected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        r#"
region: us-east-1
group_name: ""
input_path: /srv/logs
file_extension: .log
retry:
  max_attempts: 0
"#,
    )
    .unwrap();

    match load_config(&config_path) {
        Err(ConfigError::ValidationList(errors)) => {
            assert_eq!(errors.len(), 3, "{:?}", errors);
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}
