pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGSHIP CONFIGURATION
# =============================================================================
# Ships newline-delimited JSON log files to a CloudWatch Logs stream named
# {stream_prefix}_{YYYYMMDD}. Every value may reference environment variables
# with the $env{...} syntax, e.g. input_path: $env{...}/logs
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logship/config.yml
#   3. /etc/logship/config.yml

# AWS region. Falls back to AWS_REGION / AWS_DEFAULT_REGION when omitted.
region: us-east-1

# Destination log group, created if absent
group_name: python_logs_example

# Stream name prefix; the run date is appended as _YYYYMMDD
stream_prefix: default

# 'local' or 'utc'. Dates the stream name and applies to @timestamp values
# written without an offset.
clock: local

# Directory scanned for input files (not recursive)
input_path: /var/log/app

# Only files named *.<file_extension> are shipped
file_extension: log

# Rename each file to <name>.shipped once all of it has been submitted.
# Off by default: every run re-ships every matching file.
mark_shipped: false

# HTTP timeout for each service call
request_timeout: 30s

# Optional: point at a different endpoint (e.g. a local emulator)
# endpoint: http://localhost:4566

# Credentials. Omit to use AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY or the
# 'default' profile from ~/.aws/credentials.
credentials:
  profile: default
  # access_key_id: AKIA...
  # secret_access_key: ...

# Backoff for throttling and server errors. max_attempts: 1 disables retry.
# Stale sequence tokens are always retried once regardless of this setting.
retry:
  max_attempts: 1
  initial_backoff: 200ms
  max_backoff: 10s
"#
    .to_string()
}
