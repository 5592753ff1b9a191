use crate::config::Clock;
use crate::source::timestamp::{epoch_millis, parse_iso8601};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Field carrying the record time.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Fields that never reach the payload.
pub const EXCLUDED_FIELDS: &[&str] = &[TIMESTAMP_FIELD, "logger"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at {}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// A normalized event as accepted by the aggregation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Unix epoch milliseconds.
    pub timestamp_millis: i64,
    /// Compact JSON of the record without excluded fields.
    pub payload: String,
}

impl LogEvent {
    /// Build an event from one parsed record, reading an offset-less
    /// timestamp in `clock`.
    pub fn from_record(record: Map<String, Value>, clock: Clock) -> Result<Self, String> {
        let raw_ts = match record.get(TIMESTAMP_FIELD) {
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(format!(
                    "'{}' must be a string, found {}",
                    TIMESTAMP_FIELD, other
                ))
            }
            None => return Err(format!("missing '{}' field", TIMESTAMP_FIELD)),
        };

        let timestamp = parse_iso8601(raw_ts, clock).map_err(|e| e.to_string())?;

        let fields: Map<String, Value> = record
            .into_iter()
            .filter(|(key, _)| !EXCLUDED_FIELDS.contains(&key.as_str()))
            .collect();

        // Serializing a Map of Values cannot fail
        let payload = Value::Object(fields).to_string();

        Ok(Self {
            timestamp_millis: epoch_millis(&timestamp),
            payload,
        })
    }
}

/// Parse one newline-delimited JSON file into events, in file order.
///
/// The whole file is materialized. Any bad line, including one that is not
/// valid UTF-8, aborts extraction.
pub fn extract_events(path: &Path, clock: Clock) -> Result<Vec<LogEvent>, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(io_err)?;
        let line_number = index + 1;

        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let malformed = |reason: String| ExtractError::Malformed {
            path: path.to_path_buf(),
            line: line_number,
            reason,
        };

        let record = match serde_json::from_slice::<Value>(&line) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(malformed("line is not a JSON object".to_string())),
            Err(e) => return Err(malformed(format!("invalid JSON: {}", e))),
        };

        events.push(LogEvent::from_record(record, clock).map_err(malformed)?);
    }

    tracing::debug!(path = %path.display(), events = events.len(), "Extracted events");

    Ok(events)
}
