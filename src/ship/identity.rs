use crate::config::types::Clock;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::fmt;

/// Destination of a run: one stream inside one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamIdentity {
    pub group: String,
    pub stream: String,
}

impl StreamIdentity {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
        }
    }

    /// `{prefix}_{YYYYMMDD}` for the given calendar date.
    pub fn for_date(group: &str, prefix: &str, date: NaiveDate) -> Self {
        Self::new(group, format!("{}_{}", prefix, date.format("%Y%m%d")))
    }

    /// Resolve the identity for `now`, reading the date in the configured clock.
    pub fn at(group: &str, prefix: &str, clock: Clock, now: DateTime<Utc>) -> Self {
        let date = match clock {
            Clock::Utc => now.date_naive(),
            Clock::Local => now.with_timezone(&Local).date_naive(),
        };
        Self::for_date(group, prefix, date)
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.stream)
    }
}
