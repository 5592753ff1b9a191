use crate::source::LogEvent;
use std::time::Duration;
use thiserror::Error;

/// Most events a single append accepts.
pub const MAX_BATCH_EVENTS: usize = 10_000;

/// Most bytes a single append accepts, counted as payload plus overhead.
pub const MAX_BATCH_BYTES: usize = 1_048_576;

/// Fixed per-event overhead the service adds to each payload.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// Widest time range the events of a single append may cover.
pub const MAX_BATCH_SPAN: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
#[error("event {index} is {size} bytes, over the {limit}-byte batch limit")]
pub struct OversizedEvent {
    pub index: usize,
    pub size: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_events: usize,
    pub max_bytes: usize,
    /// Newest minus oldest timestamp within one batch.
    pub max_span: Duration,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_events: MAX_BATCH_EVENTS,
            max_bytes: MAX_BATCH_BYTES,
            max_span: MAX_BATCH_SPAN,
        }
    }
}

fn event_size(event: &LogEvent) -> usize {
    event.payload.len() + EVENT_OVERHEAD_BYTES
}

/// Split `events` into consecutive batches that each fit `limits`.
///
/// Order is preserved: concatenating the batches gives back `events`. A new
/// batch starts whenever adding the next event would break the event count,
/// the byte budget or the time span.
pub fn plan_batches<'a>(
    events: &'a [LogEvent],
    limits: &BatchLimits,
) -> Result<Vec<&'a [LogEvent]>, OversizedEvent> {
    let max_span_millis = i64::try_from(limits.max_span.as_millis()).unwrap_or(i64::MAX);

    let mut batches = Vec::new();
    let mut start = 0;
    let mut bytes = 0;
    let mut oldest = i64::MAX;
    let mut newest = i64::MIN;

    for (index, event) in events.iter().enumerate() {
        let size = event_size(event);
        if size > limits.max_bytes {
            return Err(OversizedEvent {
                index,
                size,
                limit: limits.max_bytes,
            });
        }

        let ts = event.timestamp_millis;
        let count = index - start;
        let span = newest.max(ts).saturating_sub(oldest.min(ts));
        if count > 0
            && (count == limits.max_events
                || bytes + size > limits.max_bytes
                || span > max_span_millis)
        {
            batches.push(&events[start..index]);
            start = index;
            bytes = 0;
            oldest = i64::MAX;
            newest = i64::MIN;
        }
        bytes += size;
        oldest = oldest.min(ts);
        newest = newest.max(ts);
    }

    if start < events.len() {
        batches.push(&events[start..]);
    }

    Ok(batches)
}
