use anyhow::Context;
use tracing::debug;

use crate::task::Task;

/// Encodes the whole collection as a JSON array of task records.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn encode(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string(tasks).context("failed to encode task snapshot")
}

/// Decodes a snapshot produced by [`encode`]. A bare `null` is an empty collection.
///
/// Timestamps written with an offset or finer than milliseconds decode to the
/// same instant, but the next [`encode`] writes them back as UTC with three
/// fractional digits.
#[tracing::instrument(skip(raw))]
pub fn decode(raw: &str) -> anyhow::Result<Vec<Task>> {
    let tasks: Option<Vec<Task>> =
        serde_json::from_str(raw.trim()).context("failed to decode task snapshot")?;
    let tasks = tasks.unwrap_or_default();
    debug!(count = tasks.len(), "decoded task snapshot");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{decode, encode};
    use crate::task::{Priority, Task};

    #[test]
    fn empty_collection_round_trips() {
        let raw = encode(&[]).expect("encode");
        assert_eq!(raw, "[]");
        assert!(decode(&raw).expect("decode").is_empty());
    }

    #[test]
    fn mixed_collection_round_trips() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 16, 5, 0, 0)
            .single()
            .expect("valid now");

        let low = Task::new(1, "low".to_string(), None, Priority::Low, now);
        let mut medium = Task::new(
            2,
            "medium".to_string(),
            NaiveDate::from_ymd_opt(2026, 3, 1),
            Priority::Medium,
            now + Duration::milliseconds(250),
        );
        medium.completed = true;
        let mut high = Task::new(3, "high".to_string(), None, Priority::High, now);
        high.last_edited_at = Some(now + Duration::hours(1));

        let tasks = vec![low, medium, high];
        let decoded = decode(&encode(&tasks).expect("encode")).expect("decode");
        assert_eq!(decoded, tasks);
    }

    #[test]
    fn null_snapshot_is_empty() {
        assert!(decode("null").expect("decode").is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode("{not json").is_err());
        assert!(decode("{\"id\": 1}").is_err());
    }
}
