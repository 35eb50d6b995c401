use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::datetime::{due_date_serde, iso_timestamp_serde};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    /// Ordinal used by the display sort: high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow!("invalid priority: {other} (expected low, medium or high)")),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Snapshots written by hand or by older front ends may carry anything here.
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(rename = "date", with = "iso_timestamp_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "dueDate", default, with = "due_date_serde")]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(
        rename = "lastEdited",
        default,
        with = "iso_timestamp_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_edited_at: Option<DateTime<Utc>>,

    #[serde(rename = "timeSpent", default)]
    pub time_spent: u64,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(
        id: u64,
        text: String,
        due_date: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now,
            due_date,
            priority,
            last_edited_at: None,
            time_spent: 0,
            extra: BTreeMap::new(),
        }
    }

    pub fn matches_text(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty() || self.text.to_lowercase().contains(needle_lower)
    }
}
