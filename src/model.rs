use crate::tally::{FinalTally, TimeBucket};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub lines_added: u64,
    pub lines_removed: u64,
}

impl FileDiff {
    pub fn new(path: impl Into<String>, lines_added: u64, lines_removed: u64) -> Self {
        Self {
            path: path.into(),
            lines_added,
            lines_removed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub file_diffs: Vec<FileDiff>,
}

impl Commit {
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// One row of `timeline` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub name: String,
    pub time: DateTime<FixedOffset>,
    pub value: u64,
    pub total_value: u64,
    pub winner: Option<FinalTally>,
    pub total: FinalTally,
}

impl TimelineEntry {
    pub fn from_bucket(bucket: &TimeBucket, metric: crate::tally::Metric) -> Self {
        let winner = (!bucket.is_empty()).then(|| bucket.tally.clone());
        Self {
            name: bucket.name.clone(),
            time: bucket.time,
            value: bucket.value(metric),
            total_value: bucket.total_value(metric),
            winner,
            total: bucket.total_tally.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository_path: String,
    pub mode: String,
    pub since: Option<String>,
    pub until: Option<String>,
    pub buckets: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository_path: String,
    pub mode: String,
    pub since: Option<String>,
    pub until: Option<String>,
    pub entries: Vec<FinalTally>,
}

#[derive(Debug, Clone)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if timestamp < &since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > &until {
                return false;
            }
        }
        true
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new()
    }
}
