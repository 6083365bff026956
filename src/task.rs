//! Task records and the two collections they live in.
//!
//! A [`Task`] is persisted as a JSON object whose field names (`Desc`,
//! `Status`, `Created`, `Completed`, `Tag`) match the records written by
//! earlier releases of the tool. Timestamps are stored as RFC 3339 text with
//! second precision so that they sort and round-trip as plain strings.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label that matches tasks without a tag when filtering.
pub const NO_TAG_LABEL: &str = "none";

/// Named collection inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Active tasks, complete or not, that have not been finished yet.
    Tasks,
    /// Finished tasks kept for statistics.
    Archive,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Tasks, Collection::Archive];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Tasks => "tasks",
            Collection::Archive => "archive",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Complete,
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "Desc")]
    pub description: String,
    #[serde(rename = "Status")]
    pub status: TaskStatus,
    #[serde(rename = "Created")]
    pub created_at: String,
    /// Empty while the task is incomplete.
    #[serde(rename = "Completed")]
    pub completed_at: String,
    /// Empty when the task has no tag.
    #[serde(rename = "Tag")]
    pub tag: String,
}

impl Task {
    /// Build a fresh, incomplete task stamped with the current time.
    pub fn new(description: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            status: TaskStatus::Incomplete,
            created_at: timestamp_now(),
            completed_at: String::new(),
            tag: tag.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }

    pub fn tag(&self) -> Option<&str> {
        if self.tag.is_empty() {
            None
        } else {
            Some(&self.tag)
        }
    }

    pub fn mark_complete(&mut self) {
        self.status = TaskStatus::Complete;
        self.completed_at = timestamp_now();
    }

    pub fn mark_incomplete(&mut self) {
        self.status = TaskStatus::Incomplete;
        self.completed_at.clear();
    }

    /// Flip between complete and incomplete, keeping `completed_at` in step.
    pub fn toggle_status(&mut self) {
        if self.is_complete() {
            self.mark_incomplete();
        } else {
            self.mark_complete();
        }
    }

    /// Parse `completed_at` as an instant.
    pub fn completed_time(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.completed_at)
    }

    /// Label used by tag filters: the tag itself, or `none` when untagged.
    pub fn filter_label(&self) -> &str {
        self.tag().unwrap_or(NO_TAG_LABEL)
    }
}

/// A task paired with its current identifier in a collection.
///
/// Produced by scans only; the id is only meaningful until the next
/// mutation of the same collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPosition {
    pub id: u64,
    pub task: Task,
}

/// Current local time in the persisted timestamp format.
pub fn timestamp_now() -> String {
    format_timestamp(Local::now().fixed_offset())
}

pub fn format_timestamp(at: DateTime<FixedOffset>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| Error::Parse {
            value: value.to_string(),
            source,
        })
}
