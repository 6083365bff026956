//! Read-side queries: tag filtering and completion statistics

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::task::TaskPosition;

/// Date format accepted by the stats flags.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Keep or drop tasks by tag.
///
/// The exclude pass runs first, then, when `include` is non-empty, only
/// tasks whose tag is listed survive. The label `none` stands for "no tag".
/// Callers must not pass both lists.
pub fn filter_by_tags(
    tasks: Vec<TaskPosition>,
    include: &[String],
    exclude: &[String],
) -> Vec<TaskPosition> {
    if include.is_empty() && exclude.is_empty() {
        return tasks;
    }

    let listed = |labels: &[String], position: &TaskPosition| {
        let label = position.task.filter_label();
        labels.iter().any(|wanted| wanted == label)
    };

    tasks
        .into_iter()
        .filter(|position| !listed(exclude, position))
        .filter(|position| include.is_empty() || listed(include, position))
        .collect()
}

/// Parse a `mm/dd/yyyy` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|source| Error::Parse {
        value: value.to_string(),
        source,
    })
}

/// Dates requested on the command line, before defaults are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// A single day; overrides `start` and `end`.
    pub on: Option<NaiveDate>,
}

/// Resolved half-open reporting window. Both bounds are exclusive when
/// matching completion times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StatsWindow {
    pub fn resolve(range: StatsRange, now: DateTime<Utc>) -> Result<Self> {
        let (start, end) = match (range.on, range.start, range.end) {
            (Some(day), _, _) => (midnight(day), midnight(day)),
            (None, None, None) => (now - Duration::hours(24), now),
            (None, None, Some(_)) => {
                return Err(Error::InvalidArgument(
                    "must specify a start date".to_string(),
                ))
            }
            (None, Some(start), None) => (midnight(start), now),
            (None, Some(start), Some(end)) => (midnight(start), midnight(end)),
        };

        if end < start {
            return Err(Error::InvalidArgument(
                "end date occurs before the start date".to_string(),
            ));
        }

        let end = if start == end { last_tick(end) } else { end };
        Ok(StatsWindow { start, end })
    }

    /// Length of the window in days.
    pub fn days(&self) -> f64 {
        (self.end - self.start).num_nanoseconds().map_or_else(
            || (self.end - self.start).num_seconds() as f64 / 86_400.0,
            |nanos| nanos as f64 / 86_400_000_000_000.0,
        )
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at < self.end
    }
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// The last representable instant of the day containing `at`.
pub fn last_tick(at: DateTime<Utc>) -> DateTime<Utc> {
    let next_day = at.date_naive() + Duration::days(1);
    midnight(next_day) - Duration::nanoseconds(1)
}

/// Archived tasks completed strictly inside `window`.
pub fn completed_within(
    archive: Vec<TaskPosition>,
    window: &StatsWindow,
) -> Result<Vec<TaskPosition>> {
    let mut matched = Vec::new();
    for position in archive {
        if window.contains(position.task.completed_time()?) {
            matched.push(position);
        }
    }
    Ok(matched)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionStats {
    pub completed: usize,
    pub days: f64,
    pub average_per_day: f64,
}

impl CompletionStats {
    pub fn new(completed: usize, window: &StatsWindow) -> Self {
        let days = window.days();
        CompletionStats {
            completed,
            days,
            average_per_day: completed as f64 / days,
        }
    }
}
