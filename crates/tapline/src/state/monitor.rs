//! Replication-key ordering checks.
//!
//! Incremental sync assumes records arrive in ascending replication-key
//! order; when they do not, a run that fails halfway can bookmark past
//! records it never emitted. [`BookmarkMonitor`] records how the order
//! changes across a stream so the engine can warn about it.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Direction between two consecutive replication-key values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
    Equal,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
            SortOrder::Equal => "EQUAL",
        })
    }
}

/// Tracks runs of ordering across a stream's replication-key values.
#[derive(Debug, Clone, Default)]
pub struct BookmarkMonitor {
    last: Option<Value>,
    current: Option<SortOrder>,
    count: usize,
    runs: Vec<(SortOrder, usize)>,
}

impl BookmarkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next replication-key value.
    ///
    /// Values that cannot be compared with the previous one (mixed types,
    /// unparseable dates) count toward the current run.
    pub fn track(&mut self, value: &Value) {
        if let Some(last) = &self.last {
            let order = match compare_bookmarks(last, value) {
                Some(Ordering::Less) => Some(SortOrder::Asc),
                Some(Ordering::Greater) => Some(SortOrder::Desc),
                Some(Ordering::Equal) => Some(SortOrder::Equal),
                None => None,
            };

            if let Some(order) = order {
                if self.current != Some(order) {
                    if let Some(previous) = self.current {
                        self.runs.push((previous, self.count));
                    }
                    self.count = 0;
                    self.current = Some(order);
                }
            }
        }

        self.count += 1;
        self.last = Some(value.clone());
    }

    /// Completed runs followed by the current one.
    ///
    /// A run counts the values that moved in its direction, so the first
    /// value of a stream is not counted: three ascending values give `ASC:2`.
    pub fn sorting_map(&self) -> Vec<(SortOrder, usize)> {
        let mut map = self.runs.clone();
        if let Some(current) = self.current {
            map.push((current, self.count));
        }
        map
    }

    /// Whether no value was ever smaller than its predecessor.
    pub fn is_ascending(&self) -> bool {
        self.sorting_map()
            .iter()
            .all(|(order, _)| *order != SortOrder::Desc)
    }

    /// Compact description such as `ASC:9, DESC:2, ASC:5`.
    pub fn summary(&self) -> String {
        self.sorting_map()
            .iter()
            .map(|(order, count)| format!("{}:{}", order, count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compare two replication-key values.
///
/// Numbers compare numerically. Strings compare as timestamps when both
/// parse as RFC 3339 date-times or plain dates, and lexically otherwise.
/// Any other combination is incomparable.
pub fn compare_bookmarks(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

/// Parse a bookmark string as a UTC timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` without offset (taken as UTC),
/// and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
