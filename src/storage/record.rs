//! Record naming
//!
//! A record is named after the second its snapshot was taken:
//!
//! ```text
//! mysql_metrics_20250301_120000.json      first record in that second
//! mysql_metrics_20250301_120000_1.json    second record in the same second
//! ```
//!
//! Records order by (second, sequence), which is also the order they were written in.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

const PREFIX: &str = "mysql_metrics_";
const EXTENSION: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;

/// Identifier of one persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId {
    taken_at: NaiveDateTime,
    sequence: u32,
}

impl RecordId {
    pub fn new(taken_at: DateTime<Utc>, sequence: u32) -> Self {
        let taken_at = taken_at.naive_utc();
        Self {
            taken_at: taken_at.with_nanosecond(0).unwrap_or(taken_at),
            sequence,
        }
    }

    /// Parse a file name; anything that is not a record name yields `None`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
        let timestamp = stem.get(..TIMESTAMP_LEN)?;
        let taken_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;

        let sequence = match stem.get(TIMESTAMP_LEN..)? {
            "" => 0,
            suffix => {
                let digits = suffix.strip_prefix('_')?;
                if !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                match digits.parse().ok()? {
                    0 => return None,
                    sequence => sequence,
                }
            }
        };

        Some(Self { taken_at, sequence })
    }

    pub fn file_name(&self) -> String {
        let timestamp = self.taken_at.format(TIMESTAMP_FORMAT);
        match self.sequence {
            0 => format!("{PREFIX}{timestamp}{EXTENSION}"),
            sequence => format!("{PREFIX}{timestamp}_{sequence}{EXTENSION}"),
        }
    }

    /// Collection time at second resolution
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at.and_utc()
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.taken_at
            .cmp(&other.taken_at)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
