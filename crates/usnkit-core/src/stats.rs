//! Running totals over a stream of records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    /// Sum of record lengths
    pub bytes: u64,
    pub records: u64,
    /// Earliest record timestamp seen
    pub first: Option<DateTime<Utc>>,
    /// Latest record timestamp seen
    pub last: Option<DateTime<Utc>>,
}

impl Stats {
    pub fn add(&mut self, record: &Record) {
        self.bytes += u64::from(record.record_length);
        self.records += 1;
        let ts = record.timestamp;
        self.first = Some(self.first.map_or(ts, |first| first.min(ts)));
        self.last = Some(self.last.map_or(ts, |last| last.max(ts)));
    }

    /// Fold another set of totals into this one.
    pub fn merge(&mut self, other: &Stats) {
        self.bytes += other.bytes;
        self.records += other.records;
        self.first = match (self.first, other.first) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.last = match (self.last, other.last) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Time between the earliest and latest record
    pub fn span(&self) -> Option<chrono::Duration> {
        Some(self.last? - self.first?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::filetime_to_datetime;
    use crate::testing::file;

    #[test]
    fn test_add_tracks_range() {
        let mut stats = Stats::default();
        assert_eq!(stats.span(), None);

        let mut late = file(10, 5, "late");
        late.timestamp = filetime_to_datetime(133_000_000_100_000_000);
        let mut early = file(11, 5, "early");
        early.timestamp = filetime_to_datetime(133_000_000_000_000_000);

        stats.add(&late);
        stats.add(&early);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.bytes, u64::from(late.record_length + early.record_length));
        assert_eq!(stats.first, Some(early.timestamp));
        assert_eq!(stats.last, Some(late.timestamp));
        assert_eq!(stats.span(), Some(chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_merge() {
        let mut a = Stats::default();
        a.add(&file(1, 5, "x"));
        let mut b = Stats::default();
        b.merge(&a);
        b.merge(&Stats::default());
        assert_eq!(a, b);
    }
}
