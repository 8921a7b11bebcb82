//! Timestamp index and cursors for time-based queries

use crate::core::record::RecordId;
use crate::core::temporal::Timestamp;
use crate::query::options::SortOrder;
use std::ops::Range;

/// Inclusive timestamp bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    /// Bounds from optional `since`/`until`, open ends becoming unbounded
    pub fn new(since: Option<Timestamp>, until: Option<Timestamp>) -> Self {
        Self {
            start: since.unwrap_or(Timestamp::MIN),
            end: until.unwrap_or(Timestamp::MAX),
        }
    }

    pub fn all() -> Self {
        Self::new(None, None)
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }
}

type Entry = (Timestamp, RecordId);

/// Secondary index ordering record IDs by `(timestamp, id)`.
///
/// Entries live in a sorted vector: range bounds come from binary search,
/// so counting a range never scans it and a cursor can skip any number of
/// entries in one step. Appends in timestamp order are amortized O(1).
#[derive(Debug, Default)]
pub struct TimestampIndex {
    entries: Vec<Entry>,
}

impl TimestampIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, timestamp: Timestamp, id: RecordId) {
        let entry = (timestamp, id);
        match self.entries.last() {
            Some(last) if *last > entry => {
                let pos = self.entries.partition_point(|e| *e < entry);
                self.entries.insert(pos, entry);
            }
            _ => self.entries.push(entry),
        }
    }

    /// Remove one entry; returns whether it was present
    pub fn remove(&mut self, timestamp: Timestamp, id: &str) -> bool {
        let pos = self
            .entries
            .partition_point(|(ts, eid)| (*ts, eid.as_str()) < (timestamp, id));
        match self.entries.get(pos) {
            Some((ts, eid)) if *ts == timestamp && eid == id => {
                self.entries.remove(pos);
                true
            }
            _ => false,
        }
    }

    /// Remove every entry older than `before`, returning the removed IDs
    pub fn drain_before(&mut self, before: Timestamp) -> Vec<RecordId> {
        let end = self.entries.partition_point(|(ts, _)| *ts < before);
        self.entries.drain(..end).map(|(_, id)| id).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn bounds(&self, range: TimeRange) -> Range<usize> {
        if range.start > range.end {
            return 0..0;
        }
        let lo = self.entries.partition_point(|(ts, _)| *ts < range.start);
        let hi = self.entries.partition_point(|(ts, _)| *ts <= range.end);
        lo..hi
    }

    /// Exact number of entries within `range`
    pub fn count(&self, range: TimeRange) -> usize {
        self.bounds(range).len()
    }

    /// Entries within `range` in ascending order, for bulk reads
    pub fn range(&self, range: TimeRange) -> impl Iterator<Item = &RecordId> + '_ {
        self.entries[self.bounds(range)].iter().map(|(_, id)| id)
    }

    /// Open a cursor over `range` in the given direction
    pub fn cursor(&self, range: TimeRange, order: SortOrder) -> Cursor<'_> {
        Cursor {
            remaining: &self.entries[self.bounds(range)],
            order,
        }
    }
}

/// Directional iterator over a bounded slice of the index
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    remaining: &'a [Entry],
    order: SortOrder,
}

impl<'a> Cursor<'a> {
    /// Skip `n` entries in one step
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.remaining.len());
        self.remaining = match self.order {
            SortOrder::Asc => &self.remaining[n..],
            SortOrder::Desc => &self.remaining[..self.remaining.len() - n],
        };
    }

    /// Entries not yet visited
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = &'a RecordId;

    fn next(&mut self) -> Option<Self::Item> {
        let (entry, rest) = match self.order {
            SortOrder::Asc => self.remaining.split_first()?,
            SortOrder::Desc => self.remaining.split_last()?,
        };
        self.remaining = rest;
        Some(&entry.1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.len(), Some(self.remaining.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(timestamps: &[i64]) -> TimestampIndex {
        let mut index = TimestampIndex::new();
        for (i, ts) in timestamps.iter().enumerate() {
            index.insert(Timestamp::from_millis(*ts), format!("id{i}"));
        }
        index
    }

    fn bounded(start: i64, end: i64) -> TimeRange {
        TimeRange::new(Some(Timestamp::from_millis(start)), Some(Timestamp::from_millis(end)))
    }

    #[test]
    fn test_out_of_order_inserts_stay_sorted() {
        let index = index_of(&[30, 10, 20, 10]);
        let ids: Vec<&RecordId> = index.range(TimeRange::all()).collect();
        assert_eq!(ids, ["id1", "id3", "id2", "id0"]);
    }

    #[test]
    fn test_count_is_inclusive() {
        let index = index_of(&[10, 20, 30, 40, 50]);
        assert_eq!(index.count(bounded(20, 40)), 3);
        assert_eq!(index.count(bounded(21, 39)), 1);
        assert_eq!(index.count(bounded(60, 70)), 0);
        assert_eq!(index.count(bounded(40, 20)), 0);
        assert_eq!(index.count(TimeRange::all()), 5);
    }

    #[test]
    fn test_cursor_directions_and_skip() {
        let index = index_of(&[10, 20, 30, 40, 50]);

        let asc: Vec<&RecordId> = index.cursor(bounded(20, 50), SortOrder::Asc).collect();
        assert_eq!(asc, ["id1", "id2", "id3", "id4"]);

        let mut desc = index.cursor(bounded(20, 50), SortOrder::Desc);
        desc.advance(1);
        assert_eq!(desc.remaining(), 3);
        let rest: Vec<&RecordId> = desc.collect();
        assert_eq!(rest, ["id3", "id2", "id1"]);

        let mut past_end = index.cursor(TimeRange::all(), SortOrder::Asc);
        past_end.advance(99);
        assert_eq!(past_end.next(), None);
    }

    #[test]
    fn test_remove_and_drain() {
        let mut index = index_of(&[10, 20, 30]);
        assert!(index.remove(Timestamp::from_millis(20), "id1"));
        assert!(!index.remove(Timestamp::from_millis(20), "id1"));
        assert_eq!(index.len(), 2);

        let drained = index.drain_before(Timestamp::from_millis(30));
        assert_eq!(drained, ["id0"]);
        assert_eq!(index.len(), 1);
    }
}
