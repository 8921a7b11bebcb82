//! Query execution over a timestamp index.
//!
//! Two strategies, picked by whether a non-indexed filter is present:
//!
//! - **Fast path** (bounds only): the total comes from an index count over
//!   the bounds, the cursor skips `offset` entries in one step and at most
//!   `limit` records are read.
//! - **Filtered path** (type and/or domain): there is no compound index, so
//!   the bounded cursor is walked and each record tested. If the page fills
//!   while entries remain, the walk stops there: `total` is then only a lower
//!   bound and `has_more` is reported as `true` without checking further.

use crate::core::record::{EventRecord, RecordId};
use crate::index::temporal::{TimeRange, TimestampIndex};
use crate::query::filter::RecordFilter;
use crate::query::options::{QueryOptions, QueryResult};
use std::collections::HashMap;

/// Execute `options` against an index and the records it points into
pub fn execute(
    index: &TimestampIndex,
    records: &HashMap<RecordId, EventRecord>,
    options: &QueryOptions,
) -> QueryResult {
    let range = TimeRange::new(options.since, options.until);
    let filter = RecordFilter::from_options(options);

    if filter.is_empty() {
        fast_path(index, records, range, options)
    } else {
        filtered_path(index, records, range, &filter, options)
    }
}

/// Exact count of records matching `options`
pub fn count(
    index: &TimestampIndex,
    records: &HashMap<RecordId, EventRecord>,
    options: &QueryOptions,
) -> usize {
    let range = TimeRange::new(options.since, options.until);
    let filter = RecordFilter::from_options(options);

    if filter.is_empty() {
        return index.count(range);
    }
    index
        .range(range)
        .filter_map(|id| records.get(id))
        .filter(|record| filter.matches(record))
        .count()
}

fn fast_path(
    index: &TimestampIndex,
    records: &HashMap<RecordId, EventRecord>,
    range: TimeRange,
    options: &QueryOptions,
) -> QueryResult {
    let total = index.count(range);

    let mut cursor = index.cursor(range, options.order);
    cursor.advance(options.offset);
    let page: Vec<EventRecord> = cursor
        .filter_map(|id| records.get(id).cloned())
        .take(options.limit)
        .collect();

    QueryResult {
        has_more: options.offset.saturating_add(page.len()) < total,
        records: page,
        total,
        total_is_exact: true,
    }
}

fn filtered_path(
    index: &TimestampIndex,
    records: &HashMap<RecordId, EventRecord>,
    range: TimeRange,
    filter: &RecordFilter,
    options: &QueryOptions,
) -> QueryResult {
    let mut matched = 0usize;
    let mut page = Vec::new();
    let mut cut_short = false;

    for id in index.cursor(range, options.order) {
        if page.len() >= options.limit {
            cut_short = true;
            break;
        }
        let Some(record) = records.get(id) else {
            continue;
        };
        if !filter.matches(record) {
            continue;
        }
        matched += 1;
        if matched > options.offset {
            page.push(record.clone());
        }
    }

    QueryResult {
        has_more: cut_short || options.offset.saturating_add(page.len()) < matched,
        records: page,
        total: matched,
        total_is_exact: !cut_short,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{
        Disposition, EventRecord, InitiatorType, NetworkRequestDetails, RecordKind,
        ViolationDetails,
    };
    use crate::core::temporal::Timestamp;
    use crate::query::options::SortOrder;

    struct Fixture {
        index: TimestampIndex,
        records: HashMap<RecordId, EventRecord>,
    }

    impl Fixture {
        fn new(records: Vec<EventRecord>) -> Self {
            let mut index = TimestampIndex::new();
            let mut map = HashMap::new();
            for record in records {
                index.insert(record.timestamp, record.id.clone());
                map.insert(record.id.clone(), record);
            }
            Self { index, records: map }
        }

        fn run(&self, options: &QueryOptions) -> QueryResult {
            execute(&self.index, &self.records, options)
        }

        fn brute_force_count(&self, options: &QueryOptions) -> usize {
            let filter = RecordFilter::from_options(options);
            self.records
                .values()
                .filter(|r| options.in_bounds(r.timestamp) && filter.matches(r))
                .count()
        }
    }

    fn violation(i: i64, domain: &str) -> EventRecord {
        EventRecord::violation(
            domain,
            Timestamp::from_millis(i * 10),
            ViolationDetails {
                directive: "script-src".to_string(),
                blocked_url: format!("https://x.test/{i}"),
                disposition: Disposition::Enforce,
                source_file: None,
                line_number: None,
                column_number: None,
                status_code: None,
            },
        )
        .with_id(format!("v{i:03}"))
    }

    fn request(i: i64, domain: &str) -> EventRecord {
        EventRecord::network_request(
            domain,
            Timestamp::from_millis(i * 10 + 5),
            NetworkRequestDetails {
                url: format!("https://api.test/{i}"),
                method: "GET".to_string(),
                initiator: InitiatorType::Img,
                resource_type: None,
            },
        )
        .with_id(format!("n{i:03}"))
    }

    /// 100 violations at 0,10,..,990 and 100 requests at 5,15,..,995;
    /// every third record of each kind is on `b.test`.
    fn fixture() -> Fixture {
        let mut records = Vec::new();
        for i in 0..100 {
            let domain = if i % 3 == 0 { "b.test" } else { "a.test" };
            records.push(violation(i, domain));
            records.push(request(i, domain));
        }
        Fixture::new(records)
    }

    #[test]
    fn test_fast_path_total_matches_full_count() {
        let fx = fixture();
        let bounds = [
            (None, None),
            (Some(100), None),
            (None, Some(500)),
            (Some(205), Some(205)),
            (Some(333), Some(777)),
            (Some(2000), Some(3000)),
        ];

        for (since, until) in bounds {
            let mut options = QueryOptions::new().limit(7);
            options.since = since.map(Timestamp::from_millis);
            options.until = until.map(Timestamp::from_millis);

            let result = fx.run(&options);
            assert_eq!(result.total, fx.brute_force_count(&options), "{since:?}..{until:?}");
            assert!(result.total_is_exact);
            assert_eq!(result.records.len(), result.total.min(7));
        }
    }

    #[test]
    fn test_fast_path_order_and_offset() {
        let fx = fixture();

        let desc = fx.run(&QueryOptions::new().limit(3).offset(2));
        let ids: Vec<&str> = desc.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["n098", "v098", "n097"]);
        assert!(desc.has_more);
        assert_eq!(desc.total, 200);

        let asc = fx.run(&QueryOptions::new().limit(2).order(SortOrder::Asc));
        let ids: Vec<&str> = asc.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["v000", "n000"]);

        let last_page = fx.run(&QueryOptions::new().limit(10).offset(195));
        assert_eq!(last_page.records.len(), 5);
        assert!(!last_page.has_more);

        let beyond = fx.run(&QueryOptions::new().offset(500));
        assert!(beyond.records.is_empty());
        assert!(!beyond.has_more);
        assert_eq!(beyond.total, 200);
    }

    #[test]
    fn test_huge_offset_and_far_bounds() {
        let fx = fixture();

        let beyond = fx.run(&QueryOptions::new().offset(usize::MAX));
        assert!(beyond.records.is_empty());
        assert!(!beyond.has_more);

        let filtered = fx.run(&QueryOptions::new().domain("b.test").offset(usize::MAX));
        assert!(filtered.records.is_empty());
        assert!(!filtered.has_more);
        assert_eq!(filtered.total, 68);

        let far = fx.run(&QueryOptions::new().until(Timestamp::from_millis(10_000_000_000_000_000)));
        assert_eq!(far.total, 200);
    }

    #[test]
    fn test_filtered_path_reports_more_when_page_fills() {
        let fx = fixture();
        let options = QueryOptions::new().types([RecordKind::Violation]).limit(10);

        let result = fx.run(&options);
        assert_eq!(result.records.len(), 10);
        assert!(result.records.iter().all(|r| r.kind() == RecordKind::Violation));
        assert!(result.has_more);
        assert!(!result.total_is_exact);
        assert!(result.total < 100);
    }

    #[test]
    fn test_filtered_path_exact_when_scan_completes() {
        let fx = fixture();
        let options = QueryOptions::new()
            .types([RecordKind::NetworkRequest])
            .domain("b.test")
            .limit(50);

        let result = fx.run(&options);
        assert_eq!(result.total, 34);
        assert_eq!(result.records.len(), 34);
        assert!(!result.has_more);
        assert!(result.total_is_exact);
        assert_eq!(result.total, fx.brute_force_count(&options));
    }

    #[test]
    fn test_filtered_path_offset_skips_matches_only() {
        let fx = fixture();
        let options = QueryOptions::new()
            .domain("b.test")
            .order(SortOrder::Asc)
            .offset(2)
            .limit(2);

        let result = fx.run(&options);
        let ids: Vec<&str> = result.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["v003", "n003"]);
        assert!(result.has_more);
    }

    #[test]
    fn test_page_filled_by_last_entry_is_exact() {
        let fx = fixture();
        // Exactly 34 violations live on b.test; the oldest one (v000) is the
        // final entry of a descending cursor.
        let options = QueryOptions::new()
            .types([RecordKind::Violation])
            .domain("b.test")
            .limit(34);

        let result = fx.run(&options);
        assert_eq!(result.records.len(), 34);
        assert_eq!(result.records.last().map(|r| r.id()), Some("v000"));
        assert!(!result.has_more);
        assert!(result.total_is_exact);
        assert_eq!(result.total, 34);
    }

    #[test]
    fn test_count_is_exact_on_both_paths() {
        let fx = fixture();
        let unfiltered = QueryOptions::new().since(Timestamp::from_millis(500));
        let filtered = QueryOptions::new()
            .types([RecordKind::Violation])
            .domain("a.test");

        assert_eq!(count(&fx.index, &fx.records, &unfiltered), fx.brute_force_count(&unfiltered));
        assert_eq!(count(&fx.index, &fx.records, &filtered), fx.brute_force_count(&filtered));
    }
}
