//! Record filtering for non-indexed predicates

use crate::core::record::{EventRecord, RecordKind};
use crate::query::options::{QueryOptions, StoreStats};
use std::collections::{HashMap, HashSet};

/// Type and domain predicate built once per query
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    kinds: HashSet<RecordKind>,
    domain: Option<String>,
}

impl RecordFilter {
    pub fn from_options(options: &QueryOptions) -> Self {
        Self {
            kinds: options.types.iter().copied().collect(),
            domain: options.domain.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty() && self.domain.is_none()
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&record.kind()))
            && self.domain.as_deref().map_or(true, |d| record.domain == d)
    }
}

/// Count violations, requests and distinct domains
pub fn compute_stats<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
) -> StoreStats {
    let mut per_kind: HashMap<RecordKind, usize> = HashMap::new();
    let mut domains: HashSet<&str> = HashSet::new();
    for record in records {
        *per_kind.entry(record.kind()).or_default() += 1;
        domains.insert(&record.domain);
    }

    StoreStats {
        violation_count: per_kind.get(&RecordKind::Violation).copied().unwrap_or(0),
        request_count: per_kind.get(&RecordKind::NetworkRequest).copied().unwrap_or(0),
        unique_domain_count: domains.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temporal::Timestamp;
    use std::collections::BTreeMap;

    fn event(domain: &str) -> EventRecord {
        EventRecord::generic_event(domain, Timestamp::from_secs(1), BTreeMap::new())
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = RecordFilter::from_options(&QueryOptions::new());
        assert!(filter.is_empty());
        assert!(filter.matches(&event("a.test")));
    }

    #[test]
    fn test_type_and_domain() {
        let options = QueryOptions::new()
            .types([RecordKind::GenericEvent, RecordKind::Violation])
            .domain("a.test");
        let filter = RecordFilter::from_options(&options);

        assert!(filter.matches(&event("a.test")));
        assert!(!filter.matches(&event("b.test")));

        let other = RecordFilter::from_options(&QueryOptions::new().types([RecordKind::NetworkRequest]));
        assert!(!other.matches(&event("a.test")));
    }

    #[test]
    fn test_stats() {
        let records = vec![event("a.test"), event("b.test"), event("a.test")];
        let stats = compute_stats(&records);
        assert_eq!(stats.violation_count, 0);
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.unique_domain_count, 2);
    }
}
