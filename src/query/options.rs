//! Query options and results

use crate::core::record::{EventRecord, RecordKind};
use crate::core::temporal::Timestamp;
use serde::{Deserialize, Serialize};

/// Default page size
pub const DEFAULT_LIMIT: usize = 100;

/// Result ordering by timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter, bounds and pagination for a read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub limit: usize,
    pub offset: usize,
    /// Record types to include; empty means all
    pub types: Vec<RecordKind>,
    pub domain: Option<String>,
    /// Inclusive lower bound
    pub since: Option<Timestamp>,
    /// Inclusive upper bound
    pub until: Option<Timestamp>,
    pub order: SortOrder,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            types: Vec::new(),
            domain: None,
            since: None,
            until: None,
            order: SortOrder::Desc,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = RecordKind>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: Timestamp) -> Self {
        self.until = Some(until);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether a non-indexed filter (type or domain) is present
    pub fn has_filter(&self) -> bool {
        !self.types.is_empty() || self.domain.is_some()
    }

    /// Whether a timestamp lies within `[since, until]`
    pub fn in_bounds(&self, ts: Timestamp) -> bool {
        self.since.map_or(true, |s| ts >= s) && self.until.map_or(true, |u| ts <= u)
    }
}

/// One page of records.
///
/// On unfiltered reads `total` is the exact number of records within the
/// bounds. When a type or domain filter is present and the page filled up
/// before the scan finished, the scan stops early: `has_more` is then
/// always `true` and `total` only counts the matches seen so far.
/// `total_is_exact` says which case applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub records: Vec<EventRecord>,
    pub total: usize,
    pub has_more: bool,
    pub total_is_exact: bool,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            has_more: false,
            total_is_exact: true,
        }
    }
}

/// Aggregate counts over a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub violation_count: usize,
    pub request_count: usize,
    pub unique_domain_count: usize,
}
