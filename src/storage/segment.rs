//! Segment: durable storage unit keyed by `{type}-{date}`

use crate::core::record::EventRecord;
use crate::core::temporal::{format_date, Timestamp, DATE_FORMAT};
use crate::error::{Error, Result};
use crate::storage::codec::{decode_records, encode_records};
use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use nom::{
    bytes::complete::take_while_m_n,
    character::complete::char,
    combinator::{all_consuming, map_res, recognize},
    sequence::tuple,
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the `-YYYY-MM-DD` suffix on every segment key
pub const DATE_SUFFIX_LEN: usize = 11;

/// Composite bucket key identifying a segment.
///
/// The type tag may itself contain hyphens (`network-requests`), so a key
/// is parsed by stripping a fixed-width date suffix, never by splitting on
/// the first hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    pub segment_type: String,
    pub date: NaiveDate,
}

impl SegmentKey {
    pub fn new(segment_type: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            segment_type: segment_type.into(),
            date,
        }
    }

    /// Bucket key for a record: its kind's segment type and UTC day.
    ///
    /// Keys carry a four-digit year, so days outside 0000-9999 are rejected.
    pub fn for_record(record: &EventRecord) -> Result<Self> {
        let date = record.timestamp().date();
        if !(0..=9999).contains(&date.year()) {
            return Err(Error::InvalidKey(format!(
                "record {} at {}ms falls outside the bucketable years",
                record.id,
                record.timestamp().as_millis()
            )));
        }
        Ok(Self::new(record.kind().segment_type(), date))
    }

    /// Parse `{type}-{YYYY-MM-DD}`
    pub fn parse(key: &str) -> Result<Self> {
        let invalid = || Error::InvalidKey(key.to_string());

        let split = key.len().checked_sub(DATE_SUFFIX_LEN).ok_or_else(invalid)?;
        if split == 0 || !key.is_char_boundary(split) {
            return Err(invalid());
        }

        let (segment_type, suffix) = key.split_at(split);
        let date_part = suffix.strip_prefix('-').ok_or_else(invalid)?;
        let (_, date) = all_consuming(date_bucket)(date_part).map_err(|_| invalid())?;

        Ok(Self::new(segment_type, date))
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.segment_type, format_date(self.date))
    }
}

impl FromStr for SegmentKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn digits(n: usize) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| take_while_m_n(n, n, |c: char| c.is_ascii_digit())(input)
}

fn date_bucket(input: &str) -> IResult<&str, NaiveDate> {
    map_res(
        recognize(tuple((digits(4), char('-'), digits(2), char('-'), digits(2)))),
        |s: &str| NaiveDate::parse_from_str(s, DATE_FORMAT),
    )(input)
}

/// Build the bucket key for a segment type and day
pub fn build_key(segment_type: &str, date: NaiveDate) -> String {
    SegmentKey::new(segment_type, date).to_string()
}

/// Recover the segment type from a bucket key
pub fn parse_type(key: &str) -> Result<String> {
    SegmentKey::parse(key).map(|k| k.segment_type)
}

/// Segment metadata, persisted separately from the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMeta {
    #[serde(rename = "type")]
    pub segment_type: String,
    pub date: NaiveDate,
    pub record_count: u32,
    pub size_bytes: u64,
    pub created_at: Timestamp,
    pub last_modified: Timestamp,
}

impl SegmentMeta {
    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(self.segment_type.clone(), self.date)
    }
}

/// A persisted batch of records for one `{type}-{date}` bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub meta: SegmentMeta,
    pub payload: Bytes,
}

impl Segment {
    /// Encode `records` into a new segment.
    ///
    /// `created_at` carries over the creation time of the segment being
    /// replaced; `None` marks a fresh segment.
    pub fn build(
        key: &SegmentKey,
        records: &[EventRecord],
        created_at: Option<Timestamp>,
        compression_level: i32,
    ) -> Result<Self> {
        let payload = encode_records(records, compression_level)?;
        let now = Timestamp::now();
        Ok(Self {
            meta: SegmentMeta {
                segment_type: key.segment_type.clone(),
                date: key.date,
                record_count: records.len() as u32,
                size_bytes: payload.len() as u64,
                created_at: created_at.unwrap_or(now),
                last_modified: now,
            },
            payload,
        })
    }

    pub fn key(&self) -> SegmentKey {
        self.meta.key()
    }

    /// Decode the records held by this segment
    pub fn records(&self) -> Result<Vec<EventRecord>> {
        decode_records(&self.payload).map_err(|e| Error::corrupt(self.key().to_string(), e))
    }
}
