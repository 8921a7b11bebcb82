//! Telemetry record types

use crate::core::temporal::Timestamp;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique record identifier
pub type RecordId = String;

/// Type tag of a record, derived from its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Violation,
    NetworkRequest,
    GenericEvent,
}

impl RecordKind {
    /// All record kinds, in segment listing order
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Violation,
        RecordKind::NetworkRequest,
        RecordKind::GenericEvent,
    ];

    /// Tag used on the wire and in the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Violation => "violation",
            RecordKind::NetworkRequest => "network-request",
            RecordKind::GenericEvent => "generic-event",
        }
    }

    /// Segment type tag records of this kind are bucketed under.
    pub fn segment_type(&self) -> &'static str {
        match self {
            RecordKind::Violation => "csp-violations",
            RecordKind::NetworkRequest => "network-requests",
            RecordKind::GenericEvent => "security-events",
        }
    }

    /// Reverse of [`RecordKind::segment_type`]
    pub fn from_segment_type(segment_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.segment_type() == segment_type)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Query(format!("unknown record type: {s}")))
    }
}

/// Whether a policy was enforced or only reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Enforce,
    Report,
}

/// What initiated a network request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorType {
    Fetch,
    Xhr,
    Websocket,
    Beacon,
    Script,
    Img,
    Style,
    Frame,
    Font,
    Media,
}

/// Policy violation details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationDetails {
    pub directive: String,
    pub blocked_url: String,
    pub disposition: Disposition,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub column_number: Option<u32>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

/// Observed network request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequestDetails {
    pub url: String,
    pub method: String,
    pub initiator: InitiatorType,
    #[serde(default)]
    pub resource_type: Option<String>,
}

/// Record payload; the variant doubles as the record's type tag.
///
/// Externally tagged so the same shape round-trips through both JSON and
/// bincode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordPayload {
    Violation(ViolationDetails),
    NetworkRequest(NetworkRequestDetails),
    GenericEvent(BTreeMap<String, String>),
}

/// A single telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique ID
    pub id: RecordId,
    /// Page or origin the record was observed on
    pub domain: String,
    /// When the record was observed
    pub timestamp: Timestamp,
    /// Type-specific data
    pub payload: RecordPayload,
}

impl EventRecord {
    /// Create a record with a freshly generated ID
    pub fn new(domain: impl Into<String>, timestamp: Timestamp, payload: RecordPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            domain: domain.into(),
            timestamp,
            payload,
        }
    }

    /// Create a violation record
    pub fn violation(
        domain: impl Into<String>,
        timestamp: Timestamp,
        details: ViolationDetails,
    ) -> Self {
        Self::new(domain, timestamp, RecordPayload::Violation(details))
    }

    /// Create a network request record
    pub fn network_request(
        domain: impl Into<String>,
        timestamp: Timestamp,
        details: NetworkRequestDetails,
    ) -> Self {
        Self::new(domain, timestamp, RecordPayload::NetworkRequest(details))
    }

    /// Create a generic event record
    pub fn generic_event(
        domain: impl Into<String>,
        timestamp: Timestamp,
        details: BTreeMap<String, String>,
    ) -> Self {
        Self::new(domain, timestamp, RecordPayload::GenericEvent(details))
    }

    /// Override the generated ID
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = id.into();
        self
    }

    /// Get the record's type tag
    pub fn kind(&self) -> RecordKind {
        match self.payload {
            RecordPayload::Violation(_) => RecordKind::Violation,
            RecordPayload::NetworkRequest(_) => RecordKind::NetworkRequest,
            RecordPayload::GenericEvent(_) => RecordKind::GenericEvent,
        }
    }

    /// Get the record ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the timestamp
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}
