//! Identifier types
//!
//! Locally allocated identifiers (`RowId`, `LocalAttachmentId`) and server
//! identifiers (`ServerId`) are distinct types. Whether a row or attachment
//! is new or already stored is carried by an explicit tag (`RowOrigin`,
//! `AttachmentId`), never inferred from the numeric value of an id.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Session-local identifier of a child row. Assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RowId(u64);

impl RowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session-local identifier of a staged attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LocalAttachmentId(u64);

impl LocalAttachmentId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocalAttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

/// Identifier assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(i64);

impl ServerId {
    pub fn new(id: i64) -> Self {
        ServerId(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Read an id sent as a JSON number or a numeric string.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(ServerId),
            JsonValue::String(s) => s.trim().parse::<i64>().ok().map(ServerId),
            _ => None,
        }
    }
}

/// `deserialize_with` helper accepting the same id forms as `ServerId::from_json`.
pub fn deserialize_server_id<'de, D>(deserializer: D) -> Result<ServerId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    ServerId::from_json(&value)
        .ok_or_else(|| D::Error::custom(format!("invalid server id: {}", value)))
}

impl From<i64> for ServerId {
    fn from(id: i64) -> Self {
        ServerId(id)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance of a child row: created in this session, or hydrated from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RowOrigin {
    New,
    Existing {
        #[serde(rename = "serverId")]
        server_id: ServerId,
    },
}

impl RowOrigin {
    pub fn server_id(&self) -> Option<ServerId> {
        match self {
            RowOrigin::New => None,
            RowOrigin::Existing { server_id } => Some(*server_id),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RowOrigin::New)
    }
}

/// Identifier of an attachment record, tagged with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentId {
    Staged(LocalAttachmentId),
    Persisted(ServerId),
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentId::Staged(id) => write!(f, "{}", id),
            AttachmentId::Persisted(id) => write!(f, "server-{}", id),
        }
    }
}

/// Monotonic allocator for session-local identifiers.
///
/// Counters start at 1 and only move forward, so an identifier handed out
/// once is never handed out again by the same allocator.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last_row: u64,
    last_attachment: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_row(&mut self) -> RowId {
        self.last_row += 1;
        RowId(self.last_row)
    }

    pub fn next_attachment(&mut self) -> LocalAttachmentId {
        self.last_attachment += 1;
        LocalAttachmentId(self.last_attachment)
    }
}
