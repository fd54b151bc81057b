//! Wire contract
//!
//! Inbound: the hydration graph returned by fetch-by-id. Outbound: the
//! multipart payload produced by the payload assembler, modelled as an
//! ordered list of JSON and binary parts so it can be inspected without a
//! transport.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::ids::ServerId;

/// Name of the JSON part listing attachments the server must delete.
pub const PENDING_DELETIONS_PART: &str = "deletedDocuments";

/// Key carrying a server identifier in rows and in the root object.
pub const SERVER_ID_KEY: &str = "serverId";

/// Alternative id key accepted on inbound rows and roots.
pub const LEGACY_ID_KEY: &str = "id";

/// Raw entity graph returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HydrationGraph(pub Map<String, JsonValue>);

impl HydrationGraph {
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }
}

impl From<Map<String, JsonValue>> for HydrationGraph {
    fn from(map: Map<String, JsonValue>) -> Self {
        HydrationGraph(map)
    }
}

/// Server-side document metadata as it appears in the hydration graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    #[serde(deserialize_with = "crate::ids::deserialize_server_id")]
    pub server_id: ServerId,
    pub slot_field_name: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub remote_reference: String,
}

/// Instruction to delete one persisted attachment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeletion {
    pub server_id: ServerId,
    pub slot_field_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadPart {
    Json {
        name: String,
        body: String,
    },
    Binary {
        name: String,
        filename: String,
        mime_type: String,
        bytes: Bytes,
    },
}

impl PayloadPart {
    pub fn name(&self) -> &str {
        match self {
            PayloadPart::Json { name, .. } | PayloadPart::Binary { name, .. } => name,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, PayloadPart::Json { .. })
    }
}

/// One save request: create when `entity_id` is absent, update otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPayload {
    pub entity: String,
    pub entity_id: Option<ServerId>,
    pub parts: Vec<PayloadPart>,
}

impl OutboundPayload {
    pub fn json_parts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parts.iter().filter_map(|p| match p {
            PayloadPart::Json { name, body } => Some((name.as_str(), body.as_str())),
            PayloadPart::Binary { .. } => None,
        })
    }

    pub fn binary_parts(&self) -> impl Iterator<Item = &PayloadPart> {
        self.parts.iter().filter(|p| !p.is_json())
    }

    /// Body of the named JSON part.
    pub fn json_part(&self, name: &str) -> Option<&str> {
        self.json_parts().find(|(n, _)| *n == name).map(|(_, body)| body)
    }

    /// Parse the named JSON part.
    pub fn json_value(&self, name: &str) -> Option<JsonValue> {
        self.json_part(name)
            .and_then(|body| serde_json::from_str(body).ok())
    }
}

/// Backend acknowledgement of a successful save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    #[serde(default, alias = "id")]
    pub server_id: Option<ServerId>,
    #[serde(default)]
    pub message: Option<String>,
}
