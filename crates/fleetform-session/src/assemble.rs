//! Payload assembler
//!
//! Turns session state into one multipart submission. Reads only; calling it
//! twice on unchanged state yields byte-identical JSON parts because every
//! object is serialized from a `BTreeMap`.

use std::collections::{BTreeMap, BTreeSet};

use fleetform_core::wire::{LEGACY_ID_KEY, PENDING_DELETIONS_PART, SERVER_ID_KEY};
use fleetform_core::{
    AttachmentSlot, EntitySchema, EntitySnapshot, FieldMap, FormError, OutboundPayload,
    PayloadPart, PendingDeletion, ServerId,
};
use serde_json::Value as JsonValue;

/// Field bag plus `serverId` when the object exists server-side.
///
/// Objects without a typed id keep whatever raw id keys they carry; with one,
/// the typed id replaces them.
fn wire_object(fields: &FieldMap, server_id: Option<ServerId>) -> BTreeMap<String, JsonValue> {
    let mut object: BTreeMap<String, JsonValue> = fields
        .iter()
        .filter(|(key, _)| {
            server_id.is_none() || (key.as_str() != SERVER_ID_KEY && key.as_str() != LEGACY_ID_KEY)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(server_id) = server_id {
        object.insert(SERVER_ID_KEY.to_string(), JsonValue::from(server_id.get()));
    }
    object
}

fn json_part<T: serde::Serialize>(name: &str, body: &T) -> Result<PayloadPart, FormError> {
    Ok(PayloadPart::Json {
        name: name.to_string(),
        body: serde_json::to_string(body)?,
    })
}

pub fn assemble(
    schema: &EntitySchema,
    snapshot: &EntitySnapshot,
    slots: &[AttachmentSlot],
    pending: &BTreeSet<PendingDeletion>,
) -> Result<OutboundPayload, FormError> {
    let mut parts = Vec::new();

    parts.push(json_part(
        &schema.root_part,
        &wire_object(&snapshot.fields, snapshot.entity_id),
    )?);

    // Removed rows are simply absent: the server replaces each collection wholesale.
    for collection in &schema.collections {
        let rows: Vec<BTreeMap<String, JsonValue>> = snapshot
            .rows(&collection.name)
            .iter()
            .map(|row| wire_object(row.fields(), row.server_id()))
            .collect();
        parts.push(json_part(&collection.part, &rows)?);
    }

    // Persisted records that remain are kept server-side and need no part.
    for spec in &schema.slots {
        let Some(slot) = slots.iter().find(|s| s.name() == spec.name) else {
            continue;
        };
        for staged in slot.staged() {
            parts.push(PayloadPart::Binary {
                name: slot.wire_field().to_string(),
                filename: staged.filename().to_string(),
                mime_type: staged.mime_type().to_string(),
                bytes: staged.bytes().clone(),
            });
        }
    }

    let deletions: Vec<&PendingDeletion> = pending.iter().collect();
    parts.push(json_part(PENDING_DELETIONS_PART, &deletions)?);

    let payload = OutboundPayload {
        entity: schema.entity.clone(),
        entity_id: snapshot.entity_id,
        parts,
    };
    tracing::debug!(
        entity = %payload.entity,
        parts = payload.parts.len(),
        binaries = payload.binary_parts().count(),
        deletions = pending.len(),
        "Assembled payload"
    );
    Ok(payload)
}
