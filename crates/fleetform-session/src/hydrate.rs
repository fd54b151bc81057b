//! Hydration adapter
//!
//! Maps a server entity graph into the shapes the store and the attachment
//! manager hold. Document descriptors always become persisted records;
//! rows carrying a server id become existing rows. Missing or malformed
//! nested data is skipped, never an error.

use fleetform_core::wire::{LEGACY_ID_KEY, SERVER_ID_KEY};
use fleetform_core::{
    DocumentDescriptor, EntitySchema, FieldMap, HydrationGraph, PersistedAttachment, RowOrigin,
    ServerId,
};
use serde_json::{Map, Value as JsonValue};

/// Server graph translated into session terms, before row ids are assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydratedEntity {
    pub entity_id: Option<ServerId>,
    pub fields: FieldMap,
    /// Rows per collection, in schema order, each with its origin.
    pub collections: Vec<(String, Vec<(RowOrigin, FieldMap)>)>,
    /// Persisted records keyed by semantic slot name, in server order.
    pub documents: Vec<(String, PersistedAttachment)>,
}

fn is_id_key(key: &str) -> bool {
    key == SERVER_ID_KEY || key == LEGACY_ID_KEY
}

/// Split an object into its server id and its field bag.
///
/// The id is read from `serverId`, falling back to `id`. When an id key is
/// present but unreadable the object keeps its raw id keys, so the value goes
/// back to the server untouched instead of turning into an insert.
fn split_id(context: &str, object: &Map<String, JsonValue>) -> (Option<ServerId>, FieldMap) {
    let server_id = object
        .get(SERVER_ID_KEY)
        .and_then(ServerId::from_json)
        .or_else(|| object.get(LEGACY_ID_KEY).and_then(ServerId::from_json));

    let has_raw_id = object
        .iter()
        .any(|(key, value)| is_id_key(key) && !value.is_null());
    if server_id.is_none() && has_raw_id {
        tracing::warn!(
            context = %context,
            server_id = ?object.get(SERVER_ID_KEY),
            id = ?object.get(LEGACY_ID_KEY),
            "Unreadable server id, keeping raw id keys"
        );
    }

    let fields = object
        .iter()
        .filter(|(key, value)| {
            !is_id_key(key) || (server_id.is_none() && !value.is_null())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (server_id, fields)
}

fn hydrate_rows(collection: &str, value: Option<&JsonValue>) -> Vec<(RowOrigin, FieldMap)> {
    let Some(items) = value.and_then(JsonValue::as_array) else {
        if value.is_some_and(|v| !v.is_null()) {
            tracing::warn!(collection = %collection, "Collection is not an array, hydrating empty");
        }
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let Some(object) = item.as_object() else {
                tracing::warn!(collection = %collection, "Skipping non-object row");
                return None;
            };
            let (server_id, fields) = split_id(collection, object);
            let origin = match server_id {
                Some(server_id) => RowOrigin::Existing { server_id },
                None => RowOrigin::New,
            };
            Some((origin, fields))
        })
        .collect()
}

fn hydrate_documents(
    schema: &EntitySchema,
    key: &str,
    value: Option<&JsonValue>,
) -> Vec<(String, PersistedAttachment)> {
    let Some(items) = value.and_then(JsonValue::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let descriptor: DocumentDescriptor = match serde_json::from_value(item.clone()) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping malformed document descriptor");
                    return None;
                }
            };
            let Some(spec) = schema.slot_for_wire_field(&descriptor.slot_field_name) else {
                tracing::warn!(
                    slot_field = %descriptor.slot_field_name,
                    server_id = %descriptor.server_id,
                    "Skipping document for unknown slot"
                );
                return None;
            };
            Some((
                spec.name.clone(),
                PersistedAttachment {
                    server_id: descriptor.server_id,
                    filename: descriptor.filename,
                    mime_type: descriptor.mime_type,
                    size_bytes: descriptor.size_bytes,
                    remote_reference: descriptor.remote_reference,
                },
            ))
        })
        .collect()
}

pub fn hydrate(schema: &EntitySchema, graph: &HydrationGraph) -> HydratedEntity {
    let root = &graph.0;

    let nested: Vec<&str> = schema
        .collections
        .iter()
        .map(|c| c.name.as_str())
        .chain(schema.document_keys.iter().map(String::as_str))
        .collect();

    let (entity_id, fields) = split_id(&schema.entity, root);
    let fields = fields
        .into_iter()
        .filter(|(key, _)| !nested.contains(&key.as_str()))
        .collect();

    let collections = schema
        .collections
        .iter()
        .map(|c| (c.name.clone(), hydrate_rows(&c.name, root.get(&c.name))))
        .collect();

    let documents = schema
        .document_keys
        .iter()
        .flat_map(|key| hydrate_documents(schema, key, root.get(key)))
        .collect();

    HydratedEntity {
        entity_id,
        fields,
        collections,
        documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetform_core::{CollectionSpec, SlotSpec};
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::new("drivers", "driver")
            .collection(CollectionSpec::new("contacts", "emergencyContacts"))
            .collection(CollectionSpec::new("trips", "tripLegs"))
            .slot(SlotSpec::single("license", "DL"))
            .slot(SlotSpec::multiple("insurance", "INSURANCE"))
    }

    fn graph(value: JsonValue) -> HydrationGraph {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_graph() {
        let hydrated = hydrate(
            &schema(),
            &graph(json!({
                "id": 7,
                "fullName": "R. Iyer",
                "contacts": [
                    {"serverId": 41, "name": "Meena"},
                    {"name": "Unsaved"}
                ],
                "documents": [
                    {"serverId": 3, "filename": "dl.pdf", "mimeType": "application/pdf",
                     "sizeBytes": 1024, "remoteReference": "/files/3", "slotFieldName": "DL"}
                ]
            })),
        );

        assert_eq!(hydrated.entity_id, Some(ServerId::new(7)));
        assert_eq!(hydrated.fields.get("fullName"), Some(&json!("R. Iyer")));
        assert!(!hydrated.fields.contains_key("id"));
        assert!(!hydrated.fields.contains_key("contacts"));

        let (name, contacts) = &hydrated.collections[0];
        assert_eq!(name, "contacts");
        assert_eq!(
            contacts[0].0,
            RowOrigin::Existing {
                server_id: ServerId::new(41)
            }
        );
        assert!(!contacts[0].1.contains_key("serverId"));
        assert_eq!(contacts[1].0, RowOrigin::New);

        assert_eq!(hydrated.documents.len(), 1);
        assert_eq!(hydrated.documents[0].0, "license");
        assert_eq!(hydrated.documents[0].1.remote_reference, "/files/3");
    }

    #[test]
    fn test_missing_collections_hydrate_empty() {
        let hydrated = hydrate(&schema(), &graph(json!({"serverId": "12", "trips": null})));
        assert_eq!(hydrated.entity_id, Some(ServerId::new(12)));
        assert!(hydrated.collections.iter().all(|(_, rows)| rows.is_empty()));
        assert!(hydrated.documents.is_empty());
    }

    #[test]
    fn test_numeric_string_ids_everywhere() {
        let hydrated = hydrate(
            &schema(),
            &graph(json!({
                "id": "7",
                "contacts": [{"serverId": "41"}],
                "documents": [
                    {"serverId": "3", "filename": "dl.pdf", "mimeType": "application/pdf",
                     "sizeBytes": 1024, "remoteReference": "/files/3", "slotFieldName": "DL"}
                ]
            })),
        );
        assert_eq!(hydrated.entity_id, Some(ServerId::new(7)));
        assert_eq!(hydrated.collections[0].1[0].0.server_id(), Some(ServerId::new(41)));
        assert_eq!(hydrated.documents.len(), 1);
        assert_eq!(hydrated.documents[0].1.server_id, ServerId::new(3));
    }

    #[test]
    fn test_unreadable_row_id_is_kept_verbatim() {
        let hydrated = hydrate(
            &schema(),
            &graph(json!({
                "contacts": [
                    {"serverId": "C-9", "name": "Ravi"},
                    {"serverId": null, "name": "Fresh"}
                ]
            })),
        );
        let rows = &hydrated.collections[0].1;
        assert_eq!(rows[0].0, RowOrigin::New);
        assert_eq!(rows[0].1.get("serverId"), Some(&json!("C-9")));
        assert_eq!(rows[0].1.get("name"), Some(&json!("Ravi")));
        assert!(!rows[1].1.contains_key("serverId"));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let hydrated = hydrate(
            &schema(),
            &graph(json!({
                "contacts": [1, {"id": 5}],
                "trips": {"not": "an array"},
                "documents": [
                    {"filename": "no-id.pdf", "slotFieldName": "DL"},
                    {"serverId": 8, "slotFieldName": "PASSPORT"},
                    {"serverId": 9, "slotFieldName": "INSURANCE"}
                ]
            })),
        );
        assert_eq!(hydrated.collections[0].1.len(), 1);
        assert!(hydrated.collections[1].1.is_empty());
        assert_eq!(hydrated.documents.len(), 1);
        assert_eq!(hydrated.documents[0].0, "insurance");
    }
}
