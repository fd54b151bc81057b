//! Validation engine
//!
//! `validate` is a pure function of the schema, the entity snapshot, the
//! attachment slots and the validation day. It recomputes the whole error
//! map; the session store clears individual entries as fields are edited.

pub mod attachment;
pub mod rules;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::ids::RowId;
use crate::models::{AttachmentSlot, EntitySchema, EntitySnapshot};

pub use attachment::{content_type_for_filename, expected_content_types, AttachmentPolicy};
pub use rules::{check_field, parse_date};

/// Inputs to validation that are not part of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    pub today: NaiveDate,
}

impl ValidationContext {
    pub fn on(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today() -> Self {
        Self::on(chrono::Local::now().date_naive())
    }
}

/// Error messages keyed by field key.
///
/// Keys are a root field name, `collection.rowId.field` for row fields, or
/// the collection or slot name for collection- and slot-level errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrorMap(BTreeMap<String, String>);

impl ValidationErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_key(collection: &str, row_id: RowId, field: &str) -> String {
        format!("{}.{}.{}", collection, row_id, field)
    }

    pub fn row_prefix(collection: &str, row_id: RowId) -> String {
        format!("{}.{}.", collection, row_id)
    }

    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.insert(key.into(), message.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|key, _| !key.starts_with(prefix));
        before - self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Evaluate every rule of `schema` against the snapshot and slots.
pub fn validate(
    schema: &EntitySchema,
    snapshot: &EntitySnapshot,
    slots: &[AttachmentSlot],
    ctx: &ValidationContext,
) -> ValidationErrorMap {
    let mut errors = ValidationErrorMap::new();

    for field in &schema.fields {
        if let Some(message) = check_field(field, &snapshot.fields, &schema.fields, ctx) {
            errors.insert(field.key.clone(), message);
        }
    }

    for collection in &schema.collections {
        let rows = snapshot.rows(&collection.name);
        if rows.len() < collection.min_rows {
            errors.insert(
                collection.name.clone(),
                format!(
                    "{} requires at least {} row(s)",
                    collection.label, collection.min_rows
                ),
            );
        }
        for row in rows {
            for field in &collection.row_fields {
                if let Some(message) = check_field(field, row.fields(), &collection.row_fields, ctx)
                {
                    errors.insert(
                        ValidationErrorMap::row_key(&collection.name, row.row_id(), &field.key),
                        message,
                    );
                }
            }
        }
    }

    // Records already moved to pending deletion are no longer in the slot,
    // so a mandatory slot emptied by a removal fails here.
    for spec in schema.slots.iter().filter(|s| s.mandatory) {
        let present = slots
            .iter()
            .find(|slot| slot.name() == spec.name)
            .is_some_and(|slot| !slot.is_empty());
        if !present {
            errors.insert(spec.name.clone(), format!("{} is required", spec.label));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{IdAllocator, RowOrigin, ServerId};
    use crate::models::{
        AttachmentRecord, ChildRow, CollectionSpec, FieldRule, FieldSpec, PersistedAttachment,
        SlotSpec,
    };
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::new("drivers", "driver")
            .field(FieldSpec::new("name").label("Name").required())
            .field(
                FieldSpec::new("licenseExpiry")
                    .label("License expiry")
                    .rule(FieldRule::NotBeforeToday),
            )
            .collection(
                CollectionSpec::new("trips", "tripLegs")
                    .label("Trips")
                    .row_field(FieldSpec::new("km").label("Distance").required())
                    .min_rows(1),
            )
            .slot(SlotSpec::single("license", "DL").label("License").mandatory())
    }

    fn ctx() -> ValidationContext {
        ValidationContext::on(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    fn license_slot(with_record: bool) -> Vec<AttachmentSlot> {
        let mut slot = AttachmentSlot::new(&SlotSpec::single("license", "DL"));
        if with_record {
            slot.push(AttachmentRecord::Persisted(PersistedAttachment {
                server_id: ServerId::new(3),
                filename: "dl.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                size_bytes: 10,
                remote_reference: "files/dl.pdf".to_string(),
            }));
        }
        vec![slot]
    }

    #[test]
    fn test_empty_snapshot_reports_every_rule_class() {
        let errors = validate(&schema(), &EntitySnapshot::default(), &license_slot(false), &ctx());
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("trips"), Some("Trips requires at least 1 row(s)"));
        assert_eq!(errors.get("license"), Some("License is required"));
        assert!(!errors.contains("licenseExpiry"));
    }

    #[test]
    fn test_row_errors_use_row_keys() {
        let mut ids = IdAllocator::new();
        let row_id = ids.next_row();
        let mut snapshot = EntitySnapshot::default();
        snapshot.fields.insert("name".into(), json!("Asha"));
        snapshot.collections.insert(
            "trips".into(),
            vec![ChildRow::new(row_id, RowOrigin::New, Default::default())],
        );

        let errors = validate(&schema(), &snapshot, &license_slot(true), &ctx());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get(&ValidationErrorMap::row_key("trips", row_id, "km")),
            Some("Distance is required")
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut snapshot = EntitySnapshot::default();
        snapshot
            .fields
            .insert("licenseExpiry".into(), json!("2020-01-01"));
        let slots = license_slot(false);
        let first = validate(&schema(), &snapshot, &slots, &ctx());
        let second = validate(&schema(), &snapshot, &slots, &ctx());
        assert_eq!(first, second);
        assert!(first.contains("licenseExpiry"));
    }

    #[test]
    fn test_error_map_prefix_removal() {
        let mut ids = IdAllocator::new();
        let a = ids.next_row();
        let b = ids.next_row();
        let mut errors = ValidationErrorMap::new();
        errors.insert(ValidationErrorMap::row_key("trips", a, "km"), "x");
        errors.insert(ValidationErrorMap::row_key("trips", a, "to"), "y");
        errors.insert(ValidationErrorMap::row_key("trips", b, "km"), "z");

        assert_eq!(errors.remove_prefix(&ValidationErrorMap::row_prefix("trips", a)), 2);
        assert_eq!(errors.len(), 1);
    }
}
