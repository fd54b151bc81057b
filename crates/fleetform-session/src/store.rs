//! Entity session store
//!
//! Scalar fields, child-row collections and the validation error map of the
//! root entity. Rows get their `RowId` from the store's allocator when they
//! are created or hydrated; row ids are never reassigned.

use std::collections::BTreeMap;

use fleetform_core::validation::ValidationErrorMap;
use fleetform_core::{
    ChildRow, EntitySchema, EntitySnapshot, FieldMap, FormError, IdAllocator, RowId, RowOrigin,
    ServerId,
};
use serde_json::Value as JsonValue;

use crate::hydrate::HydratedEntity;

#[derive(Debug)]
pub struct EntityStore {
    entity_id: Option<ServerId>,
    fields: FieldMap,
    collections: BTreeMap<String, Vec<ChildRow>>,
    errors: ValidationErrorMap,
    ids: IdAllocator,
}

impl EntityStore {
    /// Empty store with one (empty) collection per collection in the schema.
    pub fn new(schema: &EntitySchema) -> Self {
        Self {
            entity_id: None,
            fields: FieldMap::new(),
            collections: schema
                .collections
                .iter()
                .map(|c| (c.name.clone(), Vec::new()))
                .collect(),
            errors: ValidationErrorMap::new(),
            ids: IdAllocator::new(),
        }
    }

    pub fn entity_id(&self) -> Option<ServerId> {
        self.entity_id
    }

    pub fn set_entity_id(&mut self, entity_id: Option<ServerId>) {
        self.entity_id = entity_id;
    }

    pub fn field(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    pub fn rows(&self, collection: &str) -> Result<&[ChildRow], FormError> {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .ok_or_else(|| FormError::UnknownCollection(collection.to_string()))
    }

    pub fn errors(&self) -> &ValidationErrorMap {
        &self.errors
    }

    pub fn remove_error(&mut self, key: &str) {
        self.errors.remove(key);
    }

    pub fn replace_errors(&mut self, errors: ValidationErrorMap) {
        self.errors = errors;
    }

    fn collection_mut(&mut self, collection: &str) -> Result<&mut Vec<ChildRow>, FormError> {
        self.collections
            .get_mut(collection)
            .ok_or_else(|| FormError::UnknownCollection(collection.to_string()))
    }

    /// Set a root scalar and clear its error.
    pub fn set_field(&mut self, key: &str, value: JsonValue) {
        self.fields.insert(key.to_string(), value);
        self.errors.remove(key);
    }

    pub fn add_row(&mut self, collection: &str, initial: FieldMap) -> Result<RowId, FormError> {
        self.insert_row(collection, RowOrigin::New, initial)
    }

    fn insert_row(
        &mut self,
        collection: &str,
        origin: RowOrigin,
        fields: FieldMap,
    ) -> Result<RowId, FormError> {
        let row_id = self.ids.next_row();
        self.collection_mut(collection)?
            .push(ChildRow::new(row_id, origin, fields));
        // The collection-level error (e.g. too few rows) may no longer hold.
        self.errors.remove(collection);
        Ok(row_id)
    }

    /// Set one field of one row. Returns `false`, changing nothing, if the row does not exist.
    pub fn update_row(
        &mut self,
        collection: &str,
        row_id: RowId,
        key: &str,
        value: JsonValue,
    ) -> Result<bool, FormError> {
        let rows = self.collection_mut(collection)?;
        let Some(row) = rows.iter_mut().find(|r| r.row_id() == row_id) else {
            tracing::warn!(
                collection = %collection,
                row_id = %row_id,
                field = %key,
                "update_row on a row that does not exist"
            );
            return Ok(false);
        };
        row.set(key, value);
        self.errors
            .remove(&ValidationErrorMap::row_key(collection, row_id, key));
        Ok(true)
    }

    /// Delete a row. Existing rows disappear from the next submission, which
    /// the server reads as a delete under full-collection replacement.
    pub fn remove_row(
        &mut self,
        collection: &str,
        row_id: RowId,
    ) -> Result<Option<ChildRow>, FormError> {
        let rows = self.collection_mut(collection)?;
        let Some(index) = rows.iter().position(|r| r.row_id() == row_id) else {
            return Ok(None);
        };
        let removed = rows.remove(index);
        self.errors
            .remove_prefix(&ValidationErrorMap::row_prefix(collection, row_id));
        Ok(Some(removed))
    }

    /// Move a row to `new_index` (clamped to the end of the collection).
    pub fn move_row(
        &mut self,
        collection: &str,
        row_id: RowId,
        new_index: usize,
    ) -> Result<bool, FormError> {
        let rows = self.collection_mut(collection)?;
        let Some(index) = rows.iter().position(|r| r.row_id() == row_id) else {
            return Ok(false);
        };
        let row = rows.remove(index);
        let target = new_index.min(rows.len());
        rows.insert(target, row);
        Ok(true)
    }

    /// Replace all state with a hydrated entity. Collections the server did
    /// not send come back empty; rows get fresh row ids.
    pub fn load(&mut self, entity: HydratedEntity) -> Result<(), FormError> {
        for rows in self.collections.values_mut() {
            rows.clear();
        }
        self.entity_id = entity.entity_id;
        self.fields = entity.fields;
        self.errors = ValidationErrorMap::new();

        for (collection, rows) in entity.collections {
            for (origin, fields) in rows {
                self.insert_row(&collection, origin, fields)?;
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            entity_id: self.entity_id,
            fields: self.fields.clone(),
            collections: self.collections.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetform_core::{CollectionSpec, FieldSpec};
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::new("invoices", "invoice")
            .field(FieldSpec::new("vendor").required())
            .collection(CollectionSpec::new("charges", "additionalCharges"))
    }

    fn fields(pairs: &[(&str, JsonValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_set_field_clears_error() {
        let mut store = EntityStore::new(&schema());
        let mut errors = ValidationErrorMap::new();
        errors.insert("vendor", "Vendor is required");
        errors.insert("other", "still wrong");
        store.replace_errors(errors);

        store.set_field("vendor", json!("Acme Logistics"));
        assert!(!store.errors().contains("vendor"));
        assert!(store.errors().contains("other"));
        assert_eq!(store.field("vendor"), Some(&json!("Acme Logistics")));
    }

    #[test]
    fn test_rows_keep_insertion_order_and_ids() {
        let mut store = EntityStore::new(&schema());
        let a = store.add_row("charges", fields(&[("amount", json!(10))])).unwrap();
        let b = store.add_row("charges", fields(&[("amount", json!(20))])).unwrap();
        let c = store.add_row("charges", FieldMap::new()).unwrap();

        let ids: Vec<RowId> = store.rows("charges").unwrap().iter().map(ChildRow::row_id).collect();
        assert_eq!(ids, vec![a, b, c]);

        store.remove_row("charges", b).unwrap();
        let d = store.add_row("charges", FieldMap::new()).unwrap();
        assert_ne!(d, b);
        assert!(store.rows("charges").unwrap().iter().all(|r| r.origin().is_new()));
    }

    #[test]
    fn test_update_row_on_missing_row_is_noop() {
        let mut store = EntityStore::new(&schema());
        let row = store.add_row("charges", FieldMap::new()).unwrap();
        store.remove_row("charges", row).unwrap();

        let before = store.snapshot();
        assert!(!store.update_row("charges", row, "amount", json!(5)).unwrap());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_update_and_remove_clear_row_errors() {
        let mut store = EntityStore::new(&schema());
        let row = store.add_row("charges", FieldMap::new()).unwrap();
        let mut errors = ValidationErrorMap::new();
        errors.insert(ValidationErrorMap::row_key("charges", row, "amount"), "required");
        errors.insert(ValidationErrorMap::row_key("charges", row, "description"), "required");
        store.replace_errors(errors);

        store.update_row("charges", row, "amount", json!(5)).unwrap();
        assert_eq!(store.errors().len(), 1);

        store.remove_row("charges", row).unwrap();
        assert!(store.errors().is_empty());
    }

    #[test]
    fn test_move_row() {
        let mut store = EntityStore::new(&schema());
        let a = store.add_row("charges", FieldMap::new()).unwrap();
        let b = store.add_row("charges", FieldMap::new()).unwrap();
        let c = store.add_row("charges", FieldMap::new()).unwrap();

        assert!(store.move_row("charges", c, 0).unwrap());
        assert!(store.move_row("charges", a, 99).unwrap());
        let ids: Vec<RowId> = store.rows("charges").unwrap().iter().map(ChildRow::row_id).collect();
        assert_eq!(ids, vec![c, b, a]);
    }

    #[test]
    fn test_unknown_collection() {
        let mut store = EntityStore::new(&schema());
        assert!(matches!(
            store.add_row("tyres", FieldMap::new()),
            Err(FormError::UnknownCollection(_))
        ));
    }
}
