use serde_json::Value as JsonValue;

use super::FieldMap;
use crate::ids::{RowId, RowOrigin, ServerId};

/// One row of a child collection.
///
/// `row_id` is fixed at construction. A row whose origin is
/// `RowOrigin::Existing` is submitted as an update, a `RowOrigin::New` row as
/// an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRow {
    row_id: RowId,
    origin: RowOrigin,
    fields: FieldMap,
}

impl ChildRow {
    pub fn new(row_id: RowId, origin: RowOrigin, fields: FieldMap) -> Self {
        Self {
            row_id,
            origin,
            fields,
        }
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn origin(&self) -> RowOrigin {
        self.origin
    }

    pub fn server_id(&self) -> Option<ServerId> {
        self.origin.server_id()
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: JsonValue) {
        self.fields.insert(key.into(), value);
    }
}
