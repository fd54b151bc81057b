use std::collections::BTreeMap;

use super::{ChildRow, FieldMap};
use crate::ids::{RowId, ServerId};

/// Read-only projection of a root entity and its child collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySnapshot {
    /// Present when the session edits an entity that already exists server-side.
    pub entity_id: Option<ServerId>,
    pub fields: FieldMap,
    pub collections: BTreeMap<String, Vec<ChildRow>>,
}

impl EntitySnapshot {
    /// Rows of a collection in display order; empty if the collection is unknown.
    pub fn rows(&self, collection: &str) -> &[ChildRow] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn row(&self, collection: &str, row_id: RowId) -> Option<&ChildRow> {
        self.rows(collection).iter().find(|r| r.row_id() == row_id)
    }
}
