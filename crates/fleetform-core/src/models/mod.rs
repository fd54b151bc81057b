//! Domain models
//!
//! Scalar field bags, child rows, attachment records and slots, the entity
//! snapshot, and the per-domain schemas that parameterize the engine.

pub mod attachment;
pub mod entity;
pub mod row;
pub mod schema;

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

pub use attachment::{
    AttachmentRecord, AttachmentSlot, PersistedAttachment, PreviewHandle, PreviewProvider,
    StagedAttachment, StagedFile,
};
pub use entity::EntitySnapshot;
pub use row::ChildRow;
pub use schema::{Cardinality, CollectionSpec, EntitySchema, FieldRule, FieldSpec, SlotSpec};

/// Field values keyed by field name. Ordered so serialized output is stable.
pub type FieldMap = BTreeMap<String, JsonValue>;

/// True for values a user would consider "not filled in".
pub fn is_blank(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(JsonValue::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!(null))));
        assert!(is_blank(Some(&json!("   "))));
        assert!(is_blank(Some(&json!([]))));
        assert!(!is_blank(Some(&json!(0))));
        assert!(!is_blank(Some(&json!(false))));
        assert!(!is_blank(Some(&json!("x"))));
    }
}
