//! Entity schemas
//!
//! A schema names the scalar fields, child collections and attachment slots
//! of one domain entity (invoice, driver, vehicle, ...) together with the
//! rules the validation engine applies and the names used on the wire.

use std::collections::HashSet;

use regex::Regex;

use crate::error::FormError;

/// Whether a slot holds at most one record or any number of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Multiple,
}

/// Declaration of one attachment slot.
#[derive(Debug, Clone)]
pub struct SlotSpec {
    /// Semantic name used inside the engine (e.g. "license").
    pub name: String,
    /// Multipart field name expected by the backend (e.g. "DL").
    pub wire_field: String,
    pub label: String,
    pub cardinality: Cardinality,
    pub mandatory: bool,
    /// Overrides the engine-wide size ceiling for this slot.
    pub max_size_bytes: Option<u64>,
    /// Overrides the engine-wide MIME allow-list for this slot.
    pub allowed_content_types: Option<Vec<String>>,
}

impl SlotSpec {
    fn new(name: &str, wire_field: &str, cardinality: Cardinality) -> Self {
        Self {
            name: name.to_string(),
            wire_field: wire_field.to_string(),
            label: name.to_string(),
            cardinality,
            mandatory: false,
            max_size_bytes: None,
            allowed_content_types: None,
        }
    }

    pub fn single(name: &str, wire_field: &str) -> Self {
        Self::new(name, wire_field, Cardinality::Single)
    }

    pub fn multiple(name: &str, wire_field: &str) -> Self {
        Self::new(name, wire_field, Cardinality::Multiple)
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn max_size_bytes(mut self, max: u64) -> Self {
        self.max_size_bytes = Some(max);
        self
    }

    pub fn allowed_content_types(mut self, types: &[&str]) -> Self {
        self.allowed_content_types = Some(types.iter().map(|t| t.to_lowercase()).collect());
        self
    }
}

/// A rule evaluated against one field value.
#[derive(Debug, Clone)]
pub enum FieldRule {
    Required,
    MinLength(u64),
    MaxLength(u64),
    Pattern { regex: Regex, message: String },
    Email,
    Range { min: Option<f64>, max: Option<f64> },
    /// ISO `YYYY-MM-DD` date.
    Date,
    /// Date that must not precede the validation day.
    NotBeforeToday,
    /// Date that must not precede the date in another field of the same record.
    NotBefore { other: String },
}

impl FieldRule {
    pub fn pattern(expression: &str, message: &str) -> Result<Self, FormError> {
        let regex = Regex::new(expression).map_err(|e| {
            FormError::InvalidSchema(format!("invalid pattern '{}': {}", expression, e))
        })?;
        Ok(FieldRule::Pattern {
            regex,
            message: message.to_string(),
        })
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        FieldRule::Range { min, max }
    }

    pub fn not_before(other: &str) -> Self {
        FieldRule::NotBefore {
            other: other.to_string(),
        }
    }
}

/// Declaration of one scalar field (root or row).
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    pub rules: Vec<FieldRule>,
}

impl FieldSpec {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            label: key.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn required(self) -> Self {
        self.rule(FieldRule::Required)
    }
}

/// Declaration of one child-row collection.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    /// Collection name used inside the engine and in the hydration graph.
    pub name: String,
    /// Name of the JSON part this collection is submitted under.
    pub part: String,
    pub label: String,
    pub row_fields: Vec<FieldSpec>,
    pub min_rows: usize,
}

impl CollectionSpec {
    pub fn new(name: &str, part: &str) -> Self {
        Self {
            name: name.to_string(),
            part: part.to_string(),
            label: name.to_string(),
            row_fields: Vec::new(),
            min_rows: 0,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn row_field(mut self, field: FieldSpec) -> Self {
        self.row_fields.push(field);
        self
    }

    pub fn min_rows(mut self, min: usize) -> Self {
        self.min_rows = min;
        self
    }
}

pub const DEFAULT_DOCUMENT_KEY: &str = "documents";

#[derive(Debug, Clone)]
pub struct EntitySchema {
    /// Entity name, also the resource path segment (e.g. "invoices").
    pub entity: String,
    /// Name of the JSON part carrying the root scalars.
    pub root_part: String,
    pub fields: Vec<FieldSpec>,
    pub collections: Vec<CollectionSpec>,
    pub slots: Vec<SlotSpec>,
    /// Keys of the hydration graph that hold document descriptor arrays.
    pub document_keys: Vec<String>,
}

impl EntitySchema {
    pub fn new(entity: &str, root_part: &str) -> Self {
        Self {
            entity: entity.to_string(),
            root_part: root_part.to_string(),
            fields: Vec::new(),
            collections: Vec::new(),
            slots: Vec::new(),
            document_keys: vec![DEFAULT_DOCUMENT_KEY.to_string()],
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn collection(mut self, collection: CollectionSpec) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn slot(mut self, slot: SlotSpec) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn document_keys(mut self, keys: &[&str]) -> Self {
        self.document_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn collection_spec(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn slot_spec(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn slot_for_wire_field(&self, wire_field: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.wire_field == wire_field)
    }

    /// Check the schema for name collisions that would make the wire format ambiguous.
    pub fn check(&self) -> Result<(), FormError> {
        let mut slot_names = HashSet::new();
        let mut wire_fields = HashSet::new();
        for slot in &self.slots {
            if !slot_names.insert(slot.name.as_str()) {
                return Err(FormError::InvalidSchema(format!(
                    "duplicate slot name '{}'",
                    slot.name
                )));
            }
            if !wire_fields.insert(slot.wire_field.as_str()) {
                return Err(FormError::InvalidSchema(format!(
                    "duplicate slot wire field '{}'",
                    slot.wire_field
                )));
            }
        }

        let mut parts = HashSet::new();
        parts.insert(self.root_part.as_str());
        parts.insert(crate::wire::PENDING_DELETIONS_PART);
        let mut names = HashSet::new();
        for collection in &self.collections {
            if !names.insert(collection.name.as_str()) {
                return Err(FormError::InvalidSchema(format!(
                    "duplicate collection '{}'",
                    collection.name
                )));
            }
            if !parts.insert(collection.part.as_str()) {
                return Err(FormError::InvalidSchema(format!(
                    "collection part '{}' collides with another part",
                    collection.part
                )));
            }
            if self.document_keys.contains(&collection.name) {
                return Err(FormError::InvalidSchema(format!(
                    "collection '{}' is also declared as a document key",
                    collection.name
                )));
            }
        }

        for wire_field in &wire_fields {
            if parts.contains(wire_field) {
                return Err(FormError::InvalidSchema(format!(
                    "slot wire field '{}' collides with a JSON part",
                    wire_field
                )));
            }
        }

        // Field keys, collection names and slot names all key the error map.
        let mut error_keys = HashSet::new();
        let keyed = self
            .fields
            .iter()
            .map(|f| ("field", f.key.as_str()))
            .chain(self.collections.iter().map(|c| ("collection", c.name.as_str())))
            .chain(self.slots.iter().map(|s| ("slot", s.name.as_str())));
        for (kind, key) in keyed {
            if !error_keys.insert(key) {
                return Err(FormError::InvalidSchema(format!(
                    "{} '{}' shares its error key with another field, collection or slot",
                    kind, key
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EntitySchema {
        EntitySchema::new("drivers", "driver")
            .field(FieldSpec::new("name").required())
            .collection(CollectionSpec::new("trips", "tripLegs"))
            .slot(SlotSpec::single("license", "DL").mandatory())
    }

    #[test]
    fn test_lookup_by_name_and_wire_field() {
        let schema = base();
        assert_eq!(schema.slot_spec("license").unwrap().wire_field, "DL");
        assert_eq!(schema.slot_for_wire_field("DL").unwrap().name, "license");
        assert!(schema.slot_spec("DL").is_none());
        assert_eq!(schema.collection_spec("trips").unwrap().part, "tripLegs");
    }

    #[test]
    fn test_check_accepts_well_formed_schema() {
        assert!(base().check().is_ok());
    }

    #[test]
    fn test_check_rejects_duplicate_wire_field() {
        let schema = base().slot(SlotSpec::multiple("licenseBack", "DL"));
        assert!(matches!(schema.check(), Err(FormError::InvalidSchema(_))));
    }

    #[test]
    fn test_check_rejects_part_collision() {
        let schema = base().collection(CollectionSpec::new("charges", "driver"));
        assert!(matches!(schema.check(), Err(FormError::InvalidSchema(_))));
    }

    #[test]
    fn test_check_rejects_shared_error_keys() {
        let slot_shadows_field = base().slot(SlotSpec::single("name", "NAME_DOC"));
        assert!(matches!(
            slot_shadows_field.check(),
            Err(FormError::InvalidSchema(_))
        ));

        let slot_shadows_collection = base().slot(SlotSpec::single("trips", "TRIP_DOC"));
        assert!(matches!(
            slot_shadows_collection.check(),
            Err(FormError::InvalidSchema(_))
        ));

        let field_shadows_collection = base().field(FieldSpec::new("trips"));
        assert!(matches!(
            field_shadows_collection.check(),
            Err(FormError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_invalid_pattern_is_schema_error() {
        let err = FieldRule::pattern("([a-z", "bad").unwrap_err();
        assert!(matches!(err, FormError::InvalidSchema(_)));
    }
}
