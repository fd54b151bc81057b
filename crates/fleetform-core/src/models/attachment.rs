//! Attachment records and slots
//!
//! An attachment is either `Staged` (bytes held in memory, never uploaded) or
//! `Persisted` (stored server-side, no local bytes). The two shapes are
//! separate structs so a persisted record cannot carry bytes and a staged
//! record cannot carry a server id.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::schema::{Cardinality, SlotSpec};
use crate::ids::{AttachmentId, LocalAttachmentId, ServerId};

/// A file the user picked, before it is accepted into a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl StagedFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased file extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Source of preview resources (object URLs in a browser host).
pub trait PreviewProvider: Send + Sync {
    /// Allocate a preview for the file and return its reference.
    fn allocate(&self, file: &StagedFile) -> String;

    /// Release a reference previously returned by `allocate`.
    fn release(&self, reference: &str);
}

/// Scoped preview resource. Released exactly once, when the handle is dropped.
pub struct PreviewHandle {
    reference: String,
    provider: Arc<dyn PreviewProvider>,
}

impl PreviewHandle {
    pub fn acquire(provider: &Arc<dyn PreviewProvider>, file: &StagedFile) -> Self {
        Self {
            reference: provider.allocate(file),
            provider: Arc::clone(provider),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.provider.release(&self.reference);
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("reference", &self.reference)
            .finish()
    }
}

/// In-memory attachment awaiting upload.
#[derive(Debug)]
pub struct StagedAttachment {
    local_id: LocalAttachmentId,
    filename: String,
    mime_type: String,
    bytes: Bytes,
    preview: PreviewHandle,
}

impl StagedAttachment {
    pub fn new(local_id: LocalAttachmentId, file: StagedFile, preview: PreviewHandle) -> Self {
        Self {
            local_id,
            filename: file.filename,
            mime_type: file.mime_type,
            bytes: file.bytes,
            preview,
        }
    }

    pub fn local_id(&self) -> LocalAttachmentId {
        self.local_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// Attachment already stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAttachment {
    pub server_id: ServerId,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub remote_reference: String,
}

#[derive(Debug)]
pub enum AttachmentRecord {
    Staged(StagedAttachment),
    Persisted(PersistedAttachment),
}

impl AttachmentRecord {
    pub fn id(&self) -> AttachmentId {
        match self {
            AttachmentRecord::Staged(s) => AttachmentId::Staged(s.local_id()),
            AttachmentRecord::Persisted(p) => AttachmentId::Persisted(p.server_id),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            AttachmentRecord::Staged(s) => s.filename(),
            AttachmentRecord::Persisted(p) => &p.filename,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            AttachmentRecord::Staged(s) => s.mime_type(),
            AttachmentRecord::Persisted(p) => &p.mime_type,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            AttachmentRecord::Staged(s) => s.size_bytes(),
            AttachmentRecord::Persisted(p) => p.size_bytes,
        }
    }

    pub fn as_staged(&self) -> Option<&StagedAttachment> {
        match self {
            AttachmentRecord::Staged(s) => Some(s),
            AttachmentRecord::Persisted(_) => None,
        }
    }

    pub fn as_persisted(&self) -> Option<&PersistedAttachment> {
        match self {
            AttachmentRecord::Persisted(p) => Some(p),
            AttachmentRecord::Staged(_) => None,
        }
    }
}

/// Ordered attachments of one document category.
#[derive(Debug)]
pub struct AttachmentSlot {
    name: String,
    wire_field: String,
    cardinality: Cardinality,
    records: Vec<AttachmentRecord>,
}

impl AttachmentSlot {
    pub fn new(spec: &SlotSpec) -> Self {
        Self {
            name: spec.name.clone(),
            wire_field: spec.wire_field.clone(),
            cardinality: spec.cardinality,
            records: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_field(&self) -> &str {
        &self.wire_field
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn records(&self) -> &[AttachmentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: AttachmentId) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    pub fn staged(&self) -> impl Iterator<Item = &StagedAttachment> {
        self.records.iter().filter_map(AttachmentRecord::as_staged)
    }

    pub fn persisted(&self) -> impl Iterator<Item = &PersistedAttachment> {
        self.records.iter().filter_map(AttachmentRecord::as_persisted)
    }

    pub fn push(&mut self, record: AttachmentRecord) {
        self.records.push(record);
    }

    /// Remove and return the record with `id`, if present.
    pub fn take(&mut self, id: AttachmentId) -> Option<AttachmentRecord> {
        let index = self.records.iter().position(|r| r.id() == id)?;
        Some(self.records.remove(index))
    }

    /// Remove every record, returning them in order.
    pub fn take_all(&mut self) -> Vec<AttachmentRecord> {
        std::mem::take(&mut self.records)
    }

    /// Remove every staged record, leaving persisted ones in place.
    pub fn take_staged(&mut self) -> Vec<StagedAttachment> {
        let (staged, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| matches!(r, AttachmentRecord::Staged(_)));
        self.records = kept;
        staged
            .into_iter()
            .filter_map(|r| match r {
                AttachmentRecord::Staged(s) => Some(s),
                AttachmentRecord::Persisted(_) => None,
            })
            .collect()
    }
}
