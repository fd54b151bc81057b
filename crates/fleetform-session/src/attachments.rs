//! Attachment lifecycle manager
//!
//! Owns the attachment slots of one session. Staging checks the slot policy
//! before anything is mutated; removing a persisted record turns it into a
//! pending deletion, removing a staged record drops it and releases its
//! preview. Previews are released by `PreviewHandle`'s `Drop`, so every exit
//! path (removal, replacement, `release_all`, session drop) releases once.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use fleetform_core::validation::content_type_for_filename;
use fleetform_core::{
    AttachmentId, AttachmentPolicy, AttachmentRecord, AttachmentSlot, Cardinality, EntitySchema,
    ErrorMetadata, FormError, IdAllocator, PendingDeletion, PersistedAttachment, PreviewHandle,
    PreviewProvider, SlotSpec, StagedAttachment, StagedFile,
};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Read a file from disk into a `StagedFile`, inferring its content type from the extension.
pub async fn load_staged_file(path: impl AsRef<Path>) -> std::io::Result<StagedFile> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let mime_type = content_type_for_filename(&filename).unwrap_or(FALLBACK_CONTENT_TYPE);
    Ok(StagedFile::new(filename, mime_type, bytes))
}

pub struct AttachmentManager {
    specs: Vec<SlotSpec>,
    slots: Vec<AttachmentSlot>,
    policy: AttachmentPolicy,
    pending: BTreeSet<PendingDeletion>,
    slot_errors: BTreeMap<String, String>,
    ids: IdAllocator,
    previews: Arc<dyn PreviewProvider>,
}

impl AttachmentManager {
    pub fn new(
        schema: &EntitySchema,
        policy: AttachmentPolicy,
        previews: Arc<dyn PreviewProvider>,
    ) -> Self {
        Self {
            specs: schema.slots.clone(),
            slots: schema.slots.iter().map(AttachmentSlot::new).collect(),
            policy,
            pending: BTreeSet::new(),
            slot_errors: BTreeMap::new(),
            ids: IdAllocator::new(),
            previews,
        }
    }

    fn index(&self, slot: &str) -> Result<usize, FormError> {
        self.specs
            .iter()
            .position(|s| s.name == slot)
            .ok_or_else(|| FormError::UnknownSlot(slot.to_string()))
    }

    pub fn slots(&self) -> &[AttachmentSlot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&AttachmentSlot> {
        self.slots.iter().find(|s| s.name() == name)
    }

    pub fn pending_deletions(&self) -> &BTreeSet<PendingDeletion> {
        &self.pending
    }

    /// Last rejection message for a slot, cleared by the next successful change.
    pub fn slot_error(&self, slot: &str) -> Option<&str> {
        self.slot_errors.get(slot).map(String::as_str)
    }

    pub fn staged_count(&self) -> usize {
        self.slots.iter().map(|s| s.staged().count()).sum()
    }

    /// Stage a file into `slot`.
    ///
    /// On rejection the slot is left exactly as it was. A single-valued slot
    /// that is already occupied has its occupant retired first.
    pub fn stage(&mut self, slot: &str, file: StagedFile) -> Result<AttachmentId, FormError> {
        let index = self.index(slot)?;
        let policy = self.policy.for_slot(&self.specs[index]);

        if let Err(reason) = policy.check(&file) {
            let err = FormError::AttachmentRejected {
                slot: slot.to_string(),
                reason,
            };
            tracing::debug!(
                slot = %slot,
                filename = %file.filename,
                size = file.size_bytes(),
                error = %err,
                "Attachment rejected"
            );
            self.slot_errors
                .insert(slot.to_string(), err.client_message());
            return Err(err);
        }

        if self.specs[index].cardinality == Cardinality::Single {
            let wire_field = self.specs[index].wire_field.clone();
            for occupant in self.slots[index].take_all() {
                self.retire(&wire_field, occupant);
            }
        }

        let local_id = self.ids.next_attachment();
        let preview = PreviewHandle::acquire(&self.previews, &file);
        tracing::debug!(
            slot = %slot,
            attachment = %local_id,
            filename = %file.filename,
            size = file.size_bytes(),
            "Staged attachment"
        );
        self.slots[index].push(AttachmentRecord::Staged(StagedAttachment::new(
            local_id, file, preview,
        )));
        self.slot_errors.remove(slot);

        Ok(AttachmentId::Staged(local_id))
    }

    /// Remove a record from `slot`. Removing an absent id is a no-op returning `false`.
    pub fn remove(&mut self, slot: &str, id: AttachmentId) -> Result<bool, FormError> {
        let index = self.index(slot)?;
        let Some(record) = self.slots[index].take(id) else {
            tracing::debug!(slot = %slot, attachment = %id, "Remove of absent attachment ignored");
            return Ok(false);
        };

        let wire_field = self.specs[index].wire_field.clone();
        self.retire(&wire_field, record);
        self.slot_errors.remove(slot);
        Ok(true)
    }

    fn retire(&mut self, wire_field: &str, record: AttachmentRecord) {
        match record {
            AttachmentRecord::Persisted(persisted) => {
                tracing::debug!(
                    slot_field = %wire_field,
                    server_id = %persisted.server_id,
                    "Persisted attachment marked for deletion"
                );
                self.pending.insert(PendingDeletion {
                    server_id: persisted.server_id,
                    slot_field_name: wire_field.to_string(),
                });
            }
            // Dropping the record releases its preview.
            AttachmentRecord::Staged(staged) => {
                tracing::debug!(
                    slot_field = %wire_field,
                    attachment = %staged.local_id(),
                    "Staged attachment discarded"
                );
            }
        }
    }

    /// Drop every staged record, releasing each preview once. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let released: usize = self
            .slots
            .iter_mut()
            .map(|slot| slot.take_staged().len())
            .sum();
        if released > 0 {
            tracing::debug!(released, "Released staged attachments");
        }
        released
    }

    /// Place a server-side record into a slot, as hydration does.
    pub fn insert_persisted(
        &mut self,
        slot: &str,
        record: PersistedAttachment,
    ) -> Result<(), FormError> {
        let index = self.index(slot)?;
        if self.specs[index].cardinality == Cardinality::Single && !self.slots[index].is_empty() {
            tracing::warn!(
                slot = %slot,
                server_id = %record.server_id,
                "Single-valued slot received more than one persisted record"
            );
        }
        self.slots[index].push(AttachmentRecord::Persisted(record));
        Ok(())
    }

    /// Record a deletion without a visible record, as draft restore does.
    pub fn mark_pending(&mut self, deletion: PendingDeletion) {
        self.pending.insert(deletion);
    }

    /// Empty every slot, pending deletion and slot error.
    pub fn reset(&mut self) {
        self.release_all();
        for slot in &mut self.slots {
            slot.take_all();
        }
        self.pending.clear();
        self.slot_errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::PreviewRegistry;
    use fleetform_core::{AttachmentRejection, ServerId};

    const MB: usize = 1024 * 1024;

    fn schema() -> EntitySchema {
        EntitySchema::new("vehicles", "vehicle")
            .slot(SlotSpec::single("insurance", "INSURANCE").mandatory())
            .slot(SlotSpec::multiple("photos", "PHOTOS"))
    }

    fn manager() -> (AttachmentManager, Arc<PreviewRegistry>) {
        let registry = Arc::new(PreviewRegistry::new());
        let policy = AttachmentPolicy::new(
            5 * MB as u64,
            vec!["image/png".to_string(), "application/pdf".to_string()],
        );
        (
            AttachmentManager::new(&schema(), policy, registry.clone()),
            registry,
        )
    }

    fn png(name: &str, size: usize) -> StagedFile {
        StagedFile::new(name, "image/png", vec![0u8; size])
    }

    fn persisted(id: i64) -> PersistedAttachment {
        PersistedAttachment {
            server_id: ServerId::new(id),
            filename: "policy.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 2048,
            remote_reference: format!("/files/{}", id),
        }
    }

    #[test]
    fn test_stage_then_remove_restores_slot_and_releases_once() {
        let (mut manager, registry) = manager();
        manager.insert_persisted("photos", persisted(1)).unwrap();

        let id = manager.stage("photos", png("photo.png", 100)).unwrap();
        assert_eq!(manager.slot("photos").unwrap().len(), 2);
        assert_eq!(registry.outstanding(), 1);

        assert!(manager.remove("photos", id).unwrap());
        let remaining: Vec<_> = manager
            .slot("photos")
            .unwrap()
            .records()
            .iter()
            .map(AttachmentRecord::id)
            .collect();
        assert_eq!(remaining, vec![AttachmentId::Persisted(ServerId::new(1))]);
        assert_eq!(registry.released(), 1);
        assert!(manager.pending_deletions().is_empty());
    }

    #[test]
    fn test_remove_persisted_twice_adds_one_deletion() {
        let (mut manager, _) = manager();
        manager.insert_persisted("photos", persisted(9)).unwrap();
        let id = AttachmentId::Persisted(ServerId::new(9));

        assert!(manager.remove("photos", id).unwrap());
        assert!(!manager.remove("photos", id).unwrap());
        assert_eq!(manager.pending_deletions().len(), 1);
        let deletion = manager.pending_deletions().iter().next().unwrap();
        assert_eq!(deletion.slot_field_name, "PHOTOS");
        assert_eq!(deletion.server_id, ServerId::new(9));
    }

    #[test]
    fn test_rejected_stage_leaves_slot_untouched() {
        let (mut manager, registry) = manager();
        manager.stage("photos", png("a.png", 2 * MB)).unwrap();

        let err = manager.stage("photos", png("b.png", 10 * MB)).unwrap_err();
        assert!(matches!(
            err,
            FormError::AttachmentRejected {
                reason: AttachmentRejection::FileTooLarge { .. },
                ..
            }
        ));
        assert_eq!(manager.slot("photos").unwrap().len(), 1);
        assert_eq!(registry.allocated(), 1);
        assert!(manager.slot_error("photos").is_some());

        manager.stage("photos", png("c.png", 10)).unwrap();
        assert!(manager.slot_error("photos").is_none());
    }

    #[test]
    fn test_single_slot_replacement_retires_occupant() {
        let (mut manager, registry) = manager();
        manager.insert_persisted("insurance", persisted(4)).unwrap();

        let pdf = StagedFile::new("new.pdf", "application/pdf", vec![1u8; 64]);
        let first = manager.stage("insurance", pdf.clone()).unwrap();
        assert_eq!(manager.pending_deletions().len(), 1);
        assert_eq!(manager.slot("insurance").unwrap().len(), 1);

        manager.stage("insurance", pdf).unwrap();
        assert!(!manager.slot("insurance").unwrap().contains(first));
        assert_eq!(registry.released(), 1);
        assert_eq!(registry.outstanding(), 1);
    }

    #[test]
    fn test_release_all_keeps_persisted() {
        let (mut manager, registry) = manager();
        manager.insert_persisted("photos", persisted(2)).unwrap();
        manager.stage("photos", png("a.png", 10)).unwrap();
        manager.stage("photos", png("b.png", 10)).unwrap();

        assert_eq!(manager.release_all(), 2);
        assert_eq!(manager.release_all(), 0);
        assert_eq!(registry.released(), 2);
        assert_eq!(registry.invalid_releases(), 0);
        assert_eq!(manager.slot("photos").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_slot_is_an_error() {
        let (mut manager, _) = manager();
        assert!(matches!(
            manager.stage("passport", png("a.png", 10)),
            Err(FormError::UnknownSlot(_))
        ));
        assert!(matches!(
            manager.remove("passport", AttachmentId::Persisted(ServerId::new(1))),
            Err(FormError::UnknownSlot(_))
        ));
    }

    #[tokio::test]
    async fn test_load_staged_file_infers_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        tokio::fs::write(&path, b"%PDF-1.4").await.unwrap();

        let file = load_staged_file(&path).await.unwrap();
        assert_eq!(file.filename, "scan.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size_bytes(), 8);
    }
}
