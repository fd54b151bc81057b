//! Form session orchestrator
//!
//! `FormSession` is the single writer of one root entity's editing state.
//! Every mutation bumps the session token; a load started before the bump is
//! dropped when it completes. Submit is gated on validation, and a transport
//! failure leaves the session exactly as it was.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use fleetform_core::{
    validate, AttachmentId, AttachmentPolicy, ChildRow, EngineConfig, EntitySchema, ErrorMetadata,
    FieldMap, FormError, HydrationGraph, OutboundPayload, PendingDeletion, PreviewProvider, RowId,
    ServerId, StagedFile, SubmitReceipt, TransportError, ValidationContext, ValidationErrorMap,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::assemble::assemble;
use crate::attachments::{load_staged_file, AttachmentManager};
use crate::draft::{DraftDocument, DraftRecord, DraftRow, DraftStore};
use crate::hydrate::{hydrate, HydratedEntity};
use crate::store::EntityStore;
use crate::transport::FormTransport;

/// Monotonic counter identifying the session's current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        SessionToken(self.0 + 1)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handed out by `begin_load`; its token decides whether the result applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    token: SessionToken,
    entity_id: ServerId,
}

impl LoadTicket {
    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn entity_id(&self) -> ServerId {
        self.entity_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// The session moved on while the load was in flight.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    Submitted,
    Discarded,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Editing => write!(f, "editing"),
            SessionState::Submitted => write!(f, "submitted"),
            SessionState::Discarded => write!(f, "discarded"),
        }
    }
}

pub struct FormSession {
    id: Uuid,
    schema: Arc<EntitySchema>,
    store: EntityStore,
    attachments: AttachmentManager,
    token: SessionToken,
    state: SessionState,
    dirty: bool,
    notice: Option<String>,
    today: Option<NaiveDate>,
}

impl FormSession {
    /// Empty session for a new entity.
    pub fn new(
        schema: Arc<EntitySchema>,
        policy: AttachmentPolicy,
        previews: Arc<dyn PreviewProvider>,
    ) -> Result<Self, FormError> {
        schema.check()?;
        let session = Self {
            id: Uuid::new_v4(),
            store: EntityStore::new(&schema),
            attachments: AttachmentManager::new(&schema, policy, previews),
            schema,
            token: SessionToken::default(),
            state: SessionState::Editing,
            dirty: false,
            notice: None,
            today: None,
        };
        tracing::debug!(
            session_id = %session.id,
            entity = %session.schema.entity,
            "Form session opened"
        );
        Ok(session)
    }

    pub fn from_config(
        schema: Arc<EntitySchema>,
        config: &EngineConfig,
        previews: Arc<dyn PreviewProvider>,
    ) -> Result<Self, FormError> {
        Self::new(schema, config.attachment_policy(), previews)
    }

    /// Pin the date used by date rules instead of the local calendar day.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn entity_id(&self) -> Option<ServerId> {
        self.store.entity_id()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    pub fn errors(&self) -> &ValidationErrorMap {
        self.store.errors()
    }

    pub fn field(&self, key: &str) -> Option<&JsonValue> {
        self.store.field(key)
    }

    pub fn rows(&self, collection: &str) -> Result<&[ChildRow], FormError> {
        self.store.rows(collection)
    }

    pub fn pending_deletions(&self) -> impl Iterator<Item = &PendingDeletion> {
        self.attachments.pending_deletions().iter()
    }

    pub fn slot_error(&self, slot: &str) -> Option<&str> {
        self.attachments.slot_error(slot)
    }

    /// Session-level message left by the last failed load or submit.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    fn ensure_editing(&self) -> Result<(), FormError> {
        match self.state {
            SessionState::Editing => Ok(()),
            state => Err(FormError::SessionClosed(format!(
                "session {} is {}",
                self.id, state
            ))),
        }
    }

    fn bump_token(&mut self) {
        self.token = self.token.next();
    }

    /// Record a user edit: in-flight loads become stale.
    fn touch(&mut self) {
        self.dirty = true;
        self.bump_token();
    }

    pub fn set_field(&mut self, key: &str, value: JsonValue) -> Result<(), FormError> {
        self.ensure_editing()?;
        self.store.set_field(key, value);
        self.touch();
        Ok(())
    }

    pub fn add_row(&mut self, collection: &str, initial: FieldMap) -> Result<RowId, FormError> {
        self.ensure_editing()?;
        let row_id = self.store.add_row(collection, initial)?;
        self.touch();
        Ok(row_id)
    }

    pub fn update_row(
        &mut self,
        collection: &str,
        row_id: RowId,
        key: &str,
        value: JsonValue,
    ) -> Result<bool, FormError> {
        self.ensure_editing()?;
        let updated = self.store.update_row(collection, row_id, key, value)?;
        if updated {
            self.touch();
        }
        Ok(updated)
    }

    pub fn remove_row(&mut self, collection: &str, row_id: RowId) -> Result<bool, FormError> {
        self.ensure_editing()?;
        let removed = self.store.remove_row(collection, row_id)?;
        if let Some(row) = &removed {
            tracing::debug!(
                session_id = %self.id,
                collection = %collection,
                row_id = %row_id,
                server_id = ?row.server_id(),
                "Row removed"
            );
            self.touch();
        }
        Ok(removed.is_some())
    }

    pub fn move_row(
        &mut self,
        collection: &str,
        row_id: RowId,
        new_index: usize,
    ) -> Result<bool, FormError> {
        self.ensure_editing()?;
        let moved = self.store.move_row(collection, row_id, new_index)?;
        if moved {
            self.touch();
        }
        Ok(moved)
    }

    /// Stage a file. On rejection the slot is unchanged and the per-slot
    /// error is set.
    pub fn stage(&mut self, slot: &str, file: StagedFile) -> Result<AttachmentId, FormError> {
        self.ensure_editing()?;
        let id = self.attachments.stage(slot, file)?;
        // The slot is no longer empty.
        self.store.remove_error(slot);
        self.touch();
        Ok(id)
    }

    /// Read a file from disk and stage it.
    pub async fn stage_path(
        &mut self,
        slot: &str,
        path: impl AsRef<Path>,
    ) -> Result<AttachmentId, FormError> {
        self.ensure_editing()?;
        let path = path.as_ref();
        let file = load_staged_file(path).await.map_err(|e| {
            FormError::FileRead(format!("{}: {}", path.display(), e))
        })?;
        self.stage(slot, file)
    }

    pub fn remove_attachment(&mut self, slot: &str, id: AttachmentId) -> Result<bool, FormError> {
        self.ensure_editing()?;
        let removed = self.attachments.remove(slot, id)?;
        if removed {
            self.touch();
        }
        Ok(removed)
    }

    /// Start loading `entity_id`. Complete with `complete_load`.
    pub fn begin_load(&mut self, entity_id: ServerId) -> Result<LoadTicket, FormError> {
        self.ensure_editing()?;
        self.bump_token();
        tracing::debug!(
            session_id = %self.id,
            entity_id = %entity_id,
            token = %self.token,
            "Load started"
        );
        Ok(LoadTicket {
            token: self.token,
            entity_id,
        })
    }

    /// Apply the result of a load started with `begin_load`.
    ///
    /// A ticket whose token no longer matches is dropped silently and reported
    /// as `LoadOutcome::Discarded`. A transport failure sets the notice and
    /// leaves the session untouched.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<HydrationGraph, TransportError>,
    ) -> Result<LoadOutcome, FormError> {
        if ticket.token != self.token || self.state != SessionState::Editing {
            let stale = FormError::StaleLoadDiscarded {
                expected: self.token.get(),
                actual: ticket.token.get(),
            };
            tracing::debug!(session_id = %self.id, state = %self.state, "{}", stale);
            return Ok(LoadOutcome::Discarded);
        }

        let graph = match result {
            Ok(graph) => graph,
            Err(e) => {
                let err = FormError::Transport(e);
                tracing::warn!(
                    session_id = %self.id,
                    entity_id = %ticket.entity_id,
                    error = %err,
                    "Load failed"
                );
                self.notice = Some(err.client_message());
                return Err(err);
            }
        };

        let mut hydrated = hydrate(&self.schema, &graph);
        if hydrated.entity_id.is_none() {
            hydrated.entity_id = Some(ticket.entity_id);
        }
        self.apply(hydrated, Vec::new())?;
        self.dirty = false;
        self.notice = None;

        tracing::debug!(
            session_id = %self.id,
            entity_id = %ticket.entity_id,
            token = %self.token,
            "Load applied"
        );
        Ok(LoadOutcome::Applied)
    }

    /// Fetch and apply `entity_id` through `transport`.
    pub async fn load(
        &mut self,
        transport: &dyn FormTransport,
        entity_id: ServerId,
    ) -> Result<LoadOutcome, FormError> {
        let ticket = self.begin_load(entity_id)?;
        let result = transport.fetch(&self.schema.entity, entity_id).await;
        self.complete_load(ticket, result)
    }

    /// Replace store and slots with `entity`; staged records are released.
    fn apply(
        &mut self,
        mut entity: HydratedEntity,
        pending: Vec<PendingDeletion>,
    ) -> Result<(), FormError> {
        let documents = std::mem::take(&mut entity.documents);
        self.store.load(entity)?;
        self.attachments.reset();
        for (slot, record) in documents {
            self.attachments.insert_persisted(&slot, record)?;
        }
        for deletion in pending {
            self.attachments.mark_pending(deletion);
        }
        Ok(())
    }

    fn validation_context(&self) -> ValidationContext {
        match self.today {
            Some(today) => ValidationContext::on(today),
            None => ValidationContext::today(),
        }
    }

    /// Recompute the whole error map, store it and return it.
    pub fn validate(&mut self) -> &ValidationErrorMap {
        let errors = validate(
            &self.schema,
            &self.store.snapshot(),
            self.attachments.slots(),
            &self.validation_context(),
        );
        self.store.replace_errors(errors);
        self.store.errors()
    }

    /// Build the submission payload without touching the session.
    pub fn assemble(&self) -> Result<OutboundPayload, FormError> {
        assemble(
            &self.schema,
            &self.store.snapshot(),
            self.attachments.slots(),
            self.attachments.pending_deletions(),
        )
    }

    /// Validate, assemble and send.
    ///
    /// On success staged previews are released and the session closes. On a
    /// transport failure the session is left as it was for a retry.
    pub async fn submit(
        &mut self,
        transport: &dyn FormTransport,
    ) -> Result<SubmitReceipt, FormError> {
        self.ensure_editing()?;

        let count = self.validate().len();
        if count > 0 {
            tracing::debug!(session_id = %self.id, errors = count, "Submit blocked by validation");
            return Err(FormError::ValidationFailed { count });
        }

        let payload = self.assemble()?;
        match transport.submit(&payload).await {
            Ok(receipt) => {
                let released = self.attachments.release_all();
                if self.store.entity_id().is_none() {
                    self.store.set_entity_id(receipt.server_id);
                }
                self.bump_token();
                self.state = SessionState::Submitted;
                self.dirty = false;
                self.notice = None;
                tracing::info!(
                    session_id = %self.id,
                    entity = %self.schema.entity,
                    server_id = ?receipt.server_id.or(payload.entity_id),
                    released,
                    "Form submitted"
                );
                Ok(receipt)
            }
            Err(e) => {
                let err = FormError::Transport(e);
                tracing::warn!(session_id = %self.id, error = %err, "Submit failed");
                self.notice = Some(err.client_message());
                Err(err)
            }
        }
    }

    /// Abandon the session: in-flight loads are ignored and every staged
    /// preview is released. Returns how many previews were released.
    pub fn discard(&mut self) -> usize {
        self.bump_token();
        let released = self.attachments.release_all();
        if self.state == SessionState::Editing {
            self.state = SessionState::Discarded;
        }
        tracing::info!(session_id = %self.id, released, "Form session discarded");
        released
    }

    /// Snapshot of everything that survives without staged bytes.
    pub fn to_draft(&self) -> DraftRecord {
        let snapshot = self.store.snapshot();
        let collections = snapshot
            .collections
            .into_iter()
            .map(|(name, rows)| {
                let rows = rows
                    .into_iter()
                    .map(|row| DraftRow {
                        origin: row.origin(),
                        fields: row.fields().clone(),
                    })
                    .collect();
                (name, rows)
            })
            .collect();
        let documents = self
            .attachments
            .slots()
            .iter()
            .flat_map(|slot| {
                slot.persisted().map(|p| DraftDocument {
                    slot: slot.name().to_string(),
                    attachment: p.clone(),
                })
            })
            .collect();

        DraftRecord {
            entity: self.schema.entity.clone(),
            entity_id: snapshot.entity_id,
            fields: snapshot.fields,
            collections,
            documents,
            pending_deletions: self.attachments.pending_deletions().iter().cloned().collect(),
            dropped_staged: self.attachments.staged_count(),
            saved_at: Utc::now(),
        }
    }

    /// Rebuild a session from a draft. The restored session is dirty.
    pub fn restore_draft(
        schema: Arc<EntitySchema>,
        policy: AttachmentPolicy,
        previews: Arc<dyn PreviewProvider>,
        draft: DraftRecord,
    ) -> Result<Self, FormError> {
        if draft.entity != schema.entity {
            return Err(FormError::Draft(format!(
                "draft is for '{}', not '{}'",
                draft.entity, schema.entity
            )));
        }
        let mut session = Self::new(schema, policy, previews)?;
        let (entity, pending) = draft.into_parts();
        session.apply(entity, pending)?;
        session.dirty = true;
        tracing::debug!(session_id = %session.id, "Session restored from draft");
        Ok(session)
    }

    pub async fn save_draft(&self, drafts: &DraftStore) -> Result<(), FormError> {
        let draft = self.to_draft();
        if draft.dropped_staged > 0 {
            tracing::warn!(
                session_id = %self.id,
                dropped = draft.dropped_staged,
                "Staged files are not kept in drafts"
            );
        }
        drafts.save(&draft).await?;
        Ok(())
    }

    pub async fn discard_draft(&self, drafts: &DraftStore) -> Result<bool, FormError> {
        drafts.delete(&self.schema.entity, self.entity_id()).await
    }
}

impl fmt::Debug for FormSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSession")
            .field("id", &self.id)
            .field("entity", &self.schema.entity)
            .field("entity_id", &self.store.entity_id())
            .field("token", &self.token)
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .finish()
    }
}
