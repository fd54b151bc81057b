//! Local draft store
//!
//! Persists an unsaved session as JSON so editing can resume after a failed
//! submit or a restart. Only server-side attachment metadata and pending
//! deletions are kept; staged bytes never touch the disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fleetform_core::{FieldMap, FormError, PendingDeletion, PersistedAttachment, RowOrigin, ServerId};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::hydrate::HydratedEntity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRow {
    pub origin: RowOrigin,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDocument {
    pub slot: String,
    pub attachment: PersistedAttachment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub entity: String,
    pub entity_id: Option<ServerId>,
    pub fields: FieldMap,
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<DraftRow>>,
    #[serde(default)]
    pub documents: Vec<DraftDocument>,
    #[serde(default)]
    pub pending_deletions: Vec<PendingDeletion>,
    /// Number of staged files that could not be kept.
    #[serde(default)]
    pub dropped_staged: usize,
    pub saved_at: DateTime<Utc>,
}

impl DraftRecord {
    /// Split into the entity part (fed through the store like a hydration)
    /// and the pending deletions.
    pub fn into_parts(self) -> (HydratedEntity, Vec<PendingDeletion>) {
        let entity = HydratedEntity {
            entity_id: self.entity_id,
            fields: self.fields,
            collections: self
                .collections
                .into_iter()
                .map(|(name, rows)| {
                    let rows = rows.into_iter().map(|r| (r.origin, r.fields)).collect();
                    (name, rows)
                })
                .collect(),
            documents: self
                .documents
                .into_iter()
                .map(|d| (d.slot, d.attachment))
                .collect(),
        };
        (entity, self.pending_deletions)
    }
}

/// Directory of JSON drafts, one file per entity instance.
#[derive(Debug, Clone)]
pub struct DraftStore {
    base_path: PathBuf,
}

impl DraftStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, FormError> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            FormError::Draft(format!(
                "Failed to create draft directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(DraftStore { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `{entity}-{id|new}.json`, with anything but ASCII alphanumerics, `-`
    /// and `_` replaced so the key cannot leave the directory.
    fn draft_key(entity: &str, entity_id: Option<ServerId>) -> String {
        let entity: String = entity
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        match entity_id {
            Some(id) => format!("{}-{}.json", entity, id),
            None => format!("{}-new.json", entity),
        }
    }

    pub fn path_for(&self, entity: &str, entity_id: Option<ServerId>) -> PathBuf {
        self.base_path.join(Self::draft_key(entity, entity_id))
    }

    pub async fn save(&self, draft: &DraftRecord) -> Result<PathBuf, FormError> {
        let path = self.path_for(&draft.entity, draft.entity_id);
        let data = serde_json::to_vec_pretty(draft)?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            FormError::Draft(format!("Failed to create draft {}: {}", path.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            FormError::Draft(format!("Failed to write draft {}: {}", path.display(), e))
        })?;
        file.sync_all().await?;

        tracing::debug!(
            path = %path.display(),
            size_bytes = data.len(),
            dropped_staged = draft.dropped_staged,
            "Draft saved"
        );
        Ok(path)
    }

    pub async fn load(
        &self,
        entity: &str,
        entity_id: Option<ServerId>,
    ) -> Result<Option<DraftRecord>, FormError> {
        let path = self.path_for(entity, entity_id);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let data = fs::read(&path).await.map_err(|e| {
            FormError::Draft(format!("Failed to read draft {}: {}", path.display(), e))
        })?;
        let draft = serde_json::from_slice(&data)?;
        Ok(Some(draft))
    }

    /// Delete a draft. Returns `false` when there was nothing to delete.
    pub async fn delete(&self, entity: &str, entity_id: Option<ServerId>) -> Result<bool, FormError> {
        let path = self.path_for(entity, entity_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Draft deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
