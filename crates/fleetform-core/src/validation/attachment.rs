//! Attachment policy
//!
//! Size ceiling and MIME allow-list applied before a file may enter a slot,
//! plus a cross-check of the declared MIME type against the file extension.

use crate::error::AttachmentRejection;
use crate::models::{SlotSpec, StagedFile};

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentPolicy {
    max_size_bytes: u64,
    allowed_content_types: Vec<String>,
}

impl AttachmentPolicy {
    pub fn new(max_size_bytes: u64, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_size_bytes,
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| ct.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.allowed_content_types
    }

    /// Policy for one slot: the slot's overrides win over the engine defaults.
    pub fn for_slot(&self, spec: &SlotSpec) -> AttachmentPolicy {
        AttachmentPolicy::new(
            spec.max_size_bytes.unwrap_or(self.max_size_bytes),
            spec.allowed_content_types
                .clone()
                .unwrap_or_else(|| self.allowed_content_types.clone()),
        )
    }

    pub fn check_size(&self, size: u64) -> Result<(), AttachmentRejection> {
        if size == 0 {
            return Err(AttachmentRejection::EmptyFile);
        }
        if size > self.max_size_bytes {
            return Err(AttachmentRejection::FileTooLarge {
                size,
                max: self.max_size_bytes,
            });
        }
        Ok(())
    }

    /// Allow-list entries may be exact (`image/png`) or wildcards (`image/*`).
    pub fn check_content_type(&self, content_type: &str) -> Result<(), AttachmentRejection> {
        let normalized = content_type.trim().to_lowercase();
        let allowed = self.allowed_content_types.iter().any(|entry| {
            match entry.strip_suffix("/*") {
                Some(family) => normalized
                    .split_once('/')
                    .is_some_and(|(prefix, _)| prefix == family),
                None => *entry == normalized,
            }
        });

        if !allowed {
            return Err(AttachmentRejection::ContentTypeNotAllowed {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }
        Ok(())
    }

    /// Reject a declared MIME type that contradicts a known file extension.
    pub fn check_extension_match(&self, file: &StagedFile) -> Result<(), AttachmentRejection> {
        let Some(extension) = file.extension() else {
            return Ok(());
        };
        let Some(expected) = expected_content_types(&extension) else {
            tracing::debug!(
                extension = %extension,
                content_type = %file.mime_type,
                "Unknown extension, skipping content type cross-check"
            );
            return Ok(());
        };

        let normalized = file.mime_type.trim().to_lowercase();
        if !expected.iter().any(|ct| *ct == normalized) {
            return Err(AttachmentRejection::ExtensionMismatch {
                filename: file.filename.clone(),
                content_type: file.mime_type.clone(),
            });
        }
        Ok(())
    }

    pub fn check(&self, file: &StagedFile) -> Result<(), AttachmentRejection> {
        self.check_size(file.size_bytes())?;
        self.check_content_type(&file.mime_type)?;
        self.check_extension_match(file)?;
        Ok(())
    }
}

/// Content types a file with this (lowercase) extension may declare.
pub fn expected_content_types(extension: &str) -> Option<&'static [&'static str]> {
    let types: &'static [&'static str] = match extension {
        "jpg" | "jpeg" => &["image/jpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "webp" => &["image/webp"],
        "heic" => &["image/heic"],
        "bmp" => &["image/bmp"],
        "tif" | "tiff" => &["image/tiff"],
        "pdf" => &["application/pdf"],
        "doc" => &["application/msword"],
        "docx" => &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
        "xls" => &["application/vnd.ms-excel"],
        "xlsx" => &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
        "txt" => &["text/plain"],
        "csv" => &["text/csv", "application/vnd.ms-excel"],
        _ => return None,
    };
    Some(types)
}

/// Best-guess content type for a file name, used when staging from disk.
pub fn content_type_for_filename(filename: &str) -> Option<&'static str> {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    expected_content_types(&extension).and_then(|types| types.first().copied())
}
