//! Error types module
//!
//! All engine failures are unified under `FormError`. Attachment and
//! validation failures are local and recoverable; transport failures carry a
//! `TransportError` and leave the session untouched so the user can retry.
//! `StaleLoadDiscarded` is internal and never surfaced to the UI layer.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like transport failures
    Warn,
    /// Error level - for programming-contract violations
    Error,
}

/// Metadata describing how an error should be presented to the user.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "ATTACHMENT_REJECTED")
    fn error_code(&self) -> &'static str;

    /// Whether the user can recover by editing or retrying
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Why a file could not be staged into a slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentRejection {
    #[error("Empty file")]
    EmptyFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Content type not allowed: {content_type} (allowed: {allowed:?})")]
    ContentTypeNotAllowed {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Content type {content_type} does not match file name {filename}")]
    ExtensionMismatch {
        filename: String,
        content_type: String,
    },
}

/// Network or server failure while loading or submitting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("Attachment rejected for slot '{slot}': {reason}")]
    AttachmentRejected {
        slot: String,
        reason: AttachmentRejection,
    },

    #[error("Validation failed: {count} field error(s)")]
    ValidationFailed { count: usize },

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Stale load discarded: ticket token {actual}, session token {expected}")]
    StaleLoadDiscarded { expected: u64, actual: u64 },

    #[error("Unknown attachment slot: {0}")]
    UnknownSlot(String),

    #[error("Unknown child collection: {0}")]
    UnknownCollection(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Draft storage error: {0}")]
    Draft(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<io::Error> for FormError {
    fn from(err: io::Error) -> Self {
        FormError::Draft(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn form_error_static_metadata(
    err: &FormError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        FormError::AttachmentRejected { .. } => (
            "ATTACHMENT_REJECTED",
            true,
            Some("Choose a file of an allowed type and size"),
            LogLevel::Debug,
        ),
        FormError::ValidationFailed { .. } => (
            "VALIDATION_FAILED",
            true,
            Some("Correct the highlighted fields and save again"),
            LogLevel::Debug,
        ),
        FormError::Transport(_) => (
            "TRANSPORT_FAILURE",
            true,
            Some("Check your connection and save again"),
            LogLevel::Warn,
        ),
        FormError::StaleLoadDiscarded { .. } => ("STALE_LOAD_DISCARDED", true, None, LogLevel::Debug),
        FormError::UnknownSlot(_) => ("UNKNOWN_SLOT", false, None, LogLevel::Error),
        FormError::UnknownCollection(_) => ("UNKNOWN_COLLECTION", false, None, LogLevel::Error),
        FormError::SessionClosed(_) => (
            "SESSION_CLOSED",
            false,
            Some("Reopen the record to continue editing"),
            LogLevel::Error,
        ),
        FormError::InvalidSchema(_) => ("INVALID_SCHEMA", false, None, LogLevel::Error),
        FormError::FileRead(_) => (
            "FILE_READ_ERROR",
            true,
            Some("Choose the file again"),
            LogLevel::Warn,
        ),
        FormError::Draft(_) => (
            "DRAFT_STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Warn,
        ),
        FormError::Serialization(_) => ("SERIALIZATION_ERROR", false, None, LogLevel::Error),
    }
}

/// Human-readable size for user messages. Whole units print bare, partial
/// megabytes keep one decimal, sub-kilobyte values print in bytes.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        if bytes % MB == 0 {
            format!("{} MB", bytes / MB)
        } else {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        }
    } else if bytes >= KB {
        format!("{} KB", bytes.div_ceil(KB))
    } else {
        format!("{} bytes", bytes)
    }
}

impl ErrorMetadata for FormError {
    fn error_code(&self) -> &'static str {
        form_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        form_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        form_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        form_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            FormError::AttachmentRejected { reason, .. } => match reason {
                AttachmentRejection::EmptyFile => "The selected file is empty".to_string(),
                AttachmentRejection::FileTooLarge { max, .. } => format!(
                    "The selected file exceeds the {} limit",
                    format_size(*max)
                ),
                AttachmentRejection::ContentTypeNotAllowed { content_type, .. } => {
                    format!("Files of type {} are not accepted here", content_type)
                }
                AttachmentRejection::ExtensionMismatch { filename, .. } => {
                    format!("The file {} does not match its declared type", filename)
                }
            },
            FormError::ValidationFailed { count } => {
                format!("Please correct {} field(s) before saving", count)
            }
            FormError::Transport(TransportError::Status { status, .. }) => {
                format!("The server rejected the request (status {})", status)
            }
            FormError::Transport(_) => "Could not reach the server".to_string(),
            FormError::FileRead(_) => "The selected file could not be read".to_string(),
            FormError::Draft(_) => "Could not save the local draft".to_string(),
            _ => "Something went wrong".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_attachment_rejected() {
        let err = FormError::AttachmentRejected {
            slot: "license".to_string(),
            reason: AttachmentRejection::FileTooLarge {
                size: 10 * 1024 * 1024,
                max: 5 * 1024 * 1024,
            },
        };
        assert_eq!(err.error_code(), "ATTACHMENT_REJECTED");
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("5 MB"));
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_small_size_limits_are_not_shown_as_zero() {
        let rejected = |max: u64| FormError::AttachmentRejected {
            slot: "license".to_string(),
            reason: AttachmentRejection::FileTooLarge { size: max + 1, max },
        };
        assert!(rejected(512 * 1024).client_message().contains("512 KB limit"));
        assert!(rejected(1536 * 1024).client_message().contains("1.5 MB limit"));
        assert!(rejected(500).client_message().contains("500 bytes limit"));
        assert!(!rejected(512 * 1024).client_message().contains("0 MB"));
    }

    #[test]
    fn test_error_metadata_transport() {
        let err = FormError::from(TransportError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        });
        assert_eq!(err.error_code(), "TRANSPORT_FAILURE");
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("502"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_contract_violation() {
        let err = FormError::UnknownSlot("passport".to_string());
        assert_eq!(err.error_code(), "UNKNOWN_SLOT");
        assert!(!err.is_recoverable());
        assert_eq!(err.suggested_action(), None);
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_io_error_maps_to_draft() {
        let err = FormError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(matches!(err, FormError::Draft(_)));
        assert_eq!(err.error_code(), "DRAFT_STORAGE_ERROR");
    }
}
