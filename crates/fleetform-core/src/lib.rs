//! Fleetform Core Library
//!
//! This crate provides the identifiers, domain models, wire DTOs, error types,
//! configuration and validation shared by the form session engine and the
//! transports that carry its payloads.

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod presets;
pub mod telemetry;
pub mod validation;
pub mod wire;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{AttachmentRejection, ErrorMetadata, FormError, LogLevel, TransportError};
pub use ids::{AttachmentId, IdAllocator, LocalAttachmentId, RowId, RowOrigin, ServerId};
pub use models::{
    AttachmentRecord, AttachmentSlot, Cardinality, ChildRow, CollectionSpec, EntitySchema,
    EntitySnapshot, FieldMap, FieldRule, FieldSpec, PersistedAttachment, PreviewHandle,
    PreviewProvider, SlotSpec, StagedAttachment, StagedFile,
};
pub use validation::{validate, AttachmentPolicy, ValidationContext, ValidationErrorMap};
pub use wire::{
    DocumentDescriptor, HydrationGraph, OutboundPayload, PayloadPart, PendingDeletion,
    SubmitReceipt,
};
