//! Transport seam
//!
//! The session never talks to the network itself. A `FormTransport` fetches
//! the hydration graph for an entity and submits an assembled payload;
//! `fleetform-api-client` provides the HTTP implementation.

use async_trait::async_trait;
use fleetform_core::{HydrationGraph, OutboundPayload, ServerId, SubmitReceipt, TransportError};

#[async_trait]
pub trait FormTransport: Send + Sync {
    /// Fetch one entity graph by id.
    async fn fetch(&self, entity: &str, entity_id: ServerId) -> Result<HydrationGraph, TransportError>;

    /// Create (no `entity_id`) or update the entity described by `payload`.
    async fn submit(&self, payload: &OutboundPayload) -> Result<SubmitReceipt, TransportError>;
}
