//! Test helpers: an in-memory transport and session builders.
//!
//! Run from workspace root: `cargo test -p fleetform-session`.

pub mod fixtures;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fleetform_core::presets::invoice_schema;
use fleetform_core::telemetry::try_init_tracing;
use fleetform_core::{
    AttachmentPolicy, HydrationGraph, OutboundPayload, ServerId, SubmitReceipt, TransportError,
};
use fleetform_session::{FormSession, FormTransport, PreviewRegistry};

pub const MB: usize = 1024 * 1024;

/// Transport double: serves one graph and records every submission.
#[derive(Default)]
pub struct MockTransport {
    graph: Mutex<Option<HydrationGraph>>,
    submit_error: Mutex<Option<TransportError>>,
    submitted: Mutex<Vec<OutboundPayload>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(value: serde_json::Value) -> Self {
        let transport = Self::new();
        *transport.graph.lock().unwrap() = Some(serde_json::from_value(value).unwrap());
        transport
    }

    pub fn fail_submits_with(&self, err: TransportError) {
        *self.submit_error.lock().unwrap() = Some(err);
    }

    pub fn succeed_submits(&self) {
        *self.submit_error.lock().unwrap() = None;
    }

    pub fn submitted(&self) -> Vec<OutboundPayload> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl FormTransport for MockTransport {
    async fn fetch(&self, _entity: &str, _entity_id: ServerId) -> Result<HydrationGraph, TransportError> {
        self.graph.lock().unwrap().clone().ok_or(TransportError::Status {
            status: 404,
            body: "not found".to_string(),
        })
    }

    async fn submit(&self, payload: &OutboundPayload) -> Result<SubmitReceipt, TransportError> {
        self.submitted.lock().unwrap().push(payload.clone());
        if let Some(err) = self.submit_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(SubmitReceipt {
            server_id: payload.entity_id.or(Some(ServerId::new(500))),
            message: None,
        })
    }
}

pub fn policy() -> AttachmentPolicy {
    AttachmentPolicy::new(
        (5 * MB) as u64,
        vec![
            "image/png".to_string(),
            "image/jpeg".to_string(),
            "application/pdf".to_string(),
        ],
    )
}

/// New invoice session with a 5 MB ceiling and a shared preview registry.
pub fn invoice_session() -> (FormSession, Arc<PreviewRegistry>) {
    try_init_tracing();
    let registry = Arc::new(PreviewRegistry::new());
    let session = FormSession::new(Arc::new(invoice_schema()), policy(), registry.clone())
        .unwrap()
        .with_today(chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    (session, registry)
}
