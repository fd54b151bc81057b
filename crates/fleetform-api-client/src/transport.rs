//! `FormTransport` over HTTP.
//!
//! `GET {base}/{entity}/{id}` returns the hydration graph. A payload without
//! an entity id is created with `POST {base}/{entity}`, otherwise updated with
//! `PUT {base}/{entity}/{id}`, as one multipart request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fleetform_core::{HydrationGraph, OutboundPayload, PayloadPart, ServerId, SubmitReceipt, TransportError};
use fleetform_session::FormTransport;
use reqwest::multipart::{Form, Part};

use crate::ApiClient;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the multipart form for a payload, keeping part order.
pub fn multipart_form(payload: &OutboundPayload) -> Result<Form> {
    let mut form = Form::new();
    for part in &payload.parts {
        form = match part {
            PayloadPart::Json { name, body } => form.part(
                name.clone(),
                Part::text(body.clone())
                    .mime_str(JSON_CONTENT_TYPE)
                    .context("Invalid JSON content type")?,
            ),
            PayloadPart::Binary {
                name,
                filename,
                mime_type,
                bytes,
            } => form.part(
                name.clone(),
                Part::bytes(bytes.to_vec())
                    .file_name(filename.clone())
                    .mime_str(mime_type)
                    .with_context(|| format!("Invalid content type for {}: {}", filename, mime_type))?,
            ),
        };
    }
    Ok(form)
}

fn entity_path(entity: &str, entity_id: Option<ServerId>) -> String {
    let entity = urlencoding::encode(entity);
    match entity_id {
        Some(id) => format!("/{}/{}", entity, id),
        None => format!("/{}", entity),
    }
}

fn into_transport_error(err: anyhow::Error) -> TransportError {
    match err.downcast::<TransportError>() {
        Ok(err) => err,
        Err(other) => TransportError::Request(format!("{:#}", other)),
    }
}

#[async_trait]
impl FormTransport for ApiClient {
    async fn fetch(&self, entity: &str, entity_id: ServerId) -> Result<HydrationGraph, TransportError> {
        let path = entity_path(entity, Some(entity_id));
        tracing::debug!(path = %path, "Fetching entity");
        self.get(&path).await.map_err(into_transport_error)
    }

    async fn submit(&self, payload: &OutboundPayload) -> Result<SubmitReceipt, TransportError> {
        let form = multipart_form(payload).map_err(into_transport_error)?;
        let path = entity_path(&payload.entity, payload.entity_id);
        tracing::debug!(
            path = %path,
            parts = payload.parts.len(),
            update = payload.entity_id.is_some(),
            "Submitting entity"
        );

        let result = match payload.entity_id {
            Some(_) => self.put_multipart(&path, form).await,
            None => self.post_multipart(&path, form).await,
        };
        result.map_err(into_transport_error)
    }
}
