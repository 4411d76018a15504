//! Carrier webhook receiver.
//!
//! `POST /webhooks/tracking` accepts a JSON payload pushed by a carrier:
//!
//! ```json
//! { "provider": "mockcarrier", "tracking_session_id": "sess-123", "events": [ ... ] }
//! ```
//!
//! When a `webhook_secret` is configured, the request must carry an
//! `X-Shiptrack-Signature` header equal to `hex(sha256(secret || "." ||
//! body))`, computed over the raw body bytes. Accepted payloads run through
//! the same dedup/mapping pipeline as polled sync results, tagged with
//! source `webhook`.

use axum::{
  Json,
  body::Bytes,
  extract::State,
  http::HeaderMap,
};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use shiptrack_core::{event::EventSource, store::ShipmentStore};
use shiptrack_sync::{adapter::CarrierEvent, ingest};

use crate::{AppState, error::ApiError};

pub const SIGNATURE_HEADER: &str = "x-shiptrack-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
  /// Falls back to the configured provider tag when omitted.
  #[serde(default)]
  pub provider:            Option<String>,
  pub tracking_session_id: String,
  pub events:              Vec<CarrierEvent>,
}

/// `POST /webhooks/tracking`
pub async fn receive<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ShipmentStore,
{
  if let Some(secret) = &state.config.webhook_secret {
    let presented = headers
      .get(SIGNATURE_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::InvalidSignature)?;
    if !signature_matches(secret, &body, presented) {
      tracing::warn!("webhook rejected: bad signature");
      return Err(ApiError::InvalidSignature);
    }
  }

  let payload: WebhookPayload = serde_json::from_slice(&body)
    .map_err(|e| ApiError::BadRequest(format!("malformed payload: {e}")))?;

  let shipment = state
    .store
    .get_by_tracking_session(&payload.tracking_session_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no shipment bound to session {}",
        payload.tracking_session_id
      ))
    })?;

  let provider =
    payload.provider.as_deref().unwrap_or(&state.config.provider);
  let outcome = ingest::ingest_carrier_events(
    state.store.as_ref(),
    &shipment,
    payload.events,
    EventSource::Webhook,
    provider,
  )
  .await
  .map_err(|e| match e {
    shiptrack_sync::Error::Core(core) => ApiError::from(core),
    other => ApiError::Store(Box::new(other)),
  })?;

  tracing::info!(
    shipment_id = %shipment.shipment_id,
    accepted = outcome.accepted,
    duplicates = outcome.duplicates,
    "webhook processed"
  );
  Ok(Json(json!({
    "shipment_id": shipment.shipment_id,
    "accepted": outcome.accepted,
    "duplicates": outcome.duplicates,
    "transitioned": outcome.transitioned,
    "skipped": outcome.skipped,
  })))
}

/// Compare the presented signature against `hex(sha256(secret || "." || body))`.
pub fn signature_matches(secret: &str, body: &[u8], presented: &str) -> bool {
  let mut hasher = Sha256::new();
  hasher.update(secret.as_bytes());
  hasher.update(b".");
  hasher.update(body);
  let expected = hex::encode(hasher.finalize());
  // Hex-decode the header first so casing differences do not reject.
  match hex::decode(presented.trim()) {
    Ok(presented) => presented == hex::decode(expected).unwrap_or_default(),
    Err(_) => false,
  }
}
