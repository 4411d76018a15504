//! JSON REST API for Shiptrack.
//!
//! Exposes an axum [`Router`] backed by any
//! [`shiptrack_core::store::ShipmentStore`]. Carries the admin shipment
//! endpoints plus the carrier webhook receiver; TLS and operator auth are
//! the deployment's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(shiptrack_api::router(state))
//! ```

pub mod error;
pub mod events;
pub mod shipments;
pub mod webhook;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use shiptrack_core::store::ShipmentStore;
use shiptrack_sync::conflict::ConflictDetector;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` or
/// `SHIPTRACK_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Shared secret for webhook signatures. Unsigned payloads are accepted
  /// when unset.
  #[serde(default)]
  pub webhook_secret: Option<String>,
  /// Provider tag recorded on webhook-origin ledger entries.
  #[serde(default = "default_provider")]
  pub provider:       String,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_provider() -> String { "carrier".into() }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub detector: ConflictDetector,
  pub config:   Arc<ServerConfig>,
}

// Manual impl: the derive would require `S: Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      detector: self.detector.clone(),
      config:   Arc::clone(&self.config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised router for `state`.
pub fn router<S>(state: AppState<S>) -> Router<()>
where
  S: ShipmentStore + 'static,
{
  Router::new()
    // Shipments
    .route(
      "/shipments",
      get(shipments::list::<S>).post(shipments::create::<S>),
    )
    .route("/shipments/{id}", get(shipments::get_one::<S>))
    .route("/shipments/{id}/status", post(shipments::change_status::<S>))
    // Ledger
    .route("/shipments/{id}/events", get(events::list::<S>))
    // Carrier webhook
    .route("/webhooks/tracking", post(webhook::receive::<S>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use sha2::{Digest, Sha256};
  use shiptrack_core::{
    shipment::{NewShipment, Shipment},
    status::ShipmentStatus,
    store::ShipmentStore as _,
  };
  use shiptrack_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  async fn make_state(secret: Option<&str>) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:    Arc::new(store),
      detector: ConflictDetector::default(),
      config:   Arc::new(ServerConfig {
        host:           "127.0.0.1".to_string(),
        port:           8080,
        store_path:     PathBuf::from(":memory:"),
        webhook_secret: secret.map(str::to_owned),
        provider:       "mockcarrier".to_string(),
      }),
    }
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes =
      axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn sign(secret: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// A shipment with a carrier binding and an open tracking session.
  async fn bound_shipment(state: &AppState<SqliteStore>) -> Shipment {
    let code =
      shiptrack_core::code::generate(state.store.as_ref()).await.unwrap();
    let shipment = state
      .store
      .create_shipment(
        NewShipment::new(code).with_carrier("mockcarrier", "MC-1"),
      )
      .await
      .unwrap();
    state
      .store
      .set_tracking_session(shipment.shipment_id, "sess-w1".to_string())
      .await
      .unwrap();
    state.store.get_shipment(shipment.shipment_id).await.unwrap().unwrap()
  }

  // ── Shipments ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_get_round_trips() {
    let state = make_state(None).await;
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/shipments",
      vec![],
      r#"{"carrier":"mockcarrier","carrier_tracking_number":"MC-9"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = json_body(resp).await;
    let code = created["tracking_code"].as_str().unwrap();
    assert!(code.starts_with("SC"), "tracking code: {code}");
    assert_eq!(created["status"], "pending");

    let id = created["shipment_id"].as_str().unwrap().to_string();
    let resp =
      oneshot_raw(state, "GET", &format!("/shipments/{id}"), vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["tracking_code"], code);
  }

  #[tokio::test]
  async fn get_unknown_shipment_returns_404() {
    let state = make_state(None).await;
    let resp = oneshot_raw(
      state,
      "GET",
      &format!("/shipments/{}", Uuid::new_v4()),
      vec![],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn legal_status_change_returns_the_updated_shipment() {
    let state = make_state(None).await;
    let shipment = bound_shipment(&state).await;
    let resp = oneshot_raw(
      state,
      "POST",
      &format!("/shipments/{}/status", shipment.shipment_id),
      vec![],
      r#"{"status":"in-transit","admin_id":"ops"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["shipment"]["status"], "in-transit");
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 0);
  }

  #[tokio::test]
  async fn illegal_status_change_returns_409() {
    let state = make_state(None).await;
    let shipment = bound_shipment(&state).await;
    let resp = oneshot_raw(
      state,
      "POST",
      &format!("/shipments/{}/status", shipment.shipment_id),
      vec![],
      r#"{"status":"delivered","admin_id":"ops"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  // ── Webhook ─────────────────────────────────────────────────────────────────

  fn pickup_payload() -> String {
    serde_json::json!({
      "tracking_session_id": "sess-w1",
      "events": [{
        "kind": "pickup",
        "description": "picked up by courier",
        "occurred_at": "2026-08-01T10:00:00Z",
      }],
    })
    .to_string()
  }

  #[tokio::test]
  async fn signed_webhook_transitions_the_shipment() {
    let state = make_state(Some("topsecret")).await;
    let shipment = bound_shipment(&state).await;
    let body = pickup_payload();
    let sig = sign("topsecret", &body);
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/webhooks/tracking",
      vec![(header::HeaderName::from_static(webhook::SIGNATURE_HEADER), &sig)],
      &body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let out = json_body(resp).await;
    assert_eq!(out["accepted"], 1);
    assert_eq!(out["transitioned"], "in-transit");

    let after = state
      .store
      .get_shipment(shipment.shipment_id)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(after.status, ShipmentStatus::InTransit);
  }

  #[tokio::test]
  async fn webhook_with_bad_signature_is_rejected() {
    let state = make_state(Some("topsecret")).await;
    bound_shipment(&state).await;
    let body = pickup_payload();
    let sig = sign("wrong-secret", &body);
    let resp = oneshot_raw(
      state,
      "POST",
      "/webhooks/tracking",
      vec![(header::HeaderName::from_static(webhook::SIGNATURE_HEADER), &sig)],
      &body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn webhook_for_unknown_session_returns_404() {
    let state = make_state(None).await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/webhooks/tracking",
      vec![],
      r#"{"tracking_session_id":"sess-unknown","events":[]}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
