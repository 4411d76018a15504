//! Handlers for `/shipments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/shipments` | Optional `?status=`, `?limit=`, `?offset=` |
//! | `POST` | `/shipments` | Body: [`CreateBody`]; generates the tracking code |
//! | `GET`  | `/shipments/{id}` | 404 if not found |
//! | `POST` | `/shipments/{id}/status` | Manual transition with conflict detection |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use shiptrack_core::{
  code,
  event::ShipmentEvent,
  shipment::{NewShipment, Shipment, ShipmentDetails},
  status::ShipmentStatus,
  store::ShipmentStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

const DEFAULT_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<ShipmentStatus>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /shipments[?status=<status>][&limit=...][&offset=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Shipment>>, ApiError>
where
  S: ShipmentStore,
{
  let shipments = state
    .store
    .list_shipments(
      params.status,
      params.limit.unwrap_or(DEFAULT_PAGE),
      params.offset.unwrap_or(0),
    )
    .await?;
  Ok(Json(shipments))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub carrier: Option<String>,
  pub carrier_tracking_number: Option<String>,
  #[serde(default)]
  pub details:    ShipmentDetails,
  pub created_by: Option<String>,
}

/// `POST /shipments` — the server generates the tracking code.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ShipmentStore,
{
  let tracking_code = code::generate(state.store.as_ref()).await?;
  let mut input = NewShipment::new(tracking_code);
  if let (Some(carrier), Some(number)) =
    (body.carrier, body.carrier_tracking_number)
  {
    input = input.with_carrier(carrier, number);
  }
  input.details = body.details;
  input.created_by = body.created_by;

  let shipment = state.store.create_shipment(input).await?;
  Ok((StatusCode::CREATED, Json(shipment)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /shipments/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Shipment>, ApiError>
where
  S: ShipmentStore,
{
  let shipment = state
    .store
    .get_shipment(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("shipment {id} not found")))?;
  Ok(Json(shipment))
}

// ─── Manual status change ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status:   ShipmentStatus,
  /// Admin user recorded as the change's `source_id`.
  pub admin_id: String,
  pub note:     Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub shipment:  Shipment,
  pub change:    ShipmentEvent,
  /// Conflict annotations appended alongside the change, if any.
  pub conflicts: Vec<ShipmentEvent>,
}

/// `POST /shipments/{id}/status` — body: `{"status":"in-transit","admin_id":"..."}`
///
/// Illegal transitions return 409 and write nothing; conflicts with recent
/// carrier data never block the change, they come back in `conflicts`.
pub async fn change_status<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: ShipmentStore,
{
  let shipment = state
    .store
    .get_shipment(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("shipment {id} not found")))?;

  let note = body
    .note
    .unwrap_or_else(|| format!("manual status change to {}", body.status));
  let report = state
    .detector
    .manual_transition(
      state.store.as_ref(),
      &shipment,
      body.status,
      &body.admin_id,
      note,
    )
    .await?;

  let shipment = state
    .store
    .get_shipment(id)
    .await?
    .ok_or(shiptrack_core::Error::ShipmentNotFound(id))?;
  Ok(Json(StatusResponse {
    shipment,
    change: report.change,
    conflicts: report.annotations,
  }))
}
