//! Handler for the per-shipment ledger endpoint.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/shipments/{id}/events` | Newest first; see [`ListParams`] |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shiptrack_core::{
  event::{EventQuery, EventSource, EventType, ShipmentEvent},
  store::ShipmentStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Restrict to one event type, e.g. `status_change`.
  pub event_type:      Option<EventType>,
  /// Restrict to one source: `manual`, `api`, or `webhook`.
  pub source:          Option<EventSource>,
  pub occurred_after:  Option<DateTime<Utc>>,
  pub occurred_before: Option<DateTime<Utc>>,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

/// `GET /shipments/{id}/events[?event_type=...][&source=...][&limit=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ShipmentEvent>>, ApiError>
where
  S: ShipmentStore,
{
  // 404 for unknown shipments rather than an empty ledger.
  state
    .store
    .get_shipment(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("shipment {id} not found")))?;

  let query = EventQuery {
    event_types:     params.event_type.into_iter().collect(),
    sources:         params.source.into_iter().collect(),
    occurred_after:  params.occurred_after,
    occurred_before: params.occurred_before,
    limit:           params.limit,
    offset:          params.offset,
  };
  let events = state.store.events(id, &query).await?;
  Ok(Json(events))
}
