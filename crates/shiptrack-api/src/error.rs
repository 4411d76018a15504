//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// State-machine rejections and tracking-code collisions.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid webhook signature")]
  InvalidSignature,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<shiptrack_core::Error> for ApiError {
  fn from(e: shiptrack_core::Error) -> Self {
    use shiptrack_core::Error as E;
    match e {
      E::ShipmentNotFound(id) => {
        ApiError::NotFound(format!("shipment {id} not found"))
      }
      E::EventNotFound(id) => {
        ApiError::NotFound(format!("event {id} not found"))
      }
      E::InvalidTransition { .. } | E::DuplicateTrackingCode(_) => {
        ApiError::Conflict(e.to_string())
      }
      E::InvalidCode(_) => ApiError::BadRequest(e.to_string()),
      other => ApiError::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::InvalidSignature => {
        (StatusCode::UNAUTHORIZED, self.to_string())
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
