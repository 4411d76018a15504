//! Error type for `shiptrack-store-sqlite`.
//!
//! Domain conditions (missing shipment, illegal transition, duplicate code)
//! have their own variants so they convert losslessly into
//! [`shiptrack_core::Error`]; everything else becomes an opaque storage
//! error at the trait boundary.

use shiptrack_core::status::ShipmentStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("shipment not found: {0}")]
  ShipmentNotFound(Uuid),

  #[error("invalid status transition: {from} -> {to}")]
  InvalidTransition {
    from: ShipmentStatus,
    to:   ShipmentStatus,
  },

  #[error("tracking code already assigned: {0}")]
  DuplicateTrackingCode(String),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("connection error: {0}")]
  Connection(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown discriminant in column {column}: {value:?}")]
  UnknownDiscriminant { column: &'static str, value: String },
}

impl From<Error> for shiptrack_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::ShipmentNotFound(id) => Self::ShipmentNotFound(id),
      Error::InvalidTransition { from, to } => {
        Self::InvalidTransition { from, to }
      }
      Error::DuplicateTrackingCode(code) => Self::DuplicateTrackingCode(code),
      other => Self::storage(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
