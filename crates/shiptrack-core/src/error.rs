//! Error types for `shiptrack-core`.
//!
//! One shared enum is used across the store trait and the services built on
//! top of it, so callers can branch on domain conditions (an illegal
//! transition, a missing shipment) without knowing which backend produced
//! them. Backend-specific failures are carried opaquely in [`Error::Storage`].

use thiserror::Error;
use uuid::Uuid;

use crate::status::ShipmentStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("shipment not found: {0}")]
  ShipmentNotFound(Uuid),

  #[error("event not found: {0}")]
  EventNotFound(Uuid),

  #[error("invalid status transition: {from} -> {to}")]
  InvalidTransition {
    from: ShipmentStatus,
    to:   ShipmentStatus,
  },

  #[error("tracking code already assigned: {0}")]
  DuplicateTrackingCode(String),

  #[error("tracking code generation exhausted after {attempts} attempts")]
  CodeGenerationExhausted { attempts: u32 },

  #[error("invalid tracking code: {0}")]
  InvalidCode(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A backend failure the caller cannot interpret (I/O, connection loss).
  /// Never produced for domain conditions — those have their own variants.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error as [`Error::Storage`].
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
