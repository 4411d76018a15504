//! The carrier adapter boundary.
//!
//! An adapter speaks one carrier's wire format and exposes it through this
//! carrier-neutral surface. The engine owns deduplication, ordering, and
//! status mapping — an adapter just reports what the carrier knows.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shiptrack_core::shipment::{Address, Package};

// ─── Carrier events ──────────────────────────────────────────────────────────

/// Structured event classification, when the carrier supplies one. Adapters
/// for carriers that only return free text leave this `None` and the engine
/// falls back to description matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierEventKind {
  Pickup,
  InTransit,
  OutForDelivery,
  Delivered,
  DeliveryAttempt,
  Exception,
  Cancelled,
  LocationUpdate,
}

/// A single event as reported by a carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierEvent {
  #[serde(default)]
  pub kind:        Option<CarrierEventKind>,
  pub description: String,
  #[serde(default)]
  pub location:    Option<String>,
  pub occurred_at: DateTime<Utc>,
  /// The carrier's raw payload, preserved verbatim in ledger metadata.
  #[serde(default)]
  pub raw:         serde_json::Value,
}

// ─── Session establishment ───────────────────────────────────────────────────

/// What the engine hands an adapter to open a tracking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrackingInput {
  pub carrier:         String,
  pub tracking_number: String,
  pub destination:     Address,
  pub package:         Package,
}

/// A carrier-side tracking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSession {
  pub session_id:         String,
  #[serde(default)]
  pub estimated_delivery: Option<DateTime<Utc>>,
  /// Events already known at session creation. The engine re-fetches and
  /// deduplicates, so adapters may return these or not.
  #[serde(default)]
  pub events:             Vec<CarrierEvent>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Adapter failures. Both variants are transient from the engine's point of
/// view and go through the retry policy; a timeout is treated identically to
/// a transport error.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
  #[error("transport error: {0}")]
  Transport(String),

  #[error("request timed out after {0:?}")]
  Timeout(Duration),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A pluggable carrier integration.
///
/// Implementations must bound each call in time themselves (the engine
/// assumes a hung carrier cannot stall a batch); see
/// [`crate::http::HttpCarrierAdapter`] for the reference implementation.
pub trait CarrierAdapter: Send + Sync {
  /// Provider name used to tag ledger entries and report integration
  /// health.
  fn provider_name(&self) -> &str;

  /// Establish a carrier-side tracking session for a shipment.
  fn create_tracking(
    &self,
    input: CreateTrackingInput,
  ) -> impl Future<Output = Result<TrackingSession, AdapterError>> + Send + '_;

  /// All events the carrier knows for a session. The engine deduplicates;
  /// adapters return everything.
  fn get_updates<'a>(
    &'a self,
    session_id: &'a str,
  ) -> impl Future<Output = Result<Vec<CarrierEvent>, AdapterError>> + Send + 'a;
}
