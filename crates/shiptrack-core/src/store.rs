//! The `ShipmentStore` trait — the persistence seam of the engine.
//!
//! The trait is implemented by storage backends (e.g.
//! `shiptrack-store-sqlite`). Higher layers (the sync engine, the HTTP
//! surface, the CLI) depend on this abstraction, not on any concrete
//! backend.
//!
//! Layering is strict: the event ledger is the leaf. The status projection
//! is only ever written through [`ShipmentStore::transition`], together with
//! its `status_change` ledger entry, in one atomic unit — a status update
//! must never be observable without its event, nor the reverse.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  code::TrackingCode,
  event::{EventMetadata, EventQuery, EventSource, NewEvent, ShipmentEvent},
  shipment::{NewShipment, Shipment},
  status::ShipmentStatus,
};

// ─── Status change input ─────────────────────────────────────────────────────

/// Caller-supplied context for [`ShipmentStore::transition`]. The store
/// builds the `status_change` event from this; `status` and `event_type` are
/// not accepted from callers.
#[derive(Debug, Clone)]
pub struct StatusChange {
  pub description: String,
  pub location:    Option<String>,
  pub source:      EventSource,
  pub source_id:   Option<String>,
  /// When the change happened; defaults to now. Used as `actual_delivery`
  /// when transitioning into `delivered`.
  pub occurred_at: Option<DateTime<Utc>>,
  pub metadata:    Option<EventMetadata>,
}

impl StatusChange {
  pub fn new(source: EventSource, description: impl Into<String>) -> Self {
    Self {
      description: description.into(),
      location: None,
      source,
      source_id: None,
      occurred_at: None,
      metadata: None,
    }
  }

  pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
    self.source_id = Some(source_id.into());
    self
  }

  pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
    self.occurred_at = Some(occurred_at);
    self
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a shiptrack storage backend.
///
/// Event writes are append-only and durable before the call returns — the
/// audit guarantee the rest of the system relies on. All methods return
/// `Send` futures so the trait can be used across tokio tasks.
pub trait ShipmentStore: Send + Sync {
  // ── Shipments ─────────────────────────────────────────────────────────

  /// Create a shipment with status `pending` and its single
  /// `shipment_created` event, atomically. Fails with
  /// [`crate::Error::DuplicateTrackingCode`] if the code is taken.
  fn create_shipment(
    &self,
    input: NewShipment,
  ) -> impl Future<Output = Result<Shipment>> + Send + '_;

  /// Retrieve a shipment by id. Returns `None` if not found.
  fn get_shipment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Shipment>>> + Send + '_;

  fn get_by_tracking_code<'a>(
    &'a self,
    code: &'a TrackingCode,
  ) -> impl Future<Output = Result<Option<Shipment>>> + Send + 'a;

  /// Look up the shipment bound to a carrier tracking session. Used by the
  /// webhook path, which only knows the session id.
  fn get_by_tracking_session<'a>(
    &'a self,
    session_id: &'a str,
  ) -> impl Future<Output = Result<Option<Shipment>>> + Send + 'a;

  fn list_shipments(
    &self,
    status: Option<ShipmentStatus>,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<Vec<Shipment>>> + Send + '_;

  fn tracking_code_exists<'a>(
    &'a self,
    code: &'a TrackingCode,
  ) -> impl Future<Output = Result<bool>> + Send + 'a;

  /// Explicitly rebind the shipment to a carrier. The only path that
  /// mutates the carrier binding — sync never touches it.
  fn reassign_carrier(
    &self,
    id: Uuid,
    carrier: String,
    tracking_number: String,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Administrative purge: delete the shipment and all of its events.
  /// Returns the number of events removed. Not part of normal operation.
  fn purge_shipment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<u64>> + Send + '_;

  // ── Status state machine ──────────────────────────────────────────────

  /// Apply a status transition.
  ///
  /// Validates `to` against the adjacency table in [`crate::status`] using
  /// the *persisted* status, inside the same transaction that appends the
  /// `status_change` event and updates the projection (and
  /// `actual_delivery` when entering `delivered`). Fails with
  /// [`crate::Error::InvalidTransition`] without writing anything. The
  /// check is unconditional — manual and carrier-sourced changes alike.
  fn transition(
    &self,
    id: Uuid,
    to: ShipmentStatus,
    change: StatusChange,
  ) -> impl Future<Output = Result<ShipmentEvent>> + Send + '_;

  // ── Event ledger ──────────────────────────────────────────────────────

  /// Append an event. Fails with [`crate::Error::ShipmentNotFound`] if the
  /// shipment does not exist. Durable before the call returns.
  fn record_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<ShipmentEvent>> + Send + '_;

  /// Append a carrier-origin event idempotently: if an event with the same
  /// `(shipment_id, source, occurred_at)` already exists, nothing is
  /// written and `None` is returned.
  fn ingest_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Option<ShipmentEvent>>> + Send + '_;

  /// Query the ledger with deterministic ordering: `occurred_at`
  /// descending, ties broken by `recorded_at`, then insertion order.
  fn events<'a>(
    &'a self,
    shipment_id: Uuid,
    query: &'a EventQuery,
  ) -> impl Future<Output = Result<Vec<ShipmentEvent>>> + Send + 'a;

  /// The most recent event, by the same ordering as [`Self::events`].
  fn latest_event(
    &self,
    shipment_id: Uuid,
  ) -> impl Future<Output = Result<Option<ShipmentEvent>>> + Send + '_;

  /// The most recent `status_change` (or creation) event — the event whose
  /// status the shipment's projection must equal.
  fn latest_status_event(
    &self,
    shipment_id: Uuid,
  ) -> impl Future<Output = Result<Option<ShipmentEvent>>> + Send + '_;

  /// The `occurred_at` keys of existing events for `(shipment_id, source)`.
  /// Used by the sync engine to deduplicate carrier batches before
  /// appending.
  fn existing_ingest_keys(
    &self,
    shipment_id: Uuid,
    source: EventSource,
  ) -> impl Future<Output = Result<Vec<DateTime<Utc>>>> + Send + '_;

  // ── Sync bookkeeping ──────────────────────────────────────────────────

  /// Shipments eligible for a sync pass: active status, a tracking session
  /// present, and last successful sync `None` or older than
  /// `synced_before`; capped at `limit`.
  fn list_sync_candidates(
    &self,
    synced_before: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Shipment>>> + Send + '_;

  fn set_tracking_session(
    &self,
    id: Uuid,
    session_id: String,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Record a successful sync: sets `last_synced_at`, outcome `success`,
  /// clears `last_error`.
  fn mark_sync_success(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Record a failed sync: outcome `failed`, stores the error message, and
  /// flags the shipment for review.
  fn mark_sync_failure(
    &self,
    id: Uuid,
    error: String,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Operator acknowledgement of a reviewed failure.
  fn clear_needs_review(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Replace the shipment's denormalised display details (ETA, addresses,
  /// package). Callers merge; the store writes. Informational only —
  /// `actual_delivery` is owned by [`Self::transition`].
  fn update_details(
    &self,
    id: Uuid,
    details: crate::shipment::ShipmentDetails,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}
