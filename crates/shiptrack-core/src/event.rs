//! Shipment events — the append-only audit trail.
//!
//! An event is an immutable fact about a shipment. Events are never updated
//! or deleted (administrative purge of a whole shipment aside); the current
//! shipment status is a projection of the most recent accepted
//! `status_change` event, maintained by the store in the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::ShipmentStatus;

// ─── Discriminants ───────────────────────────────────────────────────────────

/// What kind of fact an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
  ShipmentCreated,
  StatusChange,
  LocationUpdate,
  DeliveryAttempt,
  Exception,
  /// Bookkeeping emitted by the reconciliation machinery — a skipped
  /// transition from the sync engine, a rapid-change flag from the conflict
  /// detector; never carries a status of its own.
  ApiSync,
}

impl EventType {
  /// The discriminant string stored in the `event_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::ShipmentCreated => "shipment_created",
      Self::StatusChange => "status_change",
      Self::LocationUpdate => "location_update",
      Self::DeliveryAttempt => "delivery_attempt",
      Self::Exception => "exception",
      Self::ApiSync => "api_sync",
    }
  }
}

/// How an event entered the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
  /// Recorded by an administrator.
  Manual,
  /// Pulled from the carrier by the sync engine.
  Api,
  /// Pushed by the carrier to the webhook endpoint.
  Webhook,
}

impl EventSource {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Manual => "manual",
      Self::Api => "api",
      Self::Webhook => "webhook",
    }
  }

  /// Carrier-issued sources participate in idempotent ingestion and in
  /// conflict detection against manual changes.
  pub fn is_carrier(self) -> bool {
    matches!(self, Self::Api | Self::Webhook)
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// A status paired with when it was (or would have been) effective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAt {
  pub status:      ShipmentStatus,
  pub occurred_at: DateTime<Utc>,
}

/// Structured, source-specific context attached to an event.
///
/// Serialised as tagged JSON at the storage edge only; business logic
/// matches on these variants, never on raw strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventMetadata {
  /// An administrator forced a status while the carrier had recently
  /// reported a different one. Advisory — the manual change still applied.
  ApiManualConflict {
    manual_status:         ShipmentStatus,
    api_status:            ShipmentStatus,
    conflicting_event_id:  Uuid,
    conflicting_occurred_at: DateTime<Utc>,
    admin_override:        bool,
  },
  /// Two or more status changes landed inside the detection window.
  RapidStatusChanges {
    count:       usize,
    window_secs: u64,
    recent:      Vec<StatusAt>,
  },
  /// A sync attempt exhausted its retries.
  SyncFailure { attempts: u32, error: String },
  /// The carrier reported a status the state machine rejected; the sync
  /// recorded the skip and carried on.
  SkippedTransition {
    from: ShipmentStatus,
    to:   ShipmentStatus,
  },
  /// The raw carrier payload for an ingested event.
  Carrier { raw: serde_json::Value },
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// An immutable ledger entry. Once written, no field is ever updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEvent {
  pub event_id:    Uuid,
  pub shipment_id: Uuid,
  pub event_type:  EventType,
  /// The resulting status, for `status_change` (and creation) events.
  pub status:      Option<ShipmentStatus>,
  pub description: String,
  pub location:    Option<String>,
  pub source:      EventSource,
  /// Admin user id for manual events, adapter provider name for carrier
  /// events.
  pub source_id:   Option<String>,
  /// When the event happened, as reported by the carrier or administrator.
  pub occurred_at: DateTime<Utc>,
  /// When the ledger accepted the event; server-assigned, never changes.
  pub recorded_at: DateTime<Utc>,
  pub metadata:    Option<EventMetadata>,
}

// ─── NewEvent ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ShipmentStore::record_event`].
/// `recorded_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub shipment_id: Uuid,
  pub event_type:  EventType,
  pub status:      Option<ShipmentStatus>,
  pub description: String,
  pub location:    Option<String>,
  pub source:      EventSource,
  pub source_id:   Option<String>,
  /// Defaults to now when `None`.
  pub occurred_at: Option<DateTime<Utc>>,
  pub metadata:    Option<EventMetadata>,
}

impl NewEvent {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    shipment_id: Uuid,
    event_type: EventType,
    source: EventSource,
    description: impl Into<String>,
  ) -> Self {
    Self {
      shipment_id,
      event_type,
      status: None,
      description: description.into(),
      location: None,
      source,
      source_id: None,
      occurred_at: None,
      metadata: None,
    }
  }

  pub fn with_status(mut self, status: ShipmentStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_location(mut self, location: impl Into<String>) -> Self {
    self.location = Some(location.into());
    self
  }

  pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
    self.source_id = Some(source_id.into());
    self
  }

  pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
    self.occurred_at = Some(occurred_at);
    self
  }

  pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
    self.metadata = Some(metadata);
    self
  }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::ShipmentStore::events`].
///
/// Results are ordered by `occurred_at` descending, ties broken by
/// `recorded_at` then insertion order — deterministic, so pagination stays
/// consistent across identical re-runs.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
  /// Restrict to these event types; empty means all.
  pub event_types:     Vec<EventType>,
  /// Restrict to these sources; empty means all.
  pub sources:         Vec<EventSource>,
  pub occurred_after:  Option<DateTime<Utc>>,
  pub occurred_before: Option<DateTime<Utc>>,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}
