//! Shipment — the aggregate root of the tracking engine.
//!
//! A shipment owns exactly one authoritative [`ShipmentStatus`]; everything
//! else recorded about it lives in its events. The denormalised
//! [`ShipmentDetails`] block is informational — populated by sync for
//! display, never an input to the state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{code::TrackingCode, status::ShipmentStatus};

// ─── Sync bookkeeping ────────────────────────────────────────────────────────

/// Outcome of the most recent sync attempt.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
  /// Never attempted.
  #[default]
  Pending,
  Success,
  Failed,
}

impl SyncOutcome {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Success => "success",
      Self::Failed => "failed",
    }
  }
}

/// Carrier-integration state, maintained exclusively by the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationState {
  /// Last *successful* sync; `None` until one succeeds.
  pub last_synced_at:      Option<DateTime<Utc>>,
  pub last_outcome:        SyncOutcome,
  pub last_error:          Option<String>,
  /// Carrier-side session handle obtained from `create_tracking`.
  pub tracking_session_id: Option<String>,
  /// Set on sync failure; cleared only by an operator.
  pub needs_review:        bool,
}

// ─── Denormalised details ────────────────────────────────────────────────────

/// A structured postal address. Stored as JSON at the storage edge only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  pub line1:       Option<String>,
  pub line2:       Option<String>,
  pub city:        Option<String>,
  pub region:      Option<String>,
  pub postal_code: Option<String>,
  pub country:     Option<String>,
}

/// Package description as reported to or by the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
  pub description: Option<String>,
  pub weight_kg:   Option<f64>,
  pub pieces:      Option<u32>,
}

/// Display-oriented fields populated by sync. None of these drive the state
/// machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentDetails {
  pub recipient_name:     Option<String>,
  pub recipient_phone:    Option<String>,
  pub package:            Package,
  pub origin:             Address,
  pub destination:        Address,
  pub estimated_delivery: Option<DateTime<Utc>>,
  /// Set by the state machine when the shipment enters `delivered`.
  pub actual_delivery:    Option<DateTime<Utc>>,
}

// ─── Shipment ────────────────────────────────────────────────────────────────

/// The tracked logistics unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
  pub shipment_id: Uuid,
  /// Public, carrier-opaque identifier; immutable once assigned.
  pub tracking_code: TrackingCode,
  pub created_at:  DateTime<Utc>,
  /// Projection of the most recent accepted `status_change` event.
  pub status:      ShipmentStatus,
  /// Carrier identifier (e.g. "ups"); mutable only via explicit
  /// reassignment, never through sync.
  pub carrier:     Option<String>,
  pub carrier_tracking_number: Option<String>,
  pub integration: IntegrationState,
  pub details:     ShipmentDetails,
}

// ─── NewShipment ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::ShipmentStore::create_shipment`].
///
/// The store assigns the id and timestamps, sets status `pending`, and
/// writes the single `shipment_created` event in the same transaction.
#[derive(Debug, Clone)]
pub struct NewShipment {
  pub tracking_code: TrackingCode,
  pub carrier:       Option<String>,
  pub carrier_tracking_number: Option<String>,
  pub details:       ShipmentDetails,
  /// Admin user recorded as the creation event's `source_id`.
  pub created_by:    Option<String>,
}

impl NewShipment {
  pub fn new(tracking_code: TrackingCode) -> Self {
    Self {
      tracking_code,
      carrier: None,
      carrier_tracking_number: None,
      details: ShipmentDetails::default(),
      created_by: None,
    }
  }

  pub fn with_carrier(
    mut self,
    carrier: impl Into<String>,
    tracking_number: impl Into<String>,
  ) -> Self {
    self.carrier = Some(carrier.into());
    self.carrier_tracking_number = Some(tracking_number.into());
    self
  }
}
