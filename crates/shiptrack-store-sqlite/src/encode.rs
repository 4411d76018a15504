//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields
//! (ShipmentDetails, EventMetadata) are stored as compact JSON — the only
//! place in the system where they exist in serialised form. UUIDs are stored
//! as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use shiptrack_core::{
  code::TrackingCode,
  event::{EventMetadata, EventSource, EventType, ShipmentEvent},
  shipment::{IntegrationState, Shipment, ShipmentDetails, SyncOutcome},
  status::ShipmentStatus,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<ShipmentStatus> {
  ShipmentStatus::ALL
    .into_iter()
    .find(|v| v.as_str() == s)
    .ok_or_else(|| Error::UnknownDiscriminant {
      column: "status",
      value:  s.to_owned(),
    })
}

pub fn decode_source(s: &str) -> Result<EventSource> {
  match s {
    "manual" => Ok(EventSource::Manual),
    "api" => Ok(EventSource::Api),
    "webhook" => Ok(EventSource::Webhook),
    other => Err(Error::UnknownDiscriminant {
      column: "source",
      value:  other.to_owned(),
    }),
  }
}

pub fn decode_event_type(s: &str) -> Result<EventType> {
  match s {
    "shipment_created" => Ok(EventType::ShipmentCreated),
    "status_change" => Ok(EventType::StatusChange),
    "location_update" => Ok(EventType::LocationUpdate),
    "delivery_attempt" => Ok(EventType::DeliveryAttempt),
    "exception" => Ok(EventType::Exception),
    "api_sync" => Ok(EventType::ApiSync),
    other => Err(Error::UnknownDiscriminant {
      column: "event_type",
      value:  other.to_owned(),
    }),
  }
}

pub fn decode_outcome(s: &str) -> Result<SyncOutcome> {
  match s {
    "pending" => Ok(SyncOutcome::Pending),
    "success" => Ok(SyncOutcome::Success),
    "failed" => Ok(SyncOutcome::Failed),
    other => Err(Error::UnknownDiscriminant {
      column: "last_outcome",
      value:  other.to_owned(),
    }),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_details(d: &ShipmentDetails) -> Result<String> {
  Ok(serde_json::to_string(d)?)
}

pub fn decode_details(s: &str) -> Result<ShipmentDetails> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_metadata(m: &EventMetadata) -> Result<String> {
  Ok(serde_json::to_string(m)?)
}

pub fn decode_metadata(s: &str) -> Result<EventMetadata> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawShipment`]; keep the two in sync.
pub const SHIPMENT_COLS: &str = "shipment_id, tracking_code, created_at, \
   status, carrier, carrier_tracking_number, last_synced_at, last_outcome, \
   last_error, tracking_session_id, needs_review, details";

/// Raw strings read directly from a `shipments` row.
pub struct RawShipment {
  pub shipment_id:   String,
  pub tracking_code: String,
  pub created_at:    String,
  pub status:        String,
  pub carrier:       Option<String>,
  pub carrier_tracking_number: Option<String>,
  pub last_synced_at: Option<String>,
  pub last_outcome:  String,
  pub last_error:    Option<String>,
  pub tracking_session_id: Option<String>,
  pub needs_review:  bool,
  pub details:       String,
}

impl RawShipment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      shipment_id:   row.get(0)?,
      tracking_code: row.get(1)?,
      created_at:    row.get(2)?,
      status:        row.get(3)?,
      carrier:       row.get(4)?,
      carrier_tracking_number: row.get(5)?,
      last_synced_at: row.get(6)?,
      last_outcome:  row.get(7)?,
      last_error:    row.get(8)?,
      tracking_session_id: row.get(9)?,
      needs_review:  row.get(10)?,
      details:       row.get(11)?,
    })
  }

  pub fn into_shipment(self) -> Result<Shipment> {
    Ok(Shipment {
      shipment_id:   decode_uuid(&self.shipment_id)?,
      tracking_code: TrackingCode::parse(&self.tracking_code)
        .map_err(|_| Error::UnknownDiscriminant {
          column: "tracking_code",
          value:  self.tracking_code.clone(),
        })?,
      created_at:    decode_dt(&self.created_at)?,
      status:        decode_status(&self.status)?,
      carrier:       self.carrier,
      carrier_tracking_number: self.carrier_tracking_number,
      integration:   IntegrationState {
        last_synced_at: self
          .last_synced_at
          .as_deref()
          .map(decode_dt)
          .transpose()?,
        last_outcome: decode_outcome(&self.last_outcome)?,
        last_error: self.last_error,
        tracking_session_id: self.tracking_session_id,
        needs_review: self.needs_review,
      },
      details:       decode_details(&self.details)?,
    })
  }
}

/// Column list matching [`RawEvent`]; keep the two in sync.
pub const EVENT_COLS: &str = "event_id, shipment_id, event_type, status, \
   description, location, source, source_id, occurred_at, recorded_at, \
   metadata";

/// Raw strings read directly from a `shipment_events` row.
pub struct RawEvent {
  pub event_id:    String,
  pub shipment_id: String,
  pub event_type:  String,
  pub status:      Option<String>,
  pub description: String,
  pub location:    Option<String>,
  pub source:      String,
  pub source_id:   Option<String>,
  pub occurred_at: String,
  pub recorded_at: String,
  pub metadata:    Option<String>,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:    row.get(0)?,
      shipment_id: row.get(1)?,
      event_type:  row.get(2)?,
      status:      row.get(3)?,
      description: row.get(4)?,
      location:    row.get(5)?,
      source:      row.get(6)?,
      source_id:   row.get(7)?,
      occurred_at: row.get(8)?,
      recorded_at: row.get(9)?,
      metadata:    row.get(10)?,
    })
  }

  pub fn into_event(self) -> Result<ShipmentEvent> {
    Ok(ShipmentEvent {
      event_id:    decode_uuid(&self.event_id)?,
      shipment_id: decode_uuid(&self.shipment_id)?,
      event_type:  decode_event_type(&self.event_type)?,
      status:      self.status.as_deref().map(decode_status).transpose()?,
      description: self.description,
      location:    self.location,
      source:      decode_source(&self.source)?,
      source_id:   self.source_id,
      occurred_at: decode_dt(&self.occurred_at)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      metadata:    self
        .metadata
        .as_deref()
        .map(decode_metadata)
        .transpose()?,
    })
  }
}
