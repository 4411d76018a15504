//! Conflict detection for manual status changes.
//!
//! Every manual transition is checked against the recent ledger before it
//! is applied. Conflicts never block the change; they are appended to the
//! ledger as annotation events so an operator can audit them later.

use chrono::{DateTime, Duration, Utc};
use shiptrack_core::{
  Result,
  event::{
    EventMetadata, EventQuery, EventSource, EventType, NewEvent, StatusAt,
  },
  shipment::Shipment,
  status::ShipmentStatus,
  store::{ShipmentStore, StatusChange},
};

/// Default lookback window for both conflict rules.
const DEFAULT_WINDOW_SECS: i64 = 300;

/// A manual status change plus the conflict annotations it produced.
#[derive(Debug, Clone)]
pub struct ManualChangeReport {
  /// The status-change event appended by the transition itself.
  pub change:      shiptrack_core::event::ShipmentEvent,
  /// Conflict annotations appended after the change, oldest first.
  pub annotations: Vec<shiptrack_core::event::ShipmentEvent>,
}

/// Applies manual transitions and flags the ones that disagree with recent
/// carrier data or pile up too quickly.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
  window: Duration,
}

impl Default for ConflictDetector {
  fn default() -> Self {
    Self { window: Duration::seconds(DEFAULT_WINDOW_SECS) }
  }
}

impl ConflictDetector {
  pub fn new(window: Duration) -> Self { Self { window } }

  /// Apply a manual transition on behalf of `admin_id`, then append any
  /// conflict annotations.
  ///
  /// The transition itself is still subject to the state machine; an
  /// illegal target fails with `InvalidTransition` and writes nothing.
  pub async fn manual_transition<S: ShipmentStore>(
    &self,
    store: &S,
    shipment: &Shipment,
    to: ShipmentStatus,
    admin_id: &str,
    description: impl Into<String>,
  ) -> Result<ManualChangeReport> {
    let now = Utc::now();
    let since = now - self.window;

    let disagreement = self.recent_carrier_disagreement(store, shipment, to, since).await?;
    let recent_changes = self.recent_manual_changes(store, shipment, since).await?;

    let change = store
      .transition(
        shipment.shipment_id,
        to,
        StatusChange::new(EventSource::Manual, description)
          .with_source_id(admin_id),
      )
      .await?;

    let mut annotations = Vec::new();

    if let Some(carrier_event) = disagreement {
      tracing::warn!(
        shipment_id = %shipment.shipment_id,
        manual = %to,
        carrier = %carrier_event.1,
        "manual status change disagrees with recent carrier data"
      );
      let (event, carrier_status) = carrier_event;
      annotations.push(
        store
          .record_event(
            // The annotation is itself a status_change entry carrying the
            // status that stands after the override, so the projection
            // invariant holds.
            NewEvent::new(
              shipment.shipment_id,
              EventType::StatusChange,
              EventSource::Manual,
              format!(
                "manual override: carrier last reported {carrier_status}"
              ),
            )
            .with_status(to)
            .with_source_id(admin_id)
            .with_metadata(EventMetadata::ApiManualConflict {
              manual_status:           to,
              api_status:              carrier_status,
              conflicting_event_id:    event.event_id,
              conflicting_occurred_at: event.occurred_at,
              admin_override:          true,
            }),
          )
          .await?,
      );
    }

    // The change just applied counts toward the rapid-change total.
    let total = recent_changes.len() + 1;
    if total >= 2 {
      let mut recent: Vec<StatusAt> = recent_changes
        .iter()
        .filter_map(|e| {
          e.status.map(|status| StatusAt { status, occurred_at: e.occurred_at })
        })
        .collect();
      recent.push(StatusAt { status: to, occurred_at: change.occurred_at });
      recent.sort_by_key(|s| s.occurred_at);

      tracing::warn!(
        shipment_id = %shipment.shipment_id,
        count = total,
        "rapid status changes within the conflict window"
      );
      annotations.push(
        store
          .record_event(
            NewEvent::new(
              shipment.shipment_id,
              EventType::ApiSync,
              EventSource::Manual,
              format!("{total} status changes within {}s", self.window.num_seconds()),
            )
            .with_source_id(admin_id)
            .with_metadata(EventMetadata::RapidStatusChanges {
              count:       total,
              window_secs: self.window.num_seconds() as u64,
              recent,
            }),
          )
          .await?,
      );
    }

    Ok(ManualChangeReport { change, annotations })
  }

  /// The most recent carrier event in the window whose mapped status
  /// disagrees with the intended manual status.
  async fn recent_carrier_disagreement<S: ShipmentStore>(
    &self,
    store: &S,
    shipment: &Shipment,
    to: ShipmentStatus,
    since: DateTime<Utc>,
  ) -> Result<Option<(shiptrack_core::event::ShipmentEvent, ShipmentStatus)>>
  {
    let query = EventQuery {
      sources: vec![EventSource::Api, EventSource::Webhook],
      occurred_after: Some(since),
      ..EventQuery::default()
    };
    // Events come back newest first; the first status-bearing one wins.
    let events = store.events(shipment.shipment_id, &query).await?;
    Ok(events.into_iter().find_map(|e| {
      match e.status {
        Some(status) if status != to => Some((e, status)),
        _ => None,
      }
    }))
  }

  /// Status changes already in the window, any source. Override annotations
  /// share the `status_change` type but record no actual change, so they are
  /// excluded from the rapid-change count.
  async fn recent_manual_changes<S: ShipmentStore>(
    &self,
    store: &S,
    shipment: &Shipment,
    since: DateTime<Utc>,
  ) -> Result<Vec<shiptrack_core::event::ShipmentEvent>> {
    let query = EventQuery {
      event_types: vec![EventType::StatusChange],
      occurred_after: Some(since),
      ..EventQuery::default()
    };
    let events = store.events(shipment.shipment_id, &query).await?;
    Ok(
      events
        .into_iter()
        .filter(|e| {
          !matches!(e.metadata, Some(EventMetadata::ApiManualConflict { .. }))
        })
        .collect(),
    )
  }
}
