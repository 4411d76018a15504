//! The shared carrier-event ingestion pipeline.
//!
//! Polled sync results and webhook payloads flow through this exact path;
//! the only difference between them is the `source` tag recorded on the
//! ledger entries. The pipeline deduplicates against the ledger, applies
//! events in increasing event-time order, and attempts at most one status
//! transition per batch — for the latest mapped status.

use std::collections::HashSet;

use shiptrack_core::{
  Error as CoreError,
  event::{EventMetadata, EventSource, NewEvent},
  shipment::Shipment,
  status::ShipmentStatus,
  store::{ShipmentStore, StatusChange},
};

use crate::{Result, adapter::CarrierEvent, mapping};

/// What a single ingestion pass did.
#[derive(Debug, Default, Clone)]
pub struct IngestOutcome {
  /// Events newly appended to the ledger.
  pub accepted:     usize,
  /// Events dropped because `(shipment, source, occurred_at)` was already
  /// present.
  pub duplicates:   usize,
  /// The transition applied, if the latest mapped status differed from the
  /// shipment's current status and was legal.
  pub transitioned: Option<ShipmentStatus>,
  /// A carrier-reported transition the state machine rejected; recorded in
  /// the ledger and skipped.
  pub skipped:      Option<(ShipmentStatus, ShipmentStatus)>,
}

/// Ingest a batch of carrier events for `shipment`.
///
/// `source` must be a carrier source (`api` or `webhook`); `provider` tags
/// every ledger entry written.
pub async fn ingest_carrier_events<S: ShipmentStore>(
  store: &S,
  shipment: &Shipment,
  mut events: Vec<CarrierEvent>,
  source: EventSource,
  provider: &str,
) -> Result<IngestOutcome> {
  debug_assert!(source.is_carrier());

  let mut outcome = IngestOutcome::default();

  // Dedup against the ledger before writing anything.
  let known: HashSet<_> = store
    .existing_ingest_keys(shipment.shipment_id, source)
    .await?
    .into_iter()
    .collect();
  let total = events.len();
  events.retain(|e| !known.contains(&e.occurred_at));
  outcome.duplicates = total - events.len();

  // Apply in increasing event-time order so "latest status wins" is
  // well-defined.
  events.sort_by_key(|e| e.occurred_at);

  let mut latest_mapped: Option<(chrono::DateTime<chrono::Utc>, ShipmentStatus)> =
    None;

  for event in events {
    let mapped = mapping::map_status(&event);
    let new_event = NewEvent {
      shipment_id: shipment.shipment_id,
      event_type:  mapping::ledger_event_type(&event),
      status:      mapped,
      description: event.description.clone(),
      location:    event.location.clone(),
      source,
      source_id:   Some(provider.to_owned()),
      occurred_at: Some(event.occurred_at),
      metadata:    (!event.raw.is_null())
        .then(|| EventMetadata::Carrier { raw: event.raw.clone() }),
    };

    // A batch can repeat a timestamp the ledger scan did not know about;
    // the store-level idempotency check is the backstop.
    match store.ingest_event(new_event).await? {
      Some(_) => outcome.accepted += 1,
      None => outcome.duplicates += 1,
    }

    if let Some(status) = mapped {
      latest_mapped = Some((event.occurred_at, status));
    }
  }

  // At most one transition per pass: the latest mapped status.
  if let Some((at, status)) = latest_mapped
    && status != shipment.status
  {
    let change = StatusChange::new(
      source,
      format!("carrier reported {status}"),
    )
    .with_source_id(provider)
    .at(at);

    match store.transition(shipment.shipment_id, status, change).await {
      Ok(_) => outcome.transitioned = Some(status),
      Err(CoreError::InvalidTransition { from, to }) => {
        // Carrier data cannot be assumed correct; record the skip and keep
        // the sync successful.
        tracing::warn!(
          shipment_id = %shipment.shipment_id,
          %from,
          %to,
          "carrier reported an illegal transition, skipping"
        );
        store
          .record_event(
            NewEvent::new(
              shipment.shipment_id,
              shiptrack_core::event::EventType::ApiSync,
              source,
              format!("skipped illegal carrier transition {from} -> {to}"),
            )
            .with_source_id(provider)
            .with_metadata(EventMetadata::SkippedTransition { from, to }),
          )
          .await?;
        outcome.skipped = Some((from, to));
      }
      Err(other) => return Err(other.into()),
    }
  }

  Ok(outcome)
}
