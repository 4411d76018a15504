use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use shiptrack_core::{
  code,
  event::{
    EventMetadata, EventQuery, EventSource, EventType, NewEvent,
  },
  shipment::{NewShipment, Shipment, SyncOutcome},
  status::ShipmentStatus,
  store::{ShipmentStore, StatusChange},
};
use shiptrack_store_sqlite::SqliteStore;

use crate::{
  Error, SyncConfig, SyncEngine,
  adapter::{
    AdapterError, CarrierAdapter, CarrierEvent, CarrierEventKind,
    CreateTrackingInput, TrackingSession,
  },
  conflict::ConflictDetector,
  ingest,
  ratelimit::RateLimiter,
  retry::RetryPolicy,
};

// ─── Mock adapter ────────────────────────────────────────────────────────────

type UpdatesResult = Result<Vec<CarrierEvent>, AdapterError>;

#[derive(Default)]
struct SessionScript {
  calls:   usize,
  results: Vec<UpdatesResult>,
}

/// Scripted in-memory carrier. Sessions are keyed `sess-{tracking_number}`;
/// `get_updates` walks the scripted results and repeats the last one once
/// the script runs out.
#[derive(Clone, Default)]
struct MockAdapter {
  inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
  create_calls: AtomicU32,
  update_calls: AtomicU32,
  fail_creates: AtomicU32,
  eta:          Mutex<Option<DateTime<Utc>>>,
  scripts:      Mutex<HashMap<String, SessionScript>>,
}

impl MockAdapter {
  fn script(&self, session_id: &str, results: Vec<UpdatesResult>) {
    let mut scripts = self.inner.scripts.lock().unwrap();
    scripts
      .insert(session_id.to_owned(), SessionScript { calls: 0, results });
  }

  fn with_eta(self, eta: DateTime<Utc>) -> Self {
    *self.inner.eta.lock().unwrap() = Some(eta);
    self
  }

  fn create_calls(&self) -> u32 {
    self.inner.create_calls.load(Ordering::SeqCst)
  }

  fn update_calls(&self) -> u32 {
    self.inner.update_calls.load(Ordering::SeqCst)
  }
}

impl CarrierAdapter for MockAdapter {
  fn provider_name(&self) -> &str { "mockcarrier" }

  async fn create_tracking(
    &self,
    input: CreateTrackingInput,
  ) -> Result<TrackingSession, AdapterError> {
    self.inner.create_calls.fetch_add(1, Ordering::SeqCst);
    let remaining = self.inner.fail_creates.load(Ordering::SeqCst);
    if remaining > 0 {
      self.inner.fail_creates.store(remaining - 1, Ordering::SeqCst);
      return Err(AdapterError::Transport("carrier 503".into()));
    }
    Ok(TrackingSession {
      session_id:         format!("sess-{}", input.tracking_number),
      estimated_delivery: *self.inner.eta.lock().unwrap(),
      events:             vec![],
    })
  }

  async fn get_updates(
    &self,
    session_id: &str,
  ) -> Result<Vec<CarrierEvent>, AdapterError> {
    self.inner.update_calls.fetch_add(1, Ordering::SeqCst);
    let mut scripts = self.inner.scripts.lock().unwrap();
    match scripts.get_mut(session_id) {
      Some(script) if !script.results.is_empty() => {
        let idx = script.calls.min(script.results.len() - 1);
        script.calls += 1;
        script.results[idx].clone()
      }
      _ => Ok(vec![]),
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.unwrap()
}

async fn bound_shipment(store: &SqliteStore, number: &str) -> Shipment {
  let tracking_code = code::generate(store).await.unwrap();
  store
    .create_shipment(NewShipment::new(tracking_code).with_carrier("ups", number))
    .await
    .unwrap()
}

async fn unbound_shipment(store: &SqliteStore) -> Shipment {
  let tracking_code = code::generate(store).await.unwrap();
  store.create_shipment(NewShipment::new(tracking_code)).await.unwrap()
}

fn carrier_event(
  kind: Option<CarrierEventKind>,
  description: &str,
  occurred_at: DateTime<Utc>,
) -> CarrierEvent {
  CarrierEvent {
    kind,
    description: description.to_owned(),
    location: None,
    occurred_at,
    raw: serde_json::json!({ "desc": description }),
  }
}

fn engine(
  store: SqliteStore,
  adapter: MockAdapter,
) -> SyncEngine<SqliteStore, MockAdapter> {
  SyncEngine::new(
    store,
    Some(adapter),
    RateLimiter::per_minute(10_000),
    RetryPolicy::default(),
    SyncConfig { inter_group_delay: Duration::ZERO, ..SyncConfig::default() },
  )
}

async fn fetch(store: &SqliteStore, shipment: &Shipment) -> Shipment {
  store.get_shipment(shipment.shipment_id).await.unwrap().unwrap()
}

// ─── Engine: happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_sync_creates_session_and_applies_status() {
  let store = store().await;
  let eta = Utc::now() + TimeDelta::days(3);
  let adapter = MockAdapter::default().with_eta(eta);
  let shipment = bound_shipment(&store, "1Z999").await;
  adapter.script("sess-1Z999", vec![Ok(vec![carrier_event(
    Some(CarrierEventKind::Pickup),
    "Picked up by carrier",
    Utc::now() - TimeDelta::minutes(30),
  )])]);

  let engine = engine(store.clone(), adapter.clone());
  let report = engine.sync_one(shipment.shipment_id).await.unwrap();

  assert!(report.session_created);
  assert_eq!(report.outcome.accepted, 1);
  assert_eq!(report.outcome.transitioned, Some(ShipmentStatus::InTransit));
  assert_eq!(adapter.create_calls(), 1);

  let after = fetch(&store, &shipment).await;
  assert_eq!(after.status, ShipmentStatus::InTransit);
  assert_eq!(
    after.integration.tracking_session_id.as_deref(),
    Some("sess-1Z999")
  );
  assert_eq!(after.integration.last_outcome, SyncOutcome::Success);
  assert!(after.integration.last_synced_at.is_some());
  assert_eq!(after.details.estimated_delivery, Some(eta));
}

#[tokio::test]
async fn repeated_sync_is_idempotent() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let shipment = bound_shipment(&store, "1Z100").await;
  adapter.script("sess-1Z100", vec![Ok(vec![carrier_event(
    Some(CarrierEventKind::Pickup),
    "Picked up",
    Utc::now() - TimeDelta::hours(1),
  )])]);

  let engine = engine(store.clone(), adapter.clone());
  engine.sync_one(shipment.shipment_id).await.unwrap();
  let ledger_after_first = store
    .events(shipment.shipment_id, &EventQuery::default())
    .await
    .unwrap();

  let second = engine.sync_one(shipment.shipment_id).await.unwrap();
  assert!(!second.session_created);
  assert_eq!(second.outcome.accepted, 0);
  assert_eq!(second.outcome.duplicates, 1);
  assert_eq!(second.outcome.transitioned, None);

  let ledger_after_second = store
    .events(shipment.shipment_id, &EventQuery::default())
    .await
    .unwrap();
  assert_eq!(ledger_after_first.len(), ledger_after_second.len());
  assert_eq!(adapter.create_calls(), 1);
}

#[tokio::test]
async fn out_of_order_batch_lands_on_latest_status() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let shipment = bound_shipment(&store, "1Z200").await;
  let t1 = Utc::now() - TimeDelta::hours(2);
  let t2 = Utc::now() - TimeDelta::hours(1);
  store
    .transition(
      shipment.shipment_id,
      ShipmentStatus::InTransit,
      StatusChange::new(EventSource::Manual, "dispatched")
        .at(Utc::now() - TimeDelta::hours(3)),
    )
    .await
    .unwrap();

  // Newest first on the wire; the engine must sort before applying.
  adapter.script("sess-1Z200", vec![Ok(vec![
    carrier_event(Some(CarrierEventKind::Delivered), "Delivered", t2),
    carrier_event(
      Some(CarrierEventKind::OutForDelivery),
      "Out for delivery",
      t1,
    ),
  ])]);

  let engine = engine(store.clone(), adapter);
  let report = engine.sync_one(shipment.shipment_id).await.unwrap();
  assert_eq!(report.outcome.accepted, 2);
  assert_eq!(report.outcome.transitioned, Some(ShipmentStatus::Delivered));

  let after = fetch(&store, &shipment).await;
  assert_eq!(after.status, ShipmentStatus::Delivered);
  assert_eq!(after.details.actual_delivery, Some(t2));

  // Ledger comes back newest first regardless of arrival order.
  let events = store
    .events(shipment.shipment_id, &EventQuery {
      sources: vec![EventSource::Api],
      ..EventQuery::default()
    })
    .await
    .unwrap();
  let times: Vec<_> = events.iter().map(|e| e.occurred_at).collect();
  let mut sorted = times.clone();
  sorted.sort_by(|a, b| b.cmp(a));
  assert_eq!(times, sorted);
}

// ─── Engine: illegal carrier data ────────────────────────────────────────────

#[tokio::test]
async fn illegal_carrier_transition_is_skipped_and_recorded() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let shipment = bound_shipment(&store, "1Z300").await;
  adapter.script("sess-1Z300", vec![Ok(vec![carrier_event(
    Some(CarrierEventKind::Delivered),
    "Delivered",
    Utc::now(),
  )])]);

  let engine = engine(store.clone(), adapter);
  let report = engine.sync_one(shipment.shipment_id).await.unwrap();
  assert_eq!(report.outcome.transitioned, None);
  assert_eq!(
    report.outcome.skipped,
    Some((ShipmentStatus::Pending, ShipmentStatus::Delivered))
  );

  let after = fetch(&store, &shipment).await;
  assert_eq!(after.status, ShipmentStatus::Pending);
  assert_eq!(after.integration.last_outcome, SyncOutcome::Success);

  let skips = store
    .events(shipment.shipment_id, &EventQuery {
      event_types: vec![EventType::ApiSync],
      ..EventQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(skips.len(), 1);
  assert!(matches!(
    skips[0].metadata,
    Some(EventMetadata::SkippedTransition {
      from: ShipmentStatus::Pending,
      to:   ShipmentStatus::Delivered,
    })
  ));
}

// ─── Engine: failure handling ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn adapter_exhaustion_marks_failure_and_ledger() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let shipment = bound_shipment(&store, "1Z400").await;
  adapter.script("sess-1Z400", vec![Err(AdapterError::Transport(
    "connection refused".into(),
  ))]);

  let engine = engine(store.clone(), adapter.clone());
  let err = engine.sync_one(shipment.shipment_id).await.unwrap_err();
  assert!(matches!(err, Error::Adapter { attempts: 4, .. }));
  assert_eq!(adapter.update_calls(), 4);

  let after = fetch(&store, &shipment).await;
  assert_eq!(after.integration.last_outcome, SyncOutcome::Failed);
  assert!(after.integration.needs_review);
  assert!(after.integration.last_error.is_some());
  // The session survives the failed update fetch.
  assert_eq!(
    after.integration.tracking_session_id.as_deref(),
    Some("sess-1Z400")
  );

  let exceptions = store
    .events(shipment.shipment_id, &EventQuery {
      event_types: vec![EventType::Exception],
      ..EventQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(exceptions.len(), 1);
  assert!(matches!(
    exceptions[0].metadata,
    Some(EventMetadata::SyncFailure { attempts: 4, .. })
  ));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_within_the_retry_budget() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let shipment = bound_shipment(&store, "1Z500").await;
  adapter.script("sess-1Z500", vec![
    Err(AdapterError::Transport("flake".into())),
    Err(AdapterError::Timeout(Duration::from_secs(10))),
    Ok(vec![carrier_event(
      Some(CarrierEventKind::Pickup),
      "Picked up",
      Utc::now(),
    )]),
  ]);

  let engine = engine(store.clone(), adapter.clone());
  engine.sync_one(shipment.shipment_id).await.unwrap();
  assert_eq!(adapter.update_calls(), 3);

  let after = fetch(&store, &shipment).await;
  assert_eq!(after.status, ShipmentStatus::InTransit);
  assert_eq!(after.integration.last_outcome, SyncOutcome::Success);
}

#[tokio::test]
async fn missing_carrier_binding_fails_without_adapter_calls() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let shipment = unbound_shipment(&store).await;

  let engine = engine(store.clone(), adapter.clone());
  let err = engine.sync_one(shipment.shipment_id).await.unwrap_err();
  assert!(matches!(err, Error::MissingCarrierBinding(id) if id == shipment.shipment_id));
  assert_eq!(adapter.create_calls(), 0);

  let after = fetch(&store, &shipment).await;
  assert_eq!(after.integration.last_outcome, SyncOutcome::Failed);
  assert!(after.integration.needs_review);

  // The failure leaves an audit trail: no adapter was ever called, so the
  // recorded attempt count is zero.
  let exceptions = store
    .events(shipment.shipment_id, &EventQuery {
      event_types: vec![EventType::Exception],
      ..EventQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(exceptions.len(), 1);
  assert!(matches!(
    exceptions[0].metadata,
    Some(EventMetadata::SyncFailure { attempts: 0, .. })
  ));
}

#[tokio::test]
async fn no_adapter_configured_is_reported_up_front() {
  let store = store().await;
  let engine = SyncEngine::<_, MockAdapter>::new(
    store,
    None,
    RateLimiter::per_minute(10_000),
    RetryPolicy::default(),
    SyncConfig::default(),
  );
  assert!(matches!(
    engine.sync_batch(None, false).await,
    Err(Error::AdapterUnavailable)
  ));
}

// ─── Engine: batches ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn batch_isolates_per_shipment_failures() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let good_a = bound_shipment(&store, "1Z600").await;
  let bad = bound_shipment(&store, "1Z601").await;
  let good_b = bound_shipment(&store, "1Z602").await;
  let pickup = carrier_event(
    Some(CarrierEventKind::Pickup),
    "Picked up",
    Utc::now(),
  );
  adapter.script("sess-1Z600", vec![Ok(vec![pickup.clone()])]);
  adapter.script("sess-1Z601", vec![Err(AdapterError::Transport(
    "carrier refuses this shipment".into(),
  ))]);
  adapter.script("sess-1Z602", vec![Ok(vec![pickup])]);

  let engine = engine(store.clone(), adapter);
  let report = engine
    .sync_batch(
      Some(vec![good_a.shipment_id, bad.shipment_id, good_b.shipment_id]),
      false,
    )
    .await
    .unwrap();

  assert_eq!(report.successful.len(), 2);
  assert_eq!(report.failed.len(), 1);
  assert!(!report.all_succeeded());
  assert_eq!(report.failed[0].shipment_id, bad.shipment_id);

  assert_eq!(fetch(&store, &good_a).await.status, ShipmentStatus::InTransit);
  assert_eq!(fetch(&store, &good_b).await.status, ShipmentStatus::InTransit);
  assert!(fetch(&store, &bad).await.integration.needs_review);
}

#[tokio::test]
async fn candidate_selection_respects_freshness_and_force() {
  let store = store().await;
  let adapter = MockAdapter::default();
  let stale = bound_shipment(&store, "1Z700").await;
  let fresh = bound_shipment(&store, "1Z701").await;
  for s in [&stale, &fresh] {
    store
      .transition(
        s.shipment_id,
        ShipmentStatus::InTransit,
        StatusChange::new(EventSource::Manual, "dispatched"),
      )
      .await
      .unwrap();
    store
      .set_tracking_session(s.shipment_id, format!("sess-{}", s.shipment_id))
      .await
      .unwrap();
  }
  store
    .mark_sync_success(stale.shipment_id, Utc::now() - TimeDelta::hours(2))
    .await
    .unwrap();
  store.mark_sync_success(fresh.shipment_id, Utc::now()).await.unwrap();

  let engine = engine(store.clone(), adapter);
  let due: Vec<_> = engine
    .select_candidates(false)
    .await
    .unwrap()
    .into_iter()
    .map(|s| s.shipment_id)
    .collect();
  assert_eq!(due, vec![stale.shipment_id]);

  let forced: Vec<_> = engine
    .select_candidates(true)
    .await
    .unwrap()
    .into_iter()
    .map(|s| s.shipment_id)
    .collect();
  assert!(forced.contains(&stale.shipment_id));
  assert!(forced.contains(&fresh.shipment_id));
}

// ─── Ingest: source uniformity ───────────────────────────────────────────────

#[tokio::test]
async fn webhook_and_api_events_dedup_per_source() {
  let store = store().await;
  let shipment = unbound_shipment(&store).await;
  let at = Utc::now() - TimeDelta::minutes(5);
  let batch = vec![carrier_event(None, "Arrived at facility", at)];

  let first = ingest::ingest_carrier_events(
    &store,
    &shipment,
    batch.clone(),
    EventSource::Webhook,
    "mockcarrier",
  )
  .await
  .unwrap();
  assert_eq!(first.accepted, 1);

  let replay = ingest::ingest_carrier_events(
    &store,
    &shipment,
    batch.clone(),
    EventSource::Webhook,
    "mockcarrier",
  )
  .await
  .unwrap();
  assert_eq!(replay.accepted, 0);
  assert_eq!(replay.duplicates, 1);

  // Identity includes the source tag, so the same timestamp from the
  // polled path is a distinct entry.
  let polled = ingest::ingest_carrier_events(
    &store,
    &shipment,
    batch,
    EventSource::Api,
    "mockcarrier",
  )
  .await
  .unwrap();
  assert_eq!(polled.accepted, 1);
}

// ─── Conflict detection ──────────────────────────────────────────────────────

#[tokio::test]
async fn manual_change_against_recent_carrier_data_is_annotated() {
  let store = store().await;
  let shipment = unbound_shipment(&store).await;
  // Backdate the walk so it stays out of the rapid-change window.
  store
    .transition(
      shipment.shipment_id,
      ShipmentStatus::InTransit,
      StatusChange::new(EventSource::Manual, "dispatched")
        .at(Utc::now() - TimeDelta::hours(1)),
    )
    .await
    .unwrap();
  let carrier = store
    .ingest_event(
      NewEvent::new(
        shipment.shipment_id,
        EventType::LocationUpdate,
        EventSource::Api,
        "Out for delivery",
      )
      .with_status(ShipmentStatus::OutForDelivery)
      .at(Utc::now() - TimeDelta::minutes(2)),
    )
    .await
    .unwrap()
    .unwrap();

  let shipment = fetch(&store, &shipment).await;
  let report = ConflictDetector::default()
    .manual_transition(
      &store,
      &shipment,
      ShipmentStatus::Exception,
      "admin-7",
      "customer reported damage",
    )
    .await
    .unwrap();

  assert_eq!(report.change.status, Some(ShipmentStatus::Exception));
  assert_eq!(report.annotations.len(), 1);
  match &report.annotations[0].metadata {
    Some(EventMetadata::ApiManualConflict {
      manual_status,
      api_status,
      conflicting_event_id,
      admin_override,
      ..
    }) => {
      assert_eq!(*manual_status, ShipmentStatus::Exception);
      assert_eq!(*api_status, ShipmentStatus::OutForDelivery);
      assert_eq!(*conflicting_event_id, carrier.event_id);
      assert!(admin_override);
    }
    other => panic!("expected conflict annotation, got {other:?}"),
  }

  assert_eq!(fetch(&store, &shipment).await.status, ShipmentStatus::Exception);
}

#[tokio::test]
async fn override_annotations_do_not_inflate_the_rapid_count() {
  let store = store().await;
  let shipment = unbound_shipment(&store).await;
  store
    .transition(
      shipment.shipment_id,
      ShipmentStatus::InTransit,
      StatusChange::new(EventSource::Manual, "dispatched")
        .at(Utc::now() - TimeDelta::hours(1)),
    )
    .await
    .unwrap();
  store
    .ingest_event(
      NewEvent::new(
        shipment.shipment_id,
        EventType::LocationUpdate,
        EventSource::Api,
        "Out for delivery",
      )
      .with_status(ShipmentStatus::OutForDelivery)
      .at(Utc::now() - TimeDelta::minutes(2)),
    )
    .await
    .unwrap()
    .unwrap();

  // First change disagrees with the carrier and leaves an override
  // annotation in the ledger.
  let detector = ConflictDetector::default();
  let shipment = fetch(&store, &shipment).await;
  detector
    .manual_transition(
      &store,
      &shipment,
      ShipmentStatus::Exception,
      "admin-7",
      "customer reported damage",
    )
    .await
    .unwrap();

  // Second change in the same window: two real changes, not three — the
  // annotation row records no actual change.
  let shipment = fetch(&store, &shipment).await;
  let report = detector
    .manual_transition(
      &store,
      &shipment,
      ShipmentStatus::InTransit,
      "admin-7",
      "damage cleared, back on the road",
    )
    .await
    .unwrap();

  let rapid = report
    .annotations
    .iter()
    .find_map(|e| match &e.metadata {
      Some(EventMetadata::RapidStatusChanges { count, recent, .. }) => {
        Some((*count, recent.clone()))
      }
      _ => None,
    })
    .unwrap();
  assert_eq!(rapid.0, 2);
  assert_eq!(rapid.1.len(), 2);
  assert_eq!(rapid.1[0].status, ShipmentStatus::Exception);
  assert_eq!(rapid.1[1].status, ShipmentStatus::InTransit);
}

#[tokio::test]
async fn rapid_manual_changes_are_flagged() {
  let store = store().await;
  let shipment = unbound_shipment(&store).await;
  store
    .transition(
      shipment.shipment_id,
      ShipmentStatus::InTransit,
      StatusChange::new(EventSource::Manual, "dispatched")
        .at(Utc::now() - TimeDelta::seconds(60)),
    )
    .await
    .unwrap();

  let shipment = fetch(&store, &shipment).await;
  let report = ConflictDetector::default()
    .manual_transition(
      &store,
      &shipment,
      ShipmentStatus::OutForDelivery,
      "admin-7",
      "driver assigned",
    )
    .await
    .unwrap();

  assert_eq!(report.annotations.len(), 1);
  match &report.annotations[0].metadata {
    Some(EventMetadata::RapidStatusChanges { count, recent, .. }) => {
      assert_eq!(*count, 2);
      assert_eq!(recent.len(), 2);
      assert!(recent[0].occurred_at <= recent[1].occurred_at);
      assert_eq!(recent[1].status, ShipmentStatus::OutForDelivery);
    }
    other => panic!("expected rapid-change annotation, got {other:?}"),
  }
}

#[tokio::test]
async fn clean_manual_change_produces_no_annotations() {
  let store = store().await;
  let shipment = unbound_shipment(&store).await;
  store
    .transition(
      shipment.shipment_id,
      ShipmentStatus::InTransit,
      StatusChange::new(EventSource::Manual, "dispatched")
        .at(Utc::now() - TimeDelta::hours(1)),
    )
    .await
    .unwrap();

  let shipment = fetch(&store, &shipment).await;
  let report = ConflictDetector::default()
    .manual_transition(
      &store,
      &shipment,
      ShipmentStatus::Delivered,
      "admin-7",
      "hand-delivered at counter",
    )
    .await
    .unwrap();

  assert!(report.annotations.is_empty());
  assert_eq!(fetch(&store, &shipment).await.status, ShipmentStatus::Delivered);
}

#[tokio::test]
async fn illegal_manual_change_writes_nothing() {
  let store = store().await;
  let shipment = unbound_shipment(&store).await;

  let err = ConflictDetector::default()
    .manual_transition(
      &store,
      &shipment,
      ShipmentStatus::Delivered,
      "admin-7",
      "impossible jump",
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    shiptrack_core::Error::InvalidTransition {
      from: ShipmentStatus::Pending,
      to:   ShipmentStatus::Delivered,
    }
  ));

  let events = store
    .events(shipment.shipment_id, &EventQuery::default())
    .await
    .unwrap();
  assert_eq!(events.len(), 1); // only the creation event
}
