//! The sync engine: drives carrier adapters, ingests their events, and
//! keeps per-shipment integration bookkeeping.
//!
//! One engine instance is shared across a batch. Per-shipment failures are
//! isolated — a carrier flaking on one shipment never stops its siblings —
//! but storage failures abort the whole batch, since the ledger itself can
//! no longer be trusted.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use shiptrack_core::{
  Error as CoreError,
  event::{EventMetadata, EventSource, EventType, NewEvent},
  shipment::Shipment,
  store::ShipmentStore,
};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::{
  Error, Result,
  adapter::{CarrierAdapter, CreateTrackingInput},
  ingest::{self, IngestOutcome},
  ratelimit::RateLimiter,
  retry::RetryPolicy,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyncConfig {
  /// Shipments synced at the same time within a batch.
  pub max_concurrency:   usize,
  /// Pause between concurrency groups.
  pub inter_group_delay: Duration,
  /// Shipments synced within this window are skipped unless forced.
  pub freshness:         Duration,
  /// Hard cap on candidates pulled from the store per batch.
  pub batch_ceiling:     usize,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_concurrency:   5,
      inter_group_delay: Duration::from_secs(1),
      freshness:         Duration::from_secs(60 * 60),
      batch_ceiling:     500,
    }
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// What syncing one shipment did.
#[derive(Debug, Clone)]
pub struct SyncReport {
  pub shipment_id:     Uuid,
  /// A tracking session was created on this pass.
  pub session_created: bool,
  pub outcome:         IngestOutcome,
}

#[derive(Debug, Clone)]
pub struct FailedSync {
  pub shipment_id: Uuid,
  pub error:       String,
}

/// Aggregate result of a batch run.
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
  pub successful: Vec<SyncReport>,
  pub failed:     Vec<FailedSync>,
}

impl BatchReport {
  pub fn all_succeeded(&self) -> bool { self.failed.is_empty() }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct SyncEngine<S, A> {
  store:   S,
  adapter: Option<Arc<A>>,
  limiter: Arc<RateLimiter>,
  retry:   RetryPolicy,
  config:  SyncConfig,
}

// Manual impl: `Arc<A>` is always cloneable, the derive would require
// `A: Clone`.
impl<S: Clone, A> Clone for SyncEngine<S, A> {
  fn clone(&self) -> Self {
    Self {
      store:   self.store.clone(),
      adapter: self.adapter.clone(),
      limiter: Arc::clone(&self.limiter),
      retry:   self.retry,
      config:  self.config.clone(),
    }
  }
}

impl<S, A> SyncEngine<S, A>
where
  S: ShipmentStore + Clone + 'static,
  A: CarrierAdapter + 'static,
{
  pub fn new(
    store: S,
    adapter: Option<A>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    config: SyncConfig,
  ) -> Self {
    Self {
      store,
      adapter: adapter.map(Arc::new),
      limiter: Arc::new(limiter),
      retry,
      config,
    }
  }

  /// Shipments due for a sync pass: active status, has a tracking session,
  /// not synced within the freshness window. `force` ignores freshness.
  pub async fn select_candidates(&self, force: bool) -> Result<Vec<Shipment>> {
    let now = Utc::now();
    let cutoff = if force {
      now
    } else {
      now - chrono::Duration::seconds(self.config.freshness.as_secs() as i64)
    };
    Ok(
      self
        .store
        .list_sync_candidates(cutoff, self.config.batch_ceiling)
        .await?,
    )
  }

  /// Sync a single shipment end to end.
  pub async fn sync_one(&self, shipment_id: Uuid) -> Result<SyncReport> {
    let adapter =
      self.adapter.as_ref().cloned().ok_or(Error::AdapterUnavailable)?;
    let shipment = self
      .store
      .get_shipment(shipment_id)
      .await?
      .ok_or(CoreError::ShipmentNotFound(shipment_id))?;
    let provider = adapter.provider_name().to_owned();

    let (session_id, session_created) =
      match shipment.integration.tracking_session_id.clone() {
        Some(id) => (id, false),
        None => {
          let id =
            self.establish_session(&shipment, &adapter, &provider).await?;
          (id, true)
        }
      };

    let updates = {
      let call = self
        .retry
        .run(|| {
          let adapter = Arc::clone(&adapter);
          let limiter = Arc::clone(&self.limiter);
          let session_id = session_id.clone();
          async move {
            limiter.acquire().await;
            adapter.get_updates(&session_id).await
          }
        })
        .await;
      match call {
        Ok(updates) => updates,
        Err(exhausted) => {
          return Err(
            self
              .record_adapter_failure(
                shipment.shipment_id,
                &provider,
                exhausted,
              )
              .await?,
          );
        }
      }
    };

    let outcome = ingest::ingest_carrier_events(
      &self.store,
      &shipment,
      updates,
      EventSource::Api,
      &provider,
    )
    .await?;

    self.store.mark_sync_success(shipment.shipment_id, Utc::now()).await?;
    tracing::info!(
      shipment_id = %shipment.shipment_id,
      accepted = outcome.accepted,
      duplicates = outcome.duplicates,
      transitioned = ?outcome.transitioned,
      "sync complete"
    );

    Ok(SyncReport { shipment_id: shipment.shipment_id, session_created, outcome })
  }

  /// Sync `ids` (or the due candidates when `ids` is `None`) in bounded
  /// concurrency groups.
  pub async fn sync_batch(
    &self,
    ids: Option<Vec<Uuid>>,
    force: bool,
  ) -> Result<BatchReport> {
    if self.adapter.is_none() {
      return Err(Error::AdapterUnavailable);
    }

    let targets = match ids {
      Some(ids) => ids,
      None => self
        .select_candidates(force)
        .await?
        .into_iter()
        .map(|s| s.shipment_id)
        .collect(),
    };

    tracing::info!(count = targets.len(), "starting sync batch");
    let mut report = BatchReport::default();

    for (group_idx, group) in
      targets.chunks(self.config.max_concurrency.max(1)).enumerate()
    {
      if group_idx > 0 {
        tokio::time::sleep(self.config.inter_group_delay).await;
      }

      let mut tasks = JoinSet::new();
      for &shipment_id in group {
        let engine = self.clone();
        tasks
          .spawn(async move { (shipment_id, engine.sync_one(shipment_id).await) });
      }

      while let Some(joined) = tasks.join_next().await {
        let (shipment_id, result) = joined?;
        match result {
          Ok(sync) => report.successful.push(sync),
          Err(e) if e.is_fatal() => {
            tracing::error!(%shipment_id, error = %e, "aborting batch");
            return Err(e);
          }
          Err(e) => {
            tracing::warn!(%shipment_id, error = %e, "shipment sync failed");
            report
              .failed
              .push(FailedSync { shipment_id, error: e.to_string() });
          }
        }
      }
    }

    tracing::info!(
      succeeded = report.successful.len(),
      failed = report.failed.len(),
      "sync batch finished"
    );
    Ok(report)
  }

  /// Create a carrier tracking session for a shipment that has none.
  async fn establish_session(
    &self,
    shipment: &Shipment,
    adapter: &Arc<A>,
    provider: &str,
  ) -> Result<String> {
    let (carrier, tracking_number) = match (
      shipment.carrier.clone(),
      shipment.carrier_tracking_number.clone(),
    ) {
      (Some(c), Some(n)) => (c, n),
      _ => {
        let err = Error::MissingCarrierBinding(shipment.shipment_id);
        self
          .record_sync_failure(shipment.shipment_id, provider, 0, &err)
          .await?;
        return Err(err);
      }
    };

    let input = CreateTrackingInput {
      carrier,
      tracking_number,
      destination: shipment.details.destination.clone(),
      package: shipment.details.package.clone(),
    };

    let session = self
      .retry
      .run(|| {
        let adapter = Arc::clone(adapter);
        let limiter = Arc::clone(&self.limiter);
        let input = input.clone();
        async move {
          limiter.acquire().await;
          adapter.create_tracking(input).await
        }
      })
      .await;
    let session = match session {
      Ok(session) => session,
      Err(exhausted) => {
        return Err(
          self
            .record_adapter_failure(shipment.shipment_id, provider, exhausted)
            .await?,
        );
      }
    };

    self
      .store
      .set_tracking_session(shipment.shipment_id, session.session_id.clone())
      .await?;
    if let Some(eta) = session.estimated_delivery {
      let mut details = shipment.details.clone();
      details.estimated_delivery = Some(eta);
      self.store.update_details(shipment.shipment_id, details).await?;
    }
    tracing::info!(
      shipment_id = %shipment.shipment_id,
      session_id = %session.session_id,
      "tracking session created"
    );

    Ok(session.session_id)
  }

  /// Record an exhausted adapter call in both the integration state and the
  /// ledger, then hand back the error to return.
  async fn record_adapter_failure(
    &self,
    shipment_id: Uuid,
    provider: &str,
    exhausted: crate::retry::RetryExhausted<crate::adapter::AdapterError>,
  ) -> Result<Error> {
    let error = Error::Adapter {
      attempts: exhausted.attempts,
      source:   exhausted.last,
    };
    self
      .record_sync_failure(shipment_id, provider, exhausted.attempts, &error)
      .await?;
    Ok(error)
  }

  /// Mark the integration state failed and append the matching
  /// `exception`-type ledger event, so every failed pass leaves an audit
  /// trail.
  async fn record_sync_failure(
    &self,
    shipment_id: Uuid,
    provider: &str,
    attempts: u32,
    error: &Error,
  ) -> Result<()> {
    self.store.mark_sync_failure(shipment_id, error.to_string()).await?;
    self
      .store
      .record_event(
        NewEvent::new(
          shipment_id,
          EventType::Exception,
          EventSource::Api,
          "carrier sync failed",
        )
        .with_source_id(provider)
        .with_metadata(EventMetadata::SyncFailure {
          attempts,
          error: error.to_string(),
        }),
      )
      .await?;
    Ok(())
  }
}
