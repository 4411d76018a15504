//! [`SqliteStore`] — the SQLite implementation of [`ShipmentStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use shiptrack_core::{
  code::TrackingCode,
  event::{EventQuery, EventSource, EventType, NewEvent, ShipmentEvent},
  shipment::{NewShipment, Shipment, ShipmentDetails},
  status::{ShipmentStatus, can_transition},
  store::{ShipmentStore, StatusChange},
};

use crate::{
  Error, Result,
  encode::{
    EVENT_COLS, RawEvent, RawShipment, SHIPMENT_COLS, decode_dt,
    decode_status, encode_details, encode_dt, encode_metadata, encode_uuid,
  },
  schema::SCHEMA,
};

/// Deterministic ledger ordering: event time, then acceptance time, then
/// insertion order.
const EVENT_ORDER: &str = "occurred_at DESC, recorded_at DESC, rowid DESC";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A shiptrack store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread. Database errors inside `f` surface
  /// as [`Error`]; domain errors pass through untouched.
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// A fully-encoded `shipment_events` row, ready to insert.
struct EventRow {
  event_id:    String,
  shipment_id: String,
  event_type:  &'static str,
  status:      Option<&'static str>,
  description: String,
  location:    Option<String>,
  source:      &'static str,
  source_id:   Option<String>,
  occurred_at: String,
  recorded_at: String,
  metadata:    Option<String>,
}

impl EventRow {
  fn encode(event: &ShipmentEvent) -> Result<Self> {
    Ok(Self {
      event_id:    encode_uuid(event.event_id),
      shipment_id: encode_uuid(event.shipment_id),
      event_type:  event.event_type.as_str(),
      status:      event.status.map(ShipmentStatus::as_str),
      description: event.description.clone(),
      location:    event.location.clone(),
      source:      event.source.as_str(),
      source_id:   event.source_id.clone(),
      occurred_at: encode_dt(event.occurred_at),
      recorded_at: encode_dt(event.recorded_at),
      metadata:    event
        .metadata
        .as_ref()
        .map(encode_metadata)
        .transpose()?,
    })
  }

  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO shipment_events (
         event_id, shipment_id, event_type, status, description, location,
         source, source_id, occurred_at, recorded_at, metadata
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
      rusqlite::params![
        self.event_id,
        self.shipment_id,
        self.event_type,
        self.status,
        self.description,
        self.location,
        self.source,
        self.source_id,
        self.occurred_at,
        self.recorded_at,
        self.metadata,
      ],
    )?;
    Ok(())
  }
}

/// Build the persisted form of a [`NewEvent`], assigning id and
/// `recorded_at`.
fn materialize_event(input: NewEvent, now: DateTime<Utc>) -> ShipmentEvent {
  ShipmentEvent {
    event_id:    Uuid::new_v4(),
    shipment_id: input.shipment_id,
    event_type:  input.event_type,
    status:      input.status,
    description: input.description,
    location:    input.location,
    source:      input.source,
    source_id:   input.source_id,
    occurred_at: input.occurred_at.unwrap_or(now),
    recorded_at: now,
    metadata:    input.metadata,
  }
}

/// Read the persisted status of a shipment, or `None` if it does not exist.
fn current_status(
  conn: &rusqlite::Connection,
  shipment_id: &str,
) -> Result<Option<ShipmentStatus>> {
  let raw: Option<String> = conn
    .query_row(
      "SELECT status FROM shipments WHERE shipment_id = ?1",
      rusqlite::params![shipment_id],
      |r| r.get(0),
    )
    .optional()?;
  raw.as_deref().map(decode_status).transpose()
}

fn require_shipment(
  conn: &rusqlite::Connection,
  shipment_id: Uuid,
) -> Result<ShipmentStatus> {
  current_status(conn, &encode_uuid(shipment_id))?
    .ok_or(Error::ShipmentNotFound(shipment_id))
}

/// Append filter conditions for an [`EventQuery`]. Discriminant lists are
/// embedded directly — they come from `as_str()`, never from user input.
fn event_query_sql(query: &EventQuery) -> (String, Vec<String>) {
  let mut conds = vec!["shipment_id = ?1".to_owned()];
  let mut params = Vec::new();

  if !query.event_types.is_empty() {
    let list = query
      .event_types
      .iter()
      .map(|t| format!("'{}'", t.as_str()))
      .collect::<Vec<_>>()
      .join(", ");
    conds.push(format!("event_type IN ({list})"));
  }
  if !query.sources.is_empty() {
    let list = query
      .sources
      .iter()
      .map(|s| format!("'{}'", s.as_str()))
      .collect::<Vec<_>>()
      .join(", ");
    conds.push(format!("source IN ({list})"));
  }
  if let Some(after) = query.occurred_after {
    params.push(encode_dt(after));
    conds.push(format!("occurred_at >= ?{}", params.len() + 1));
  }
  if let Some(before) = query.occurred_before {
    params.push(encode_dt(before));
    conds.push(format!("occurred_at <= ?{}", params.len() + 1));
  }

  (conds.join(" AND "), params)
}

// ─── ShipmentStore impl ──────────────────────────────────────────────────────

impl ShipmentStore for SqliteStore {
  // ── Shipments ──────────────────────────────────────────────────────────

  async fn create_shipment(
    &self,
    input: NewShipment,
  ) -> shiptrack_core::Result<Shipment> {
    let now = Utc::now();
    let shipment = Shipment {
      shipment_id:   Uuid::new_v4(),
      tracking_code: input.tracking_code,
      created_at:    now,
      status:        ShipmentStatus::Pending,
      carrier:       input.carrier,
      carrier_tracking_number: input.carrier_tracking_number,
      integration:   Default::default(),
      details:       input.details,
    };

    let creation_event = materialize_event(
      NewEvent {
        shipment_id: shipment.shipment_id,
        event_type:  EventType::ShipmentCreated,
        status:      Some(ShipmentStatus::Pending),
        description: "shipment created".to_owned(),
        location:    None,
        source:      EventSource::Manual,
        source_id:   input.created_by,
        occurred_at: Some(now),
        metadata:    None,
      },
      now,
    );

    let id_str       = encode_uuid(shipment.shipment_id);
    let code_str     = shipment.tracking_code.as_str().to_owned();
    let created_str  = encode_dt(now);
    let carrier      = shipment.carrier.clone();
    let number       = shipment.carrier_tracking_number.clone();
    let details_str  = encode_details(&shipment.details)?;
    let event_row    = EventRow::encode(&creation_event)?;

    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;

        let taken: bool = tx
          .query_row(
            "SELECT 1 FROM shipments WHERE tracking_code = ?1",
            rusqlite::params![code_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Err(Error::DuplicateTrackingCode(code_str));
        }

        tx.execute(
          "INSERT INTO shipments (
             shipment_id, tracking_code, created_at, status,
             carrier, carrier_tracking_number, details
           ) VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            code_str,
            created_str,
            carrier,
            number,
            details_str,
          ],
        )?;
        event_row.insert(&tx)?;

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(shipment)
  }

  async fn get_shipment(
    &self,
    id: Uuid,
  ) -> shiptrack_core::Result<Option<Shipment>> {
    let id_str = encode_uuid(id);
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SHIPMENT_COLS} FROM shipments WHERE shipment_id = ?1"
              ),
              rusqlite::params![id_str],
              RawShipment::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw.map(RawShipment::into_shipment).transpose()?)
  }

  async fn get_by_tracking_code(
    &self,
    code: &TrackingCode,
  ) -> shiptrack_core::Result<Option<Shipment>> {
    let code_str = code.as_str().to_owned();
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SHIPMENT_COLS} FROM shipments \
                 WHERE tracking_code = ?1"
              ),
              rusqlite::params![code_str],
              RawShipment::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw.map(RawShipment::into_shipment).transpose()?)
  }

  async fn get_by_tracking_session(
    &self,
    session_id: &str,
  ) -> shiptrack_core::Result<Option<Shipment>> {
    let session = session_id.to_owned();
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SHIPMENT_COLS} FROM shipments \
                 WHERE tracking_session_id = ?1"
              ),
              rusqlite::params![session],
              RawShipment::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw.map(RawShipment::into_shipment).transpose()?)
  }

  async fn list_shipments(
    &self,
    status: Option<ShipmentStatus>,
    limit: usize,
    offset: usize,
  ) -> shiptrack_core::Result<Vec<Shipment>> {
    let status_str = status.map(ShipmentStatus::as_str);
    let raws = self
      .with_conn(move |conn| {
        let sql = match status_str {
          Some(s) => format!(
            "SELECT {SHIPMENT_COLS} FROM shipments WHERE status = '{s}' \
             ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
          ),
          None => format!(
            "SELECT {SHIPMENT_COLS} FROM shipments \
             ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
          ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![limit as i64, offset as i64],
            RawShipment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(
      raws
        .into_iter()
        .map(RawShipment::into_shipment)
        .collect::<Result<_>>()?,
    )
  }

  async fn tracking_code_exists(
    &self,
    code: &TrackingCode,
  ) -> shiptrack_core::Result<bool> {
    let code_str = code.as_str().to_owned();
    Ok(
      self
        .with_conn(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT 1 FROM shipments WHERE tracking_code = ?1",
                rusqlite::params![code_str],
                |_| Ok(true),
              )
              .optional()?
              .unwrap_or(false),
          )
        })
        .await?,
    )
  }

  async fn reassign_carrier(
    &self,
    id: Uuid,
    carrier: String,
    tracking_number: String,
  ) -> shiptrack_core::Result<()> {
    let id_str = encode_uuid(id);
    self
      .with_conn(move |conn| {
        let changed = conn.execute(
          "UPDATE shipments \
           SET carrier = ?2, carrier_tracking_number = ?3, \
               tracking_session_id = NULL \
           WHERE shipment_id = ?1",
          rusqlite::params![id_str, carrier, tracking_number],
        )?;
        if changed == 0 {
          return Err(Error::ShipmentNotFound(id));
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn purge_shipment(&self, id: Uuid) -> shiptrack_core::Result<u64> {
    let id_str = encode_uuid(id);
    let removed = self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        require_shipment(&tx, id)?;
        let events = tx.execute(
          "DELETE FROM shipment_events WHERE shipment_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM shipments WHERE shipment_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(events as u64)
      })
      .await?;
    Ok(removed)
  }

  // ── Status state machine ───────────────────────────────────────────────

  async fn transition(
    &self,
    id: Uuid,
    to: ShipmentStatus,
    change: StatusChange,
  ) -> shiptrack_core::Result<ShipmentEvent> {
    let now = Utc::now();
    let event = materialize_event(
      NewEvent {
        shipment_id: id,
        event_type:  EventType::StatusChange,
        status:      Some(to),
        description: change.description,
        location:    change.location,
        source:      change.source,
        source_id:   change.source_id,
        occurred_at: change.occurred_at,
        metadata:    change.metadata,
      },
      now,
    );

    let id_str    = encode_uuid(id);
    let to_str    = to.as_str();
    let occurred  = event.occurred_at;
    let event_row = EventRow::encode(&event)?;

    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;

        // The legality check runs against the persisted status, inside the
        // same transaction as the ledger write and the projection update.
        let from = require_shipment(&tx, id)?;
        if !can_transition(from, to) {
          return Err(Error::InvalidTransition { from, to });
        }

        event_row.insert(&tx)?;
        tx.execute(
          "UPDATE shipments SET status = ?2 WHERE shipment_id = ?1",
          rusqlite::params![id_str, to_str],
        )?;

        if to == ShipmentStatus::Delivered {
          let details_str: String = tx.query_row(
            "SELECT details FROM shipments WHERE shipment_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )?;
          let mut details = crate::encode::decode_details(&details_str)?;
          details.actual_delivery = Some(occurred);
          tx.execute(
            "UPDATE shipments SET details = ?2 WHERE shipment_id = ?1",
            rusqlite::params![id_str, encode_details(&details)?],
          )?;
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(event)
  }

  // ── Event ledger ───────────────────────────────────────────────────────

  async fn record_event(
    &self,
    input: NewEvent,
  ) -> shiptrack_core::Result<ShipmentEvent> {
    let shipment_id = input.shipment_id;
    let event = materialize_event(input, Utc::now());
    let event_row = EventRow::encode(&event)?;

    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        require_shipment(&tx, shipment_id)?;
        event_row.insert(&tx)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(event)
  }

  async fn ingest_event(
    &self,
    input: NewEvent,
  ) -> shiptrack_core::Result<Option<ShipmentEvent>> {
    let shipment_id = input.shipment_id;
    let source = input.source;
    let event = materialize_event(input, Utc::now());
    let event_row = EventRow::encode(&event)?;
    let occurred_str = encode_dt(event.occurred_at);
    let id_str = encode_uuid(shipment_id);

    let inserted = self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        require_shipment(&tx, shipment_id)?;

        if source.is_carrier() {
          let exists: bool = tx
            .query_row(
              "SELECT 1 FROM shipment_events \
               WHERE shipment_id = ?1 AND source = ?2 AND occurred_at = ?3",
              rusqlite::params![id_str, source.as_str(), occurred_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if exists {
            return Ok(false);
          }
        }

        event_row.insert(&tx)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(inserted.then_some(event))
  }

  async fn events(
    &self,
    shipment_id: Uuid,
    query: &EventQuery,
  ) -> shiptrack_core::Result<Vec<ShipmentEvent>> {
    let id_str = encode_uuid(shipment_id);
    let (where_clause, date_params) = event_query_sql(query);
    let limit  = query.limit.unwrap_or(100) as i64;
    let offset = query.offset.unwrap_or(0) as i64;

    let raws = self
      .with_conn(move |conn| {
        let n = date_params.len();
        let sql = format!(
          "SELECT {EVENT_COLS} FROM shipment_events \
           WHERE {where_clause} \
           ORDER BY {EVENT_ORDER} \
           LIMIT ?{} OFFSET ?{}",
          n + 2,
          n + 3,
        );

        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
          vec![Box::new(id_str)];
        for p in date_params {
          params.push(Box::new(p));
        }
        params.push(Box::new(limit));
        params.push(Box::new(offset));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            RawEvent::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawEvent::into_event)
        .collect::<Result<_>>()?,
    )
  }

  async fn latest_event(
    &self,
    shipment_id: Uuid,
  ) -> shiptrack_core::Result<Option<ShipmentEvent>> {
    let id_str = encode_uuid(shipment_id);
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {EVENT_COLS} FROM shipment_events \
                 WHERE shipment_id = ?1 ORDER BY {EVENT_ORDER} LIMIT 1"
              ),
              rusqlite::params![id_str],
              RawEvent::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw.map(RawEvent::into_event).transpose()?)
  }

  async fn latest_status_event(
    &self,
    shipment_id: Uuid,
  ) -> shiptrack_core::Result<Option<ShipmentEvent>> {
    let id_str = encode_uuid(shipment_id);
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {EVENT_COLS} FROM shipment_events \
                 WHERE shipment_id = ?1 \
                   AND event_type IN ('status_change', 'shipment_created') \
                 ORDER BY {EVENT_ORDER} LIMIT 1"
              ),
              rusqlite::params![id_str],
              RawEvent::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw.map(RawEvent::into_event).transpose()?)
  }

  async fn existing_ingest_keys(
    &self,
    shipment_id: Uuid,
    source: EventSource,
  ) -> shiptrack_core::Result<Vec<DateTime<Utc>>> {
    let id_str = encode_uuid(shipment_id);
    let source_str = source.as_str();
    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT occurred_at FROM shipment_events \
           WHERE shipment_id = ?1 AND source = ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, source_str], |r| {
            r.get::<_, String>(0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(
      raws
        .iter()
        .map(|s| decode_dt(s))
        .collect::<Result<_>>()?,
    )
  }

  // ── Sync bookkeeping ───────────────────────────────────────────────────

  async fn list_sync_candidates(
    &self,
    synced_before: DateTime<Utc>,
    limit: usize,
  ) -> shiptrack_core::Result<Vec<Shipment>> {
    let cutoff = encode_dt(synced_before);
    let raws = self
      .with_conn(move |conn| {
        // Never-synced shipments sort first, then stalest.
        let mut stmt = conn.prepare(&format!(
          "SELECT {SHIPMENT_COLS} FROM shipments \
           WHERE status IN ('pending', 'in-transit', 'out-for-delivery') \
             AND tracking_session_id IS NOT NULL \
             AND (last_synced_at IS NULL OR last_synced_at < ?1) \
           ORDER BY last_synced_at IS NOT NULL, last_synced_at ASC \
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![cutoff, limit as i64],
            RawShipment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(
      raws
        .into_iter()
        .map(RawShipment::into_shipment)
        .collect::<Result<_>>()?,
    )
  }

  async fn set_tracking_session(
    &self,
    id: Uuid,
    session_id: String,
  ) -> shiptrack_core::Result<()> {
    self
      .update_shipment_row(
        id,
        "tracking_session_id = ?2",
        vec![Box::new(session_id)],
      )
      .await
  }

  async fn mark_sync_success(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> shiptrack_core::Result<()> {
    self
      .update_shipment_row(
        id,
        "last_synced_at = ?2, last_outcome = 'success', last_error = NULL",
        vec![Box::new(encode_dt(at))],
      )
      .await
  }

  async fn mark_sync_failure(
    &self,
    id: Uuid,
    error: String,
  ) -> shiptrack_core::Result<()> {
    self
      .update_shipment_row(
        id,
        "last_outcome = 'failed', last_error = ?2, needs_review = 1",
        vec![Box::new(error)],
      )
      .await
  }

  async fn clear_needs_review(&self, id: Uuid) -> shiptrack_core::Result<()> {
    self
      .update_shipment_row(id, "needs_review = 0", Vec::new())
      .await
  }

  async fn update_details(
    &self,
    id: Uuid,
    details: ShipmentDetails,
  ) -> shiptrack_core::Result<()> {
    let encoded = encode_details(&details)?;
    self
      .update_shipment_row(id, "details = ?2", vec![Box::new(encoded)])
      .await
  }
}

impl SqliteStore {
  /// Shared `UPDATE shipments SET ... WHERE shipment_id = ?1` plumbing.
  /// `set_clause` is a compile-time string from this module, never input.
  async fn update_shipment_row(
    &self,
    id: Uuid,
    set_clause: &'static str,
    extra: Vec<Box<dyn rusqlite::ToSql + Send>>,
  ) -> shiptrack_core::Result<()> {
    let id_str = encode_uuid(id);
    self
      .with_conn(move |conn| {
        let sql = format!(
          "UPDATE shipments SET {set_clause} WHERE shipment_id = ?1"
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql + Send>> =
          vec![Box::new(id_str)];
        params.extend(extra);
        let changed = conn.execute(
          &sql,
          rusqlite::params_from_iter(
            params.iter().map(|p| p.as_ref() as &dyn rusqlite::ToSql),
          ),
        )?;
        if changed == 0 {
          return Err(Error::ShipmentNotFound(id));
        }
        Ok(())
      })
      .await?;
    Ok(())
  }
}
