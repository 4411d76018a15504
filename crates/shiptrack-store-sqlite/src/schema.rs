//! SQL schema for the shiptrack SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS shipments (
    shipment_id             TEXT PRIMARY KEY,
    tracking_code           TEXT NOT NULL UNIQUE,
    created_at              TEXT NOT NULL,    -- ISO 8601 UTC
    status                  TEXT NOT NULL,    -- kebab-case ShipmentStatus
    carrier                 TEXT,
    carrier_tracking_number TEXT,
    -- integration state; written only by sync bookkeeping
    last_synced_at          TEXT,             -- last *successful* sync
    last_outcome            TEXT NOT NULL DEFAULT 'pending',
    last_error              TEXT,
    tracking_session_id     TEXT,
    needs_review            INTEGER NOT NULL DEFAULT 0,
    -- denormalised display fields; JSON ShipmentDetails
    details                 TEXT NOT NULL DEFAULT '{}'
);

-- Events are strictly append-only. No UPDATE is ever issued against this
-- table; DELETE happens only through the administrative purge, which removes
-- the whole shipment. The shipments.status column is a projection of the
-- latest status_change row here, updated in the same transaction.
CREATE TABLE IF NOT EXISTS shipment_events (
    event_id    TEXT PRIMARY KEY,
    shipment_id TEXT NOT NULL REFERENCES shipments(shipment_id)
                     ON DELETE CASCADE,
    event_type  TEXT NOT NULL,    -- snake_case EventType discriminant
    status      TEXT,             -- resulting status for status_change rows
    description TEXT NOT NULL,
    location    TEXT,
    source      TEXT NOT NULL,    -- 'manual' | 'api' | 'webhook'
    source_id   TEXT,
    occurred_at TEXT NOT NULL,    -- event time (carrier/admin supplied)
    recorded_at TEXT NOT NULL,    -- ledger acceptance time; server-assigned
    metadata    TEXT              -- tagged JSON EventMetadata or NULL
);

-- Idempotent ingestion (one carrier-origin event per shipment, source, and
-- event time) is enforced by a check inside the ingest transaction; engine
-- bookkeeping rows legitimately share a carrier event's timestamp, so a
-- unique index would be too strict. This index serves both the dedup probe
-- and ledger queries.
CREATE INDEX IF NOT EXISTS events_shipment_time_idx
    ON shipment_events(shipment_id, occurred_at);
CREATE INDEX IF NOT EXISTS events_type_idx
    ON shipment_events(event_type);
CREATE INDEX IF NOT EXISTS shipments_session_idx
    ON shipments(tracking_session_id);
CREATE INDEX IF NOT EXISTS shipments_status_idx
    ON shipments(status);

PRAGMA user_version = 1;
";
