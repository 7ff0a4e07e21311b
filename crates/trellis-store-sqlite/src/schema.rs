//! SQL schema for the Trellis SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per email across the whole ecosystem. The unique index is the
-- at-most-one-profile-per-email guarantee; NOCASE matches the hub's
-- case-insensitive email policy (stored form is as-received).
CREATE TABLE IF NOT EXISTS profiles (
    profile_id           TEXT PRIMARY KEY,
    email                TEXT NOT NULL UNIQUE COLLATE NOCASE,
    first_name           TEXT NOT NULL DEFAULT '',
    phone                TEXT,
    spoke_uuid           TEXT,
    is_subscribed        INTEGER NOT NULL DEFAULT 1,
    marketing_pause      INTEGER NOT NULL DEFAULT 0,
    tags                 TEXT NOT NULL DEFAULT '[]',
    segments             TEXT NOT NULL DEFAULT '[]',
    source_sites         TEXT NOT NULL DEFAULT '[]',
    status               TEXT NOT NULL DEFAULT 'active',
    ltv                  REAL NOT NULL DEFAULT 0,
    churn_risk           TEXT NOT NULL DEFAULT 'minimal',
    last_event_timestamp TEXT,
    metadata             TEXT NOT NULL DEFAULT '{}'
);

-- Applied events, append-only. The purge cycle is the only deleter.
-- event_id is source-assigned; the unique index is the duplicate-delivery
-- gate.
CREATE TABLE IF NOT EXISTS marketing_events (
    id              TEXT PRIMARY KEY,
    event_id        TEXT NOT NULL UNIQUE,
    profile_id      TEXT NOT NULL REFERENCES profiles(profile_id),
    event_type      TEXT NOT NULL,   -- discriminant of EventKind variant
    payload_json    TEXT NOT NULL,   -- JSON payload (inner data only)
    source_site     TEXT NOT NULL,
    event_timestamp TEXT NOT NULL,   -- ISO 8601 UTC; source-assigned
    recorded_at     TEXT NOT NULL    -- ISO 8601 UTC; hub-assigned
);

-- Long-term home for high-value events aged out of marketing_events.
CREATE TABLE IF NOT EXISTS archived_events (
    id              TEXT PRIMARY KEY,
    event_id        TEXT NOT NULL UNIQUE,
    profile_id      TEXT NOT NULL,
    event_type      TEXT NOT NULL,
    payload_json    TEXT NOT NULL,
    source_site     TEXT NOT NULL,
    event_timestamp TEXT NOT NULL,
    recorded_at     TEXT NOT NULL
);

-- Dead letter: deliveries the hub refused to apply. The raw payload is not
-- kept; only a fingerprint and a scrubbed detail string.
CREATE TABLE IF NOT EXISTS ingest_rejections (
    rejection_id        TEXT PRIMARY KEY,
    event_id            TEXT NOT NULL,
    source_site         TEXT NOT NULL,
    reason              TEXT NOT NULL,
    payload_fingerprint TEXT NOT NULL,
    detail              TEXT,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS events_profile_idx    ON marketing_events(profile_id);
CREATE INDEX IF NOT EXISTS events_timestamp_idx  ON marketing_events(event_timestamp);
CREATE INDEX IF NOT EXISTS rejections_created_idx ON ingest_rejections(created_at);

PRAGMA user_version = 1;
";
