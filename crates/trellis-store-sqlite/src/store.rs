//! [`SqliteStore`] — the SQLite implementation of [`HubStore`].

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension as _;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use trellis_core::{
  event::IngestEvent,
  lifecycle,
  profile::Profile,
  redact,
  resolution::{self, Evaluation, SkipReason},
  store::{
    HubStore, IngestOutcome, ProfileQuery, PurgeReport, RejectedEvent,
    RejectionReason, SiteRemoval, StoredEvent,
  },
};

use crate::{
  Error, Result,
  encode::{
    RawProfile, RawRejection, RawStoredEvent, encode_churn, encode_dt,
    encode_metadata, encode_rejection_reason, encode_status,
    encode_string_vec, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Trellis hub store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All access
/// runs on the connection's one worker thread, so read-decide-write
/// sequences for the same email never interleave.
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

  /// Run `f` on the connection's worker thread, threading domain errors
  /// back out of the `tokio_rusqlite` wrapper.
  async fn call_domain<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        f(conn).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
      })
      .await
      .map_err(|e| match e {
        tokio_rusqlite::Error::Other(inner) => {
          match inner.downcast::<Error>() {
            Ok(domain) => *domain,
            Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
          }
        }
        other => Error::Database(other),
      })
  }
}

// ─── Sync helpers (run on the connection thread) ─────────────────────────────

const PROFILE_COLUMNS: &str = "profile_id, email, first_name, phone, \
   spoke_uuid, is_subscribed, marketing_pause, tags, segments, source_sites, \
   status, ltv, churn_risk, last_event_timestamp, metadata";

fn row_to_raw_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
  Ok(RawProfile {
    profile_id:           row.get(0)?,
    email:                row.get(1)?,
    first_name:           row.get(2)?,
    phone:                row.get(3)?,
    spoke_uuid:           row.get(4)?,
    is_subscribed:        row.get(5)?,
    marketing_pause:      row.get(6)?,
    tags:                 row.get(7)?,
    segments:             row.get(8)?,
    source_sites:         row.get(9)?,
    status:               row.get(10)?,
    ltv:                  row.get(11)?,
    churn_risk:           row.get(12)?,
    last_event_timestamp: row.get(13)?,
    metadata:             row.get(14)?,
  })
}

fn find_by_email_sync(
  conn: &rusqlite::Connection,
  email: &str,
) -> Result<Option<Profile>> {
  // The email column is COLLATE NOCASE; `=` compares case-insensitively.
  let raw: Option<RawProfile> = conn
    .query_row(
      &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ?1"),
      rusqlite::params![email.trim()],
      row_to_raw_profile,
    )
    .optional()?;

  raw.map(RawProfile::into_profile).transpose()
}

fn get_profile_sync(
  conn: &rusqlite::Connection,
  id: Uuid,
) -> Result<Option<Profile>> {
  let raw: Option<RawProfile> = conn
    .query_row(
      &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE profile_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      row_to_raw_profile,
    )
    .optional()?;

  raw.map(RawProfile::into_profile).transpose()
}

fn insert_profile_sync(
  conn: &rusqlite::Connection,
  profile: &Profile,
) -> Result<()> {
  conn.execute(
    "INSERT INTO profiles (
       profile_id, email, first_name, phone, spoke_uuid,
       is_subscribed, marketing_pause, tags, segments, source_sites,
       status, ltv, churn_risk, last_event_timestamp, metadata
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    rusqlite::params![
      encode_uuid(profile.id),
      profile.email,
      profile.first_name,
      profile.phone,
      profile.spoke_uuid,
      profile.is_subscribed,
      profile.marketing_pause,
      encode_string_vec(&profile.tags)?,
      encode_string_vec(&profile.segments)?,
      encode_string_vec(&profile.source_sites)?,
      encode_status(profile.status),
      profile.ltv,
      encode_churn(profile.churn_risk),
      profile.last_event_timestamp.map(encode_dt),
      encode_metadata(&profile.metadata)?,
    ],
  )?;
  Ok(())
}

fn update_profile_sync(
  conn: &rusqlite::Connection,
  profile: &Profile,
) -> Result<()> {
  conn.execute(
    "UPDATE profiles SET
       first_name = ?2, phone = ?3, spoke_uuid = ?4,
       is_subscribed = ?5, marketing_pause = ?6,
       tags = ?7, segments = ?8, source_sites = ?9,
       status = ?10, ltv = ?11, churn_risk = ?12,
       last_event_timestamp = ?13, metadata = ?14
     WHERE profile_id = ?1",
    rusqlite::params![
      encode_uuid(profile.id),
      profile.first_name,
      profile.phone,
      profile.spoke_uuid,
      profile.is_subscribed,
      profile.marketing_pause,
      encode_string_vec(&profile.tags)?,
      encode_string_vec(&profile.segments)?,
      encode_string_vec(&profile.source_sites)?,
      encode_status(profile.status),
      profile.ltv,
      encode_churn(profile.churn_risk),
      profile.last_event_timestamp.map(encode_dt),
      encode_metadata(&profile.metadata)?,
    ],
  )?;
  Ok(())
}

fn event_seen_sync(
  conn: &rusqlite::Connection,
  event_id: &str,
) -> Result<bool> {
  let live: bool = conn
    .query_row(
      "SELECT 1 FROM marketing_events WHERE event_id = ?1",
      rusqlite::params![event_id],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false);

  if live {
    return Ok(true);
  }

  let archived: bool = conn
    .query_row(
      "SELECT 1 FROM archived_events WHERE event_id = ?1",
      rusqlite::params![event_id],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false);

  Ok(archived)
}

fn insert_event_sync(
  conn: &rusqlite::Connection,
  profile_id: Uuid,
  event: &IngestEvent,
  recorded_at: DateTime<Utc>,
) -> Result<()> {
  let payload = event.kind.to_json().map_err(Error::Core)?;
  conn.execute(
    "INSERT INTO marketing_events (
       id, event_id, profile_id, event_type, payload_json,
       source_site, event_timestamp, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      event.event_id,
      encode_uuid(profile_id),
      event.kind.discriminant(),
      payload.to_string(),
      event.site,
      encode_dt(event.event_timestamp),
      encode_dt(recorded_at),
    ],
  )?;
  Ok(())
}

fn insert_rejection_sync(
  conn: &rusqlite::Connection,
  rejection: &RejectedEvent,
) -> Result<()> {
  conn.execute(
    "INSERT INTO ingest_rejections (
       rejection_id, event_id, source_site, reason,
       payload_fingerprint, detail, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(rejection.id),
      rejection.event_id,
      rejection.source_site,
      encode_rejection_reason(rejection.reason),
      rejection.payload_fingerprint,
      rejection.detail,
      encode_dt(rejection.created_at),
    ],
  )?;
  Ok(())
}

/// Build a dead-letter row. The detail string is PII-scrubbed before it is
/// ever persisted.
fn rejection_row(
  event: &IngestEvent,
  reason: RejectionReason,
  fingerprint: &str,
  detail: Option<String>,
  now: DateTime<Utc>,
) -> RejectedEvent {
  RejectedEvent {
    id:                  Uuid::new_v4(),
    event_id:            event.event_id.clone(),
    source_site:         event.site.clone(),
    reason,
    payload_fingerprint: fingerprint.to_owned(),
    detail:              detail.map(|d| redact::sanitize_pii(&d)),
    created_at:          now,
  }
}

/// Scrubbed payload preview for operator inspection of dead letters.
fn payload_preview(event: &IngestEvent) -> Option<String> {
  event.kind.to_json().ok().map(|v| v.to_string())
}

/// The full read-decide-write sequence for one delivery. Runs on the
/// connection thread; never interleaves with another ingest.
fn ingest_sync(
  conn: &rusqlite::Connection,
  event: &IngestEvent,
  fingerprint: &str,
  now: DateTime<Utc>,
) -> Result<IngestOutcome> {
  if event_seen_sync(conn, &event.event_id)? {
    tracing::warn!(
      event_id = %event.event_id,
      site = %event.site,
      "duplicate delivery refused"
    );
    let rejection = rejection_row(
      event,
      RejectionReason::DuplicateDelivery,
      fingerprint,
      payload_preview(event),
      now,
    );
    insert_rejection_sync(conn, &rejection)?;
    return Ok(IngestOutcome::Skipped {
      reason: SkipReason::DuplicateDelivery,
    });
  }

  let existing = find_by_email_sync(conn, &event.email)?;

  match resolution::evaluate(existing.as_ref(), event).map_err(Error::Core)? {
    Evaluation::Create(profile) => {
      insert_profile_sync(conn, &profile)?;
      insert_event_sync(conn, profile.id, event, now)?;
      tracing::info!(profile_id = %profile.id, site = %event.site, "profile created");
      Ok(IngestOutcome::Created { profile })
    }
    Evaluation::Merge(profile) => {
      update_profile_sync(conn, &profile)?;
      insert_event_sync(conn, profile.id, event, now)?;
      tracing::info!(profile_id = %profile.id, site = %event.site, "site merged");
      Ok(IngestOutcome::Merged { profile })
    }
    Evaluation::Skip(reason) => {
      if reason == SkipReason::ProfileDeleted {
        tracing::warn!(
          event_id = %event.event_id,
          site = %event.site,
          "event for deleted profile refused"
        );
        let rejection = rejection_row(
          event,
          RejectionReason::ProfileDeleted,
          fingerprint,
          payload_preview(event),
          now,
        );
        insert_rejection_sync(conn, &rejection)?;
      } else {
        tracing::debug!(
          event_id = %event.event_id,
          site = %event.site,
          %reason,
          "ingest skipped"
        );
      }
      Ok(IngestOutcome::Skipped { reason })
    }
    Evaluation::RejectedStale { stored, incoming } => {
      tracing::warn!(
        event_id = %event.event_id,
        site = %event.site,
        stored = %stored,
        incoming = %incoming,
        "stale event rejected"
      );
      let detail = format!(
        "stored {}, incoming {}",
        encode_dt(stored),
        encode_dt(incoming)
      );
      let rejection = rejection_row(
        event,
        RejectionReason::Stale,
        fingerprint,
        Some(detail),
        now,
      );
      insert_rejection_sync(conn, &rejection)?;
      Ok(IngestOutcome::RejectedStale { stored, incoming })
    }
  }
}

// ─── HubStore impl ───────────────────────────────────────────────────────────

impl HubStore for SqliteStore {
  type Error = Error;

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
    let email = email.to_owned();
    self
      .call_domain(move |conn| find_by_email_sync(conn, &email))
      .await
  }

  async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
    self.call_domain(move |conn| get_profile_sync(conn, id)).await
  }

  async fn list_profiles(&self, query: &ProfileQuery) -> Result<Vec<Profile>> {
    let text_pattern = query.text.as_deref().map(|t| format!("%{t}%"));
    let status_str = query.status.map(encode_status).map(str::to_owned);
    // JSON-array columns are filtered with a quoted-element LIKE pattern.
    let site_pattern = query.site.as_deref().map(|s| format!("%\"{s}\"%"));
    let segment_pattern =
      query.segment.as_deref().map(|s| format!("%\"{s}\"%"));
    let limit_val = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    self
      .call_domain(move |conn| {
        // Build WHERE clause dynamically; parameter indices stay fixed.
        let mut conds: Vec<&'static str> = vec![];
        if text_pattern.is_some() {
          conds.push("(email LIKE ?1 OR first_name LIKE ?1)");
        }
        if status_str.is_some() {
          conds.push("status = ?2");
        }
        if site_pattern.is_some() {
          conds.push("source_sites LIKE ?3");
        }
        if segment_pattern.is_some() {
          conds.push("segments LIKE ?4");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {PROFILE_COLUMNS} FROM profiles
           {where_clause}
           ORDER BY email
           LIMIT ?5 OFFSET ?6"
        );

        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(
            rusqlite::params![
              text_pattern.as_deref(),
              status_str.as_deref(),
              site_pattern.as_deref(),
              segment_pattern.as_deref(),
              limit_val,
              offset_val,
            ],
            row_to_raw_profile,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        raws.into_iter().map(RawProfile::into_profile).collect()
      })
      .await
  }

  // ── Ingest ────────────────────────────────────────────────────────────────

  async fn ingest(&self, event: IngestEvent) -> Result<IngestOutcome> {
    let serialized = serde_json::to_vec(&event)?;
    let fingerprint = hex::encode(Sha256::digest(&serialized));
    let now = Utc::now();

    self
      .call_domain(move |conn| ingest_sync(conn, &event, &fingerprint, now))
      .await
  }

  async fn remove_site(
    &self,
    email: &str,
    site: &str,
  ) -> Result<Option<SiteRemoval>> {
    let email = email.to_owned();
    let site = site.to_owned();

    self
      .call_domain(move |conn| {
        let Some(profile) = find_by_email_sync(conn, &email)? else {
          return Ok(None);
        };

        let had_site = profile.has_site(&site);
        let updated = lifecycle::on_site_removed(profile, &site);

        if !had_site {
          // Nothing changed; don't touch the row.
          return Ok(Some(SiteRemoval {
            profile:         updated,
            hardened_delete: false,
          }));
        }

        let hardened = updated.source_sites.is_empty();
        update_profile_sync(conn, &updated)?;

        if hardened {
          tracing::info!(
            profile_id = %updated.id,
            %site,
            "last membership removed, profile hardened-deleted"
          );
        } else {
          tracing::info!(profile_id = %updated.id, %site, "site membership removed");
        }

        Ok(Some(SiteRemoval { profile: updated, hardened_delete: hardened }))
      })
      .await
  }

  // ── Activity log ──────────────────────────────────────────────────────────

  async fn list_events(
    &self,
    profile_id: Uuid,
    limit: usize,
  ) -> Result<Vec<StoredEvent>> {
    let id_str = encode_uuid(profile_id);
    let limit_val = limit as i64;

    self
      .call_domain(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, event_id, profile_id, event_type, payload_json,
                  source_site, event_timestamp, recorded_at
           FROM marketing_events
           WHERE profile_id = ?1
           ORDER BY event_timestamp DESC
           LIMIT ?2",
        )?;

        let raws = stmt
          .query_map(rusqlite::params![id_str, limit_val], |row| {
            Ok(RawStoredEvent {
              id:              row.get(0)?,
              event_id:        row.get(1)?,
              profile_id:      row.get(2)?,
              event_type:      row.get(3)?,
              payload_json:    row.get(4)?,
              source_site:     row.get(5)?,
              event_timestamp: row.get(6)?,
              recorded_at:     row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        raws
          .into_iter()
          .map(RawStoredEvent::into_stored_event)
          .collect()
      })
      .await
  }

  async fn list_rejections(&self, limit: usize) -> Result<Vec<RejectedEvent>> {
    let limit_val = limit as i64;

    self
      .call_domain(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT rejection_id, event_id, source_site, reason,
                  payload_fingerprint, detail, created_at
           FROM ingest_rejections
           ORDER BY created_at DESC
           LIMIT ?1",
        )?;

        let raws = stmt
          .query_map(rusqlite::params![limit_val], |row| {
            Ok(RawRejection {
              rejection_id:        row.get(0)?,
              event_id:            row.get(1)?,
              source_site:         row.get(2)?,
              reason:              row.get(3)?,
              payload_fingerprint: row.get(4)?,
              detail:              row.get(5)?,
              created_at:          row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        raws
          .into_iter()
          .map(RawRejection::into_rejected_event)
          .collect()
      })
      .await
  }

  // ── Hygiene ───────────────────────────────────────────────────────────────

  async fn purge_events(&self, retention_days: u32) -> Result<PurgeReport> {
    let cutoff = encode_dt(Utc::now() - Duration::days(retention_days as i64));

    let report = self
      .call_domain(move |conn| {
        // High-value events move to the archive before the sweep deletes
        // everything past the cutoff. The IN list mirrors
        // EventKind::is_high_value.
        let archived = conn.execute(
          "INSERT INTO archived_events (
             id, event_id, profile_id, event_type, payload_json,
             source_site, event_timestamp, recorded_at
           )
           SELECT id, event_id, profile_id, event_type, payload_json,
                  source_site, event_timestamp, recorded_at
           FROM marketing_events
           WHERE event_timestamp < ?1
             AND event_type IN ('purchase', 'signup', 'support_ticket')",
          rusqlite::params![cutoff],
        )?;

        let removed = conn.execute(
          "DELETE FROM marketing_events WHERE event_timestamp < ?1",
          rusqlite::params![cutoff],
        )?;

        Ok(PurgeReport { archived, purged: removed - archived })
      })
      .await?;

    tracing::info!(
      archived = report.archived,
      purged = report.purged,
      "retention purge cycle complete"
    );

    Ok(report)
  }
}
