//! The `HubStore` trait and supporting query/outcome types.
//!
//! The trait is implemented by storage backends (e.g. `trellis-store-sqlite`).
//! Higher layers (`trellis-api`, `trellis-import`) depend on this
//! abstraction, not on any concrete backend.
//!
//! Backends own the concurrency discipline the rules assume: the read of an
//! existing profile and the write of the decision for one email must never
//! interleave with another ingest for the same email.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  event::{EventKind, IngestEvent},
  profile::{Profile, ProfileStatus},
  resolution::SkipReason,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`HubStore::list_profiles`].
#[derive(Debug, Clone, Default)]
pub struct ProfileQuery {
  /// Free-text filter over email and first name.
  pub text:    Option<String>,
  pub status:  Option<ProfileStatus>,
  /// Restrict to profiles observed on this site.
  pub site:    Option<String>,
  /// Restrict to profiles carrying this segment label.
  pub segment: Option<String>,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What one ingest call did. Skips and staleness rejections are normal,
/// loggable outcomes — an ingest only *errors* on malformed input or storage
/// failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
  Created {
    profile: Profile,
  },
  Merged {
    profile: Profile,
  },
  Skipped {
    reason: SkipReason,
  },
  RejectedStale {
    stored:   DateTime<Utc>,
    incoming: DateTime<Utc>,
  },
}

/// Result of a site-membership removal.
#[derive(Debug, Clone, Serialize)]
pub struct SiteRemoval {
  pub profile:         Profile,
  /// True when the removed membership was the last one and the profile went
  /// through the hardened delete.
  pub hardened_delete: bool,
}

// ─── Dead letter ─────────────────────────────────────────────────────────────

/// Why an event landed in the rejection log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
  Stale,
  DuplicateDelivery,
  ProfileDeleted,
}

/// A rejected event, kept for operator inspection. The payload itself is not
/// stored — only a fingerprint and a PII-scrubbed detail string.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedEvent {
  pub id:                  Uuid,
  pub event_id:            String,
  pub source_site:         String,
  pub reason:              RejectionReason,
  /// SHA-256 hex of the serialised event, for correlating redeliveries.
  pub payload_fingerprint: String,
  pub detail:              Option<String>,
  pub created_at:          DateTime<Utc>,
}

// ─── Events & hygiene ────────────────────────────────────────────────────────

/// An applied event as persisted in the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
  pub id:              Uuid,
  pub event_id:        String,
  pub profile_id:      Uuid,
  pub kind:            EventKind,
  pub source_site:     String,
  pub event_timestamp: DateTime<Utc>,
  pub recorded_at:     DateTime<Utc>,
}

/// Result of one retention purge cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PurgeReport {
  /// High-value events moved to the long-term archive.
  pub archived: usize,
  /// Behavioral noise deleted outright.
  pub purged:   usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Trellis hub storage backend.
///
/// `ingest` and `remove_site` run the full read-decide-write sequence inside
/// the backend so it can guarantee per-email serialization. All methods
/// return `Send` futures so the trait can be used in multi-threaded async
/// runtimes (e.g. tokio with `axum`).
pub trait HubStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Look a profile up by email, case-insensitively.
  fn find_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + 'a;

  /// Retrieve a profile by id. Returns `None` if not found.
  fn get_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// List profiles matching `query`.
  fn list_profiles<'a>(
    &'a self,
    query: &'a ProfileQuery,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + 'a;

  // ── Ingest ────────────────────────────────────────────────────────────

  /// Apply one incoming event: resolve, merge or create, append to the
  /// activity log, dead-letter rejections. Never errors on duplicates or
  /// stale deliveries — those are [`IngestOutcome`] variants.
  fn ingest(
    &self,
    event: IngestEvent,
  ) -> impl Future<Output = Result<IngestOutcome, Self::Error>> + Send + '_;

  /// Remove one site membership (the DELETE-webhook path) and apply the
  /// hardened delete check. Returns `None` if no profile exists for `email`.
  fn remove_site<'a>(
    &'a self,
    email: &'a str,
    site: &'a str,
  ) -> impl Future<Output = Result<Option<SiteRemoval>, Self::Error>> + Send + 'a;

  // ── Activity log ──────────────────────────────────────────────────────

  /// Most recent applied events for a profile, newest first.
  fn list_events(
    &self,
    profile_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<StoredEvent>, Self::Error>> + Send + '_;

  /// Most recent rejections, newest first.
  fn list_rejections(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RejectedEvent>, Self::Error>> + Send + '_;

  // ── Hygiene ───────────────────────────────────────────────────────────

  /// Run one retention cycle: events older than `retention_days` are moved
  /// to the archive (high-value kinds) or deleted (noise). Profiles are
  /// never touched.
  fn purge_events(
    &self,
    retention_days: u32,
  ) -> impl Future<Output = Result<PurgeReport, Self::Error>> + Send + '_;
}
