//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. List and map fields are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use trellis_core::{
  event::EventKind,
  profile::{ChurnRisk, Profile, ProfileStatus},
  store::{RejectedEvent, RejectionReason, StoredEvent},
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

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── ProfileStatus ───────────────────────────────────────────────────────────

pub fn encode_status(s: ProfileStatus) -> &'static str {
  match s {
    ProfileStatus::Active => "active",
    ProfileStatus::Archived => "archived",
    ProfileStatus::Banned => "banned",
    ProfileStatus::Deleted => "deleted",
  }
}

pub fn decode_status(s: &str) -> Result<ProfileStatus> {
  match s {
    "active" => Ok(ProfileStatus::Active),
    "archived" => Ok(ProfileStatus::Archived),
    "banned" => Ok(ProfileStatus::Banned),
    "deleted" => Ok(ProfileStatus::Deleted),
    other => Err(Error::UnknownDiscriminant(other.to_owned())),
  }
}

// ─── ChurnRisk ───────────────────────────────────────────────────────────────

pub fn encode_churn(c: ChurnRisk) -> &'static str {
  match c {
    ChurnRisk::Minimal => "minimal",
    ChurnRisk::Moderate => "moderate",
    ChurnRisk::High => "high",
    ChurnRisk::Critical => "critical",
  }
}

pub fn decode_churn(s: &str) -> Result<ChurnRisk> {
  match s {
    "minimal" => Ok(ChurnRisk::Minimal),
    "moderate" => Ok(ChurnRisk::Moderate),
    "high" => Ok(ChurnRisk::High),
    "critical" => Ok(ChurnRisk::Critical),
    other => Err(Error::UnknownDiscriminant(other.to_owned())),
  }
}

// ─── RejectionReason ─────────────────────────────────────────────────────────

pub fn encode_rejection_reason(r: RejectionReason) -> &'static str {
  match r {
    RejectionReason::Stale => "stale",
    RejectionReason::DuplicateDelivery => "duplicate_delivery",
    RejectionReason::ProfileDeleted => "profile_deleted",
  }
}

pub fn decode_rejection_reason(s: &str) -> Result<RejectionReason> {
  match s {
    "stale" => Ok(RejectionReason::Stale),
    "duplicate_delivery" => Ok(RejectionReason::DuplicateDelivery),
    "profile_deleted" => Ok(RejectionReason::ProfileDeleted),
    other => Err(Error::UnknownDiscriminant(other.to_owned())),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_string_vec(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_string_vec(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_metadata(
  map: &serde_json::Map<String, serde_json::Value>,
) -> Result<String> {
  Ok(serde_json::to_string(map)?)
}

pub fn decode_metadata(
  s: &str,
) -> Result<serde_json::Map<String, serde_json::Value>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub profile_id:           String,
  pub email:                String,
  pub first_name:           String,
  pub phone:                Option<String>,
  pub spoke_uuid:           Option<String>,
  pub is_subscribed:        bool,
  pub marketing_pause:      bool,
  pub tags:                 String,
  pub segments:             String,
  pub source_sites:         String,
  pub status:               String,
  pub ltv:                  f64,
  pub churn_risk:           String,
  pub last_event_timestamp: Option<String>,
  pub metadata:             String,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      id:                   decode_uuid(&self.profile_id)?,
      email:                self.email,
      first_name:           self.first_name,
      phone:                self.phone,
      spoke_uuid:           self.spoke_uuid,
      is_subscribed:        self.is_subscribed,
      marketing_pause:      self.marketing_pause,
      tags:                 decode_string_vec(&self.tags)?,
      segments:             decode_string_vec(&self.segments)?,
      source_sites:         decode_string_vec(&self.source_sites)?,
      status:               decode_status(&self.status)?,
      ltv:                  self.ltv,
      churn_risk:           decode_churn(&self.churn_risk)?,
      last_event_timestamp: decode_opt_dt(
        self.last_event_timestamp.as_deref(),
      )?,
      metadata:             decode_metadata(&self.metadata)?,
    })
  }
}

/// Raw strings read directly from a `marketing_events` row.
pub struct RawStoredEvent {
  pub id:              String,
  pub event_id:        String,
  pub profile_id:      String,
  pub event_type:      String,
  pub payload_json:    String,
  pub source_site:     String,
  pub event_timestamp: String,
  pub recorded_at:     String,
}

impl RawStoredEvent {
  pub fn into_stored_event(self) -> Result<StoredEvent> {
    let payload: serde_json::Value = serde_json::from_str(&self.payload_json)?;
    let kind = EventKind::from_parts(&self.event_type, payload)?;

    Ok(StoredEvent {
      id:              decode_uuid(&self.id)?,
      event_id:        self.event_id,
      profile_id:      decode_uuid(&self.profile_id)?,
      kind,
      source_site:     self.source_site,
      event_timestamp: decode_dt(&self.event_timestamp)?,
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from an `ingest_rejections` row.
pub struct RawRejection {
  pub rejection_id:        String,
  pub event_id:            String,
  pub source_site:         String,
  pub reason:              String,
  pub payload_fingerprint: String,
  pub detail:              Option<String>,
  pub created_at:          String,
}

impl RawRejection {
  pub fn into_rejected_event(self) -> Result<RejectedEvent> {
    Ok(RejectedEvent {
      id:                  decode_uuid(&self.rejection_id)?,
      event_id:            self.event_id,
      source_site:         self.source_site,
      reason:              decode_rejection_reason(&self.reason)?,
      payload_fingerprint: self.payload_fingerprint,
      detail:              self.detail,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}
