//! Profile — the master identity record of the hub.
//!
//! One profile exists per email address across the whole ecosystem. Spokes
//! never own profiles; they contribute site memberships and events, and the
//! hub folds those into a single record via the resolution rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Administrative lifecycle state of a profile.
///
/// `deleted` is terminal: it is reached when the last site membership is
/// removed (see [`crate::lifecycle::on_site_removed`]) and nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
  Active,
  Archived,
  Banned,
  Deleted,
}

impl ProfileStatus {
  pub fn is_terminal(self) -> bool { matches!(self, Self::Deleted) }

  /// Whether moving from `self` to `next` is a permitted transition.
  ///
  /// `active` may move anywhere; `archived` and `banned` may only be hard
  /// deleted. Nothing leaves `deleted`.
  pub fn may_transition_to(self, next: ProfileStatus) -> bool {
    match (self, next) {
      (a, b) if a == b => false,
      (Self::Deleted, _) => false,
      (Self::Active, _) => true,
      (_, Self::Deleted) => true,
      _ => false,
    }
  }
}

// ─── Churn risk ──────────────────────────────────────────────────────────────

/// Churn-risk band, recomputed periodically by analytics outside this crate.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChurnRisk {
  #[default]
  Minimal,
  Moderate,
  High,
  Critical,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// A master identity record.
///
/// `email` is the natural key: comparison is case-insensitive, the stored
/// form is as-received. `id` is assigned at creation and never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub id:                   Uuid,
  pub email:                String,
  pub first_name:           String,
  pub phone:                Option<String>,
  /// External identifier assigned by the first source site, if any.
  pub spoke_uuid:           Option<String>,
  pub is_subscribed:        bool,
  /// Operator-set pause; suppresses dispatch without touching consent.
  pub marketing_pause:      bool,
  pub tags:                 Vec<String>,
  pub segments:             Vec<String>,
  /// Sites where this person has been observed. Empty only once the profile
  /// has gone through the hardened delete (then `is_subscribed` is false).
  pub source_sites:         Vec<String>,
  pub status:               ProfileStatus,
  pub ltv:                  f64,
  pub churn_risk:           ChurnRisk,
  /// Timestamp of the most recently applied event; the staleness gate.
  pub last_event_timestamp: Option<DateTime<Utc>>,
  /// Free-form extension bag carried along verbatim.
  pub metadata:             serde_json::Map<String, serde_json::Value>,
}

impl Profile {
  /// Case-sensitive site membership check — site identifiers are exact.
  pub fn has_site(&self, site: &str) -> bool {
    self.source_sites.iter().any(|s| s == site)
  }

  /// Case-insensitive email comparison, per the hub's natural-key policy.
  pub fn matches_email(&self, email: &str) -> bool {
    self.email.eq_ignore_ascii_case(email.trim())
  }
}
