//! Ingest events — what spokes deliver to the hub.
//!
//! Every event carries the sender's natural keys (email, site), a
//! source-assigned `event_id` for duplicate-delivery detection, a source
//! timestamp for the staleness gate, and a typed payload. Unknown payload
//! kinds are preserved verbatim through the `Unknown` escape hatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

// ─── Attributes ──────────────────────────────────────────────────────────────

/// Profile attributes an event may contribute. Scalars replace the stored
/// value when present; list fields are unioned into the profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileAttrs {
  pub first_name:    Option<String>,
  pub phone:         Option<String>,
  pub spoke_uuid:    Option<String>,
  pub tags:          Vec<String>,
  pub segments:      Vec<String>,
  /// Explicit consent change; absent means "leave as stored".
  pub is_subscribed: Option<bool>,
  /// Revenue contribution of this event, added to the profile's LTV.
  pub ltv_delta:     Option<f64>,
}

// ─── EventKind ───────────────────────────────────────────────────────────────

/// The typed payload of an event. The variant name serves as the `event_type`
/// discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
  Purchase {
    order_id: String,
    total:    f64,
  },
  Signup,
  CheckIn {
    location: Option<String>,
  },
  SocialIntent {
    platform: String,
    intent:   String,
  },
  SupportTicket {
    subject: String,
  },

  /// Escape hatch for event kinds the hub does not know yet.
  Unknown {
    kind:    String,
    payload: serde_json::Value,
  },
}

impl EventKind {
  /// The discriminant string stored in the `event_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Purchase { .. } => "purchase",
      Self::Signup => "signup",
      Self::CheckIn { .. } => "check_in",
      Self::SocialIntent { .. } => "social_intent",
      Self::SupportTicket { .. } => "support_ticket",
      Self::Unknown { .. } => "unknown",
    }
  }

  /// High-value events survive the retention purge by moving to the archive;
  /// everything else is behavioral noise and is dropped outright.
  pub fn is_high_value(&self) -> bool {
    matches!(
      self,
      Self::Purchase { .. } | Self::Signup | Self::SupportTicket { .. }
    )
  }

  /// Serialise the inner payload (without the type tag) for the
  /// `payload_json` database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    // The full serialised form is `{"type": "...", "data": <payload>}`.
    // We want only the payload.
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in the
  /// database.
  pub fn from_parts(
    discriminant: &str,
    data: serde_json::Value,
  ) -> Result<Self> {
    let wrapped = if data.is_null() {
      serde_json::json!({ "type": discriminant })
    } else {
      serde_json::json!({ "type": discriminant, "data": data })
    };
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── IngestEvent ─────────────────────────────────────────────────────────────

/// A single delivery from a spoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEvent {
  /// Source-assigned identifier; the hub refuses to apply it twice.
  pub event_id:        String,
  pub email:           String,
  pub site:            String,
  #[serde(default)]
  pub attrs:           ProfileAttrs,
  pub kind:            EventKind,
  /// Timestamp from the *source* database, not the delivery time. Input to
  /// the staleness gate.
  pub event_timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn discriminant_round_trips_through_parts() {
    let kinds = [
      EventKind::Purchase { order_id: "ord_1".into(), total: 42.5 },
      EventKind::Signup,
      EventKind::CheckIn { location: Some("greenhouse".into()) },
      EventKind::SocialIntent {
        platform: "instagram".into(),
        intent:   "pricing".into(),
      },
      EventKind::SupportTicket { subject: "login loop".into() },
      EventKind::Unknown {
        kind:    "loyalty_scan".into(),
        payload: serde_json::json!({ "points": 12 }),
      },
    ];

    for kind in kinds {
      let data = kind.to_json().unwrap();
      let back = EventKind::from_parts(kind.discriminant(), data).unwrap();
      assert_eq!(back, kind);
    }
  }

  #[test]
  fn unknown_kind_preserves_payload() {
    let kind = EventKind::Unknown {
      kind:    "beta_feature".into(),
      payload: serde_json::json!({ "nested": { "a": [1, 2, 3] } }),
    };
    let data = kind.to_json().unwrap();
    assert_eq!(data["nested"]["a"][2], 3);
  }

  #[test]
  fn attrs_default_is_empty() {
    let attrs: ProfileAttrs = serde_json::from_str("{}").unwrap();
    assert_eq!(attrs, ProfileAttrs::default());
  }
}
