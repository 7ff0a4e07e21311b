//! Version-based sync: decides whether an incoming event may touch stored
//! state.
//!
//! Webhooks do not arrive in chronological order — a delayed signup from one
//! spoke can land after a fresher purchase from another. Each event therefore
//! carries the timestamp of its *source* database, and the hub only applies an
//! event that is strictly newer than the profile's `last_event_timestamp`.
//! Equal timestamps are rejected too: that is the duplicate-delivery guard.
//!
//! A `false` result is a loggable no-op for the caller, never an error.

use chrono::{DateTime, Utc};

/// Strict greater-than comparison between the stored and incoming timestamps.
pub fn is_applicable(
  stored: DateTime<Utc>,
  incoming: DateTime<Utc>,
) -> bool {
  incoming > stored
}

/// Variant for profiles that have not applied any event yet — those accept
/// anything.
pub fn accepts(
  stored: Option<DateTime<Utc>>,
  incoming: DateTime<Utc>,
) -> bool {
  match stored {
    Some(stored) => is_applicable(stored, incoming),
    None => true,
  }
}
