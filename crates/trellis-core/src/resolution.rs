//! Identity resolution — deciding what an incoming event does to the store.
//!
//! Exact email matching prevents duplicate identities across spokes: a first
//! sighting creates a profile, a known email on a new site merges into the
//! existing profile, and a known `(email, site)` pair is a skip. The decision
//! is pure; persisting it (and serialising concurrent decisions for the same
//! email) is the store's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  event::{IngestEvent, ProfileAttrs},
  profile::{ChurnRisk, Profile, ProfileStatus},
  staleness,
};

// ─── Decision ────────────────────────────────────────────────────────────────

/// Why an event produced no write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  /// The profile already carries this `(email, site)` pair.
  ExactDuplicate,
  /// The profile has left the ecosystem; deleted profiles accept nothing.
  ProfileDeleted,
  /// This `event_id` has already been applied.
  DuplicateDelivery,
}

impl std::fmt::Display for SkipReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::ExactDuplicate => "exact duplicate",
      Self::ProfileDeleted => "profile deleted",
      Self::DuplicateDelivery => "duplicate delivery",
    };
    f.write_str(s)
  }
}

/// What the resolution rule decided for one incoming event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
  /// First sighting of this email: a fully-built new profile.
  Create(Profile),
  /// Known email, new site: fold the event into the existing profile.
  Merge {
    profile_id: Uuid,
    add_site:   String,
    attrs:      ProfileAttrs,
  },
  Skip {
    reason: SkipReason,
  },
}

// ─── Resolution rule ─────────────────────────────────────────────────────────

/// Decide what `incoming` does to the store, given the profile currently
/// stored under its email (if any).
///
/// Fails only on precondition violations: an event without its natural key
/// (email or site) admits no decision at all.
pub fn resolve(
  existing: Option<&Profile>,
  incoming: &IngestEvent,
) -> Result<Decision> {
  if incoming.email.trim().is_empty() {
    return Err(Error::MissingEmail);
  }
  if incoming.site.trim().is_empty() {
    return Err(Error::MissingSite);
  }

  let Some(existing) = existing else {
    return Ok(Decision::Create(create_profile(incoming)));
  };

  if existing.status == ProfileStatus::Deleted {
    return Ok(Decision::Skip { reason: SkipReason::ProfileDeleted });
  }

  if existing.has_site(&incoming.site) {
    return Ok(Decision::Skip { reason: SkipReason::ExactDuplicate });
  }

  Ok(Decision::Merge {
    profile_id: existing.id,
    add_site:   incoming.site.clone(),
    attrs:      incoming.attrs.clone(),
  })
}

/// Build the profile a [`Decision::Create`] carries.
///
/// New identities are subscribed unless the event explicitly opts out —
/// spokes only emit signup traffic for consented users.
fn create_profile(incoming: &IngestEvent) -> Profile {
  let attrs = &incoming.attrs;
  Profile {
    id:                   Uuid::new_v4(),
    email:                incoming.email.trim().to_owned(),
    first_name:           attrs.first_name.clone().unwrap_or_default(),
    phone:                attrs.phone.clone(),
    spoke_uuid:           attrs.spoke_uuid.clone(),
    is_subscribed:        attrs.is_subscribed.unwrap_or(true),
    marketing_pause:      false,
    tags:                 dedup(attrs.tags.clone()),
    segments:             dedup(attrs.segments.clone()),
    source_sites:         vec![incoming.site.clone()],
    status:               ProfileStatus::Active,
    ltv:                  attrs.ltv_delta.unwrap_or(0.0),
    churn_risk:           ChurnRisk::Minimal,
    last_event_timestamp: Some(incoming.event_timestamp),
    metadata:             serde_json::Map::new(),
  }
}

// ─── Merge application ───────────────────────────────────────────────────────

/// Result of folding an applicable or stale event into a profile.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
  Applied(Profile),
  /// The event was not newer than the stored state; nothing changed.
  RejectedStale {
    stored: DateTime<Utc>,
  },
}

/// Fold `incoming` into `existing` under the staleness gate.
///
/// A stale event rejects the whole merge — no field changes, including the
/// site set — and the caller logs it. An applicable event adds the site,
/// replaces scalars the event carries, unions list fields, and advances
/// `last_event_timestamp`.
pub fn apply_merge(existing: &Profile, incoming: &IngestEvent) -> MergeOutcome {
  if !staleness::accepts(existing.last_event_timestamp, incoming.event_timestamp)
  {
    // `accepts` only returns false when a stored timestamp is present.
    let stored = existing
      .last_event_timestamp
      .unwrap_or(incoming.event_timestamp);
    return MergeOutcome::RejectedStale { stored };
  }

  let attrs = &incoming.attrs;
  let mut updated = existing.clone();

  if !updated.has_site(&incoming.site) {
    updated.source_sites.push(incoming.site.clone());
  }

  if let Some(name) = &attrs.first_name {
    updated.first_name = name.clone();
  }
  if let Some(phone) = &attrs.phone {
    updated.phone = Some(phone.clone());
  }
  if let Some(spoke_uuid) = &attrs.spoke_uuid {
    updated.spoke_uuid = Some(spoke_uuid.clone());
  }
  if let Some(subscribed) = attrs.is_subscribed {
    updated.is_subscribed = subscribed;
  }
  if let Some(delta) = attrs.ltv_delta {
    updated.ltv += delta;
  }

  union_into(&mut updated.tags, &attrs.tags);
  union_into(&mut updated.segments, &attrs.segments);

  updated.last_event_timestamp = Some(incoming.event_timestamp);

  MergeOutcome::Applied(updated)
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// A decision with the merge already applied — what stores persist.
#[derive(Debug, Clone)]
pub enum Evaluation {
  Create(Profile),
  Merge(Profile),
  RejectedStale {
    stored:   DateTime<Utc>,
    incoming: DateTime<Utc>,
  },
  Skip(SkipReason),
}

/// Run [`resolve`] and, for merges, [`apply_merge`] in one step.
pub fn evaluate(
  existing: Option<&Profile>,
  incoming: &IngestEvent,
) -> Result<Evaluation> {
  match (resolve(existing, incoming)?, existing) {
    (Decision::Create(profile), _) => Ok(Evaluation::Create(profile)),
    (Decision::Skip { reason }, _) => Ok(Evaluation::Skip(reason)),
    (Decision::Merge { .. }, Some(existing)) => {
      match apply_merge(existing, incoming) {
        MergeOutcome::Applied(profile) => Ok(Evaluation::Merge(profile)),
        MergeOutcome::RejectedStale { stored } => {
          Ok(Evaluation::RejectedStale {
            stored,
            incoming: incoming.event_timestamp,
          })
        }
      }
    }
    // resolve() yields Merge only when it saw an existing profile.
    (Decision::Merge { .. }, None) => {
      Ok(Evaluation::Skip(SkipReason::ExactDuplicate))
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// The canonical lookup key for an email address.
pub fn email_key(email: &str) -> String {
  email.trim().to_ascii_lowercase()
}

/// Append `extra` items not already present, preserving insertion order.
fn union_into(target: &mut Vec<String>, extra: &[String]) {
  for item in extra {
    if !target.iter().any(|t| t == item) {
      target.push(item.clone());
    }
  }
}

fn dedup(items: Vec<String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::with_capacity(items.len());
  union_into(&mut out, &items);
  out
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::event::EventKind;

  fn event(email: &str, site: &str, ts_secs: i64) -> IngestEvent {
    IngestEvent {
      event_id:        format!("evt-{email}-{site}-{ts_secs}"),
      email:           email.into(),
      site:            site.into(),
      attrs:           ProfileAttrs::default(),
      kind:            EventKind::Signup,
      event_timestamp: Utc.timestamp_opt(ts_secs, 0).unwrap(),
    }
  }

  fn created(ev: &IngestEvent) -> Profile {
    match resolve(None, ev).unwrap() {
      Decision::Create(p) => p,
      other => panic!("expected Create, got {other:?}"),
    }
  }

  #[test]
  fn first_sighting_creates_an_active_subscribed_profile() {
    let ev = event("sarah@x.com", "farm.site", 1_000);
    let p = created(&ev);

    assert_eq!(p.email, "sarah@x.com");
    assert_eq!(p.source_sites, vec!["farm.site".to_string()]);
    assert_eq!(p.status, ProfileStatus::Active);
    assert!(p.is_subscribed);
    assert_eq!(p.last_event_timestamp, Some(ev.event_timestamp));
  }

  #[test]
  fn second_sighting_of_same_site_skips() {
    let ev = event("sarah@x.com", "farm.site", 1_000);
    let p = created(&ev);

    let again = event("sarah@x.com", "farm.site", 2_000);
    match resolve(Some(&p), &again).unwrap() {
      Decision::Skip { reason } => {
        assert_eq!(reason, SkipReason::ExactDuplicate)
      }
      other => panic!("expected Skip, got {other:?}"),
    }
  }

  #[test]
  fn email_match_is_case_insensitive() {
    let p = created(&event("Sarah@X.com", "farm.site", 1_000));
    let upper = event("SARAH@x.COM", "farm.site", 2_000);
    // Callers look profiles up case-insensitively; resolve agrees.
    assert!(p.matches_email(&upper.email));
    assert_eq!(email_key(&upper.email), email_key(&p.email));
  }

  #[test]
  fn new_site_merges_and_keeps_subscription() {
    let p = created(&event("sarah@x.com", "farm.site", 1_000));

    let incoming = event("sarah@x.com", "micro.site", 2_000);
    let Decision::Merge { profile_id, add_site, .. } =
      resolve(Some(&p), &incoming).unwrap()
    else {
      panic!("expected Merge");
    };
    assert_eq!(profile_id, p.id);
    assert_eq!(add_site, "micro.site");

    let MergeOutcome::Applied(merged) = apply_merge(&p, &incoming) else {
      panic!("expected Applied");
    };
    assert_eq!(merged.source_sites, vec![
      "farm.site".to_string(),
      "micro.site".to_string()
    ]);
    assert!(merged.is_subscribed);
    assert_eq!(merged.id, p.id);
  }

  #[test]
  fn stale_merge_changes_nothing() {
    let p = created(&event("sarah@x.com", "farm.site", 2_000));

    let late = event("sarah@x.com", "micro.site", 1_000);
    match apply_merge(&p, &late) {
      MergeOutcome::RejectedStale { stored } => {
        assert_eq!(Some(stored), p.last_event_timestamp)
      }
      MergeOutcome::Applied(_) => panic!("stale event must not apply"),
    }
  }

  #[test]
  fn equal_timestamp_merge_is_stale() {
    let p = created(&event("sarah@x.com", "farm.site", 2_000));
    let replay = event("sarah@x.com", "micro.site", 2_000);
    assert!(matches!(
      apply_merge(&p, &replay),
      MergeOutcome::RejectedStale { .. }
    ));
  }

  #[test]
  fn merge_replaces_scalars_and_unions_lists() {
    let mut first = event("mike@x.com", "farm.site", 1_000);
    first.attrs.first_name = Some("Mike".into());
    first.attrs.tags = vec!["gardener".into()];
    let p = created(&first);

    let mut second = event("mike@x.com", "app.site", 2_000);
    second.attrs.first_name = Some("Mikey".into());
    second.attrs.tags = vec!["gardener".into(), "app_user".into()];
    second.attrs.ltv_delta = Some(19.99);

    let MergeOutcome::Applied(merged) = apply_merge(&p, &second) else {
      panic!("expected Applied");
    };
    assert_eq!(merged.first_name, "Mikey");
    assert_eq!(merged.tags, vec![
      "gardener".to_string(),
      "app_user".to_string()
    ]);
    assert_eq!(merged.ltv, 19.99);
    assert_eq!(merged.last_event_timestamp, Some(second.event_timestamp));
  }

  #[test]
  fn deleted_profiles_accept_nothing() {
    let mut p = created(&event("gone@x.com", "farm.site", 1_000));
    p.status = ProfileStatus::Deleted;
    p.is_subscribed = false;
    p.source_sites.clear();

    let incoming = event("gone@x.com", "micro.site", 2_000);
    match resolve(Some(&p), &incoming).unwrap() {
      Decision::Skip { reason } => {
        assert_eq!(reason, SkipReason::ProfileDeleted)
      }
      other => panic!("expected Skip, got {other:?}"),
    }
  }

  #[test]
  fn missing_natural_keys_are_precondition_violations() {
    let no_email = event("", "farm.site", 1_000);
    assert!(matches!(resolve(None, &no_email), Err(Error::MissingEmail)));

    let no_site = event("sarah@x.com", "  ", 1_000);
    assert!(matches!(resolve(None, &no_site), Err(Error::MissingSite)));
  }

  #[test]
  fn evaluate_covers_the_create_then_skip_sequence() {
    let ev = event("sarah@x.com", "farm.site", 1_000);

    let Evaluation::Create(p) = evaluate(None, &ev).unwrap() else {
      panic!("expected Create");
    };
    let again = event("sarah@x.com", "farm.site", 2_000);
    let Evaluation::Skip(reason) = evaluate(Some(&p), &again).unwrap() else {
      panic!("expected Skip");
    };
    assert_eq!(reason, SkipReason::ExactDuplicate);
  }
}
