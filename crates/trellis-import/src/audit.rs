//! The dedup audit — a dry run of the resolution rule over a parsed batch.
//!
//! Nothing here writes: the audit answers "what would this import do?"
//! against an in-memory snapshot of the current profiles. The commit step is
//! [`to_events`] plus the store's normal ingest path, so the preview and the
//! real import can never disagree on the rule.

use chrono::{DateTime, Utc};
use trellis_core::{
  event::{EventKind, IngestEvent, ProfileAttrs},
  profile::Profile,
  resolution::{Decision, resolve},
};
use uuid::Uuid;

use crate::{Result, parse::ImportRecord};

// ─── Audit ───────────────────────────────────────────────────────────────────

/// What the resolution rule would do with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
  Create,
  Merge,
  Skip,
}

/// One row of the dry-run preview.
#[derive(Debug, Clone)]
pub struct AuditEntry {
  pub record: ImportRecord,
  pub action: AuditAction,
  /// Operator-facing impact line, e.g. "merging into existing profile".
  pub impact: String,
}

/// Aggregate counts over one audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
  pub new:     usize,
  pub merged:  usize,
  pub skipped: usize,
}

/// Classify every record against the current profile set.
pub fn audit(
  profiles: &[Profile],
  records: &[ImportRecord],
  now: DateTime<Utc>,
) -> Result<Vec<AuditEntry>> {
  records
    .iter()
    .map(|record| {
      let existing =
        profiles.iter().find(|p| p.matches_email(&record.email));
      let event = record_event(record, None, now);

      let (action, impact) = match resolve(existing, &event)? {
        Decision::Create(_) => {
          (AuditAction::Create, "new identity added".to_owned())
        }
        Decision::Merge { .. } => {
          let sites = existing.map(|p| p.source_sites.len()).unwrap_or(0);
          (
            AuditAction::Merge,
            format!("merging into existing profile ({sites} sites)"),
          )
        }
        Decision::Skip { reason } => {
          (AuditAction::Skip, format!("{reason} (skipping)"))
        }
      };

      Ok(AuditEntry { record: record.clone(), action, impact })
    })
    .collect()
}

/// Roll an audit up into its headline numbers.
pub fn stats(entries: &[AuditEntry]) -> ImportStats {
  let mut out = ImportStats::default();
  for entry in entries {
    match entry.action {
      AuditAction::Create => out.new += 1,
      AuditAction::Merge => out.merged += 1,
      AuditAction::Skip => out.skipped += 1,
    }
  }
  out
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// Convert records into signup events for replay through the ingest path.
///
/// Every event gets a fresh import-scoped `event_id` and the batch timestamp;
/// the optional `segment` labels all imported profiles for follow-up
/// campaigns.
pub fn to_events(
  records: &[ImportRecord],
  segment: Option<&str>,
  now: DateTime<Utc>,
) -> Vec<IngestEvent> {
  records
    .iter()
    .map(|record| record_event(record, segment, now))
    .collect()
}

fn record_event(
  record: &ImportRecord,
  segment: Option<&str>,
  now: DateTime<Utc>,
) -> IngestEvent {
  IngestEvent {
    event_id:        format!("import-{}", Uuid::new_v4()),
    email:           record.email.clone(),
    site:            record.site.clone(),
    attrs:           ProfileAttrs {
      first_name: record.first_name.clone(),
      tags: record.tags.clone(),
      segments: segment.map(str::to_owned).into_iter().collect(),
      ..Default::default()
    },
    kind:            EventKind::Signup,
    event_timestamp: now,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use trellis_core::profile::{ChurnRisk, ProfileStatus};

  use super::*;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
  }

  fn profile(email: &str, sites: &[&str]) -> Profile {
    Profile {
      id:                   Uuid::new_v4(),
      email:                email.into(),
      first_name:           String::new(),
      phone:                None,
      spoke_uuid:           None,
      is_subscribed:        true,
      marketing_pause:      false,
      tags:                 vec![],
      segments:             vec![],
      source_sites:         sites.iter().map(|s| s.to_string()).collect(),
      status:               ProfileStatus::Active,
      ltv:                  0.0,
      churn_risk:           ChurnRisk::Minimal,
      last_event_timestamp: Some(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
      ),
      metadata:             serde_json::Map::new(),
    }
  }

  fn record(line: usize, email: &str, site: &str) -> ImportRecord {
    ImportRecord {
      line,
      email: email.into(),
      first_name: None,
      site: site.into(),
      tags: vec![],
    }
  }

  #[test]
  fn classifies_create_merge_and_skip() {
    let profiles = vec![
      profile("sarah.green@example.com", &["farm.site"]),
      profile("mike.tech@example.com", &["mailchimp_import"]),
    ];
    let records = vec![
      record(2, "sarah.green@example.com", "mailchimp_import"), // merge
      record(3, "new.gardener@gmail.com", "mailchimp_import"),  // create
      record(4, "mike.tech@example.com", "mailchimp_import"),   // skip
    ];

    let entries = audit(&profiles, &records, now()).unwrap();
    assert_eq!(entries[0].action, AuditAction::Merge);
    assert_eq!(entries[0].impact, "merging into existing profile (1 sites)");
    assert_eq!(entries[1].action, AuditAction::Create);
    assert_eq!(entries[2].action, AuditAction::Skip);

    let s = stats(&entries);
    assert_eq!(s, ImportStats { new: 1, merged: 1, skipped: 1 });
  }

  #[test]
  fn audit_matches_emails_case_insensitively() {
    let profiles = vec![profile("Sarah@X.com", &["farm.site"])];
    let records = vec![record(2, "sarah@x.com", "micro.site")];

    let entries = audit(&profiles, &records, now()).unwrap();
    assert_eq!(entries[0].action, AuditAction::Merge);
  }

  #[test]
  fn deleted_profiles_audit_as_skip() {
    let mut gone = profile("gone@x.com", &[]);
    gone.status = ProfileStatus::Deleted;
    gone.is_subscribed = false;

    let entries =
      audit(&[gone], &[record(2, "gone@x.com", "farm.site")], now()).unwrap();
    assert_eq!(entries[0].action, AuditAction::Skip);
    assert_eq!(entries[0].impact, "profile deleted (skipping)");
  }

  #[test]
  fn to_events_carries_attrs_and_segment() {
    let mut rec = record(2, "julian@x.com", "mailchimp_import");
    rec.first_name = Some("Julian".into());
    rec.tags = vec!["subscriber".into()];

    let events = to_events(&[rec], Some("imported_batch"), now());
    assert_eq!(events.len(), 1);

    let ev = &events[0];
    assert!(ev.event_id.starts_with("import-"));
    assert_eq!(ev.attrs.first_name.as_deref(), Some("Julian"));
    assert_eq!(ev.attrs.tags, vec!["subscriber".to_string()]);
    assert_eq!(ev.attrs.segments, vec!["imported_batch".to_string()]);
    assert!(matches!(ev.kind, EventKind::Signup));
  }

  #[test]
  fn event_ids_are_unique_per_record() {
    let records =
      vec![record(2, "a@x.com", "farm.site"), record(3, "b@x.com", "farm.site")];
    let events = to_events(&records, None, now());
    assert_ne!(events[0].event_id, events[1].event_id);
  }
}
