//! The hardened delete lifecycle.
//!
//! A user deleting their account on one site must not erase their history on
//! the others — but once they have left *every* site, the hub must stop
//! marketing to them entirely. A profile that stayed subscribed with no
//! remaining site membership is a zombie profile; this module is what
//! prevents it.

use crate::profile::{Profile, ProfileStatus};

/// Remove one site membership and apply the global check.
///
/// If any membership remains the profile stays "partially active" —
/// subscription and status untouched. If the removed site was the last one,
/// the profile is unsubscribed and moved to `deleted`. That transition is
/// irreversible through this rule.
///
/// Pure: stopping in-flight dispatches is the caller's responsibility, and
/// dispatchers must re-check the gate (see [`crate::dispatch::may_dispatch`])
/// immediately before every send.
pub fn on_site_removed(mut profile: Profile, site: &str) -> Profile {
  profile.source_sites.retain(|s| s != site);

  if profile.source_sites.is_empty() {
    profile.is_subscribed = false;
    profile.status = ProfileStatus::Deleted;
  }

  profile
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::profile::ChurnRisk;

  fn profile(sites: &[&str]) -> Profile {
    Profile {
      id:                   Uuid::new_v4(),
      email:                "sarah@x.com".into(),
      first_name:           "Sarah".into(),
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
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
      ),
      metadata:             serde_json::Map::new(),
    }
  }

  #[test]
  fn removing_one_of_two_sites_keeps_the_profile_active() {
    let p = profile(&["farm.site", "micro.site"]);
    let p = on_site_removed(p, "farm.site");

    assert_eq!(p.source_sites, vec!["micro.site".to_string()]);
    assert!(p.is_subscribed);
    assert_eq!(p.status, ProfileStatus::Active);
  }

  #[test]
  fn removing_the_last_site_fires_the_hardened_delete() {
    let p = profile(&["farm.site", "micro.site"]);
    let p = on_site_removed(p, "farm.site");
    let p = on_site_removed(p, "micro.site");

    assert!(p.source_sites.is_empty());
    assert!(!p.is_subscribed);
    assert_eq!(p.status, ProfileStatus::Deleted);
  }

  #[test]
  fn removing_an_unknown_site_changes_nothing() {
    let p = profile(&["farm.site"]);
    let p = on_site_removed(p, "school.site");

    assert_eq!(p.source_sites, vec!["farm.site".to_string()]);
    assert!(p.is_subscribed);
    assert_eq!(p.status, ProfileStatus::Active);
  }

  #[test]
  fn empty_sites_implies_unsubscribed() {
    // The emptiness invariant: every profile this rule produces satisfies
    // sites-empty ⇒ unsubscribed and deleted.
    let mut p = profile(&["a.site", "b.site", "c.site"]);
    for site in ["b.site", "a.site", "c.site"] {
      p = on_site_removed(p, site);
      if p.source_sites.is_empty() {
        assert!(!p.is_subscribed);
        assert_eq!(p.status, ProfileStatus::Deleted);
      }
    }
  }
}
