//! The dispatch gate.
//!
//! Every sender (email, SMS, social) must call this immediately before each
//! send, against the freshly-loaded profile. Never cache the result: a
//! hardened delete or an operator pause can land between batching and
//! sending.

use crate::profile::{Profile, ProfileStatus};

/// Whether marketing may be dispatched to this profile right now.
pub fn may_dispatch(profile: &Profile) -> bool {
  profile.is_subscribed
    && profile.status == ProfileStatus::Active
    && !profile.marketing_pause
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::profile::ChurnRisk;

  fn subscribed_active() -> Profile {
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
      source_sites:         vec!["farm.site".into()],
      status:               ProfileStatus::Active,
      ltv:                  0.0,
      churn_risk:           ChurnRisk::Minimal,
      last_event_timestamp: None,
      metadata:             serde_json::Map::new(),
    }
  }

  #[test]
  fn subscribed_active_unpaused_may_dispatch() {
    assert!(may_dispatch(&subscribed_active()));
  }

  #[test]
  fn any_blocking_condition_closes_the_gate() {
    let mut unsubscribed = subscribed_active();
    unsubscribed.is_subscribed = false;
    assert!(!may_dispatch(&unsubscribed));

    let mut paused = subscribed_active();
    paused.marketing_pause = true;
    assert!(!may_dispatch(&paused));

    for status in [
      ProfileStatus::Archived,
      ProfileStatus::Banned,
      ProfileStatus::Deleted,
    ] {
      let mut p = subscribed_active();
      p.status = status;
      assert!(!may_dispatch(&p), "{status:?} must not dispatch");
    }
  }
}
