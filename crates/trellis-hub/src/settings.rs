//! Server configuration.
//!
//! Loaded from a TOML file plus `TRELLIS_`-prefixed environment overrides.
//! Spoke API keys are stored as argon2 PHC strings — generate them with
//! `trellis-hub --hash-key`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use trellis_api::{SpokeCredentials, SpokeRegistry};

/// Whether a spoke may currently deliver events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpokeStatus {
  Active,
  Revoked,
}

/// One spoke entry from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpokeConfig {
  pub site_name: String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub key_hash:  String,
  pub status:    SpokeStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// Path to the SQLite database file; `~` is expanded.
  pub store_path: PathBuf,
  #[serde(default)]
  pub spokes:     Vec<SpokeConfig>,
}

impl ServerConfig {
  pub fn spoke_registry(&self) -> SpokeRegistry {
    SpokeRegistry::new(
      self
        .spokes
        .iter()
        .map(|s| SpokeCredentials {
          site_name: s.site_name.clone(),
          key_hash:  s.key_hash.clone(),
          revoked:   s.status == SpokeStatus::Revoked,
        })
        .collect(),
    )
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn revoked_status_maps_into_the_registry() {
    let cfg = ServerConfig {
      host:       "127.0.0.1".into(),
      port:       8080,
      store_path: PathBuf::from(":memory:"),
      spokes:     vec![
        SpokeConfig {
          site_name: "farm.site".into(),
          key_hash:  "$argon2id$v=19$placeholder".into(),
          status:    SpokeStatus::Active,
        },
        SpokeConfig {
          site_name: "old.site".into(),
          key_hash:  "$argon2id$v=19$placeholder".into(),
          status:    SpokeStatus::Revoked,
        },
      ],
    };

    let registry = cfg.spoke_registry();
    assert!(!registry.find("farm.site").unwrap().revoked);
    assert!(registry.find("old.site").unwrap().revoked);
    assert!(registry.find("missing.site").is_none());
  }

  #[test]
  fn tilde_expansion_only_touches_a_leading_tilde() {
    // SAFETY: test-only env mutation.
    unsafe { std::env::set_var("HOME", "/home/demo") };
    assert_eq!(
      expand_tilde(Path::new("~/trellis.db")),
      PathBuf::from("/home/demo/trellis.db")
    );
    assert_eq!(
      expand_tilde(Path::new("/var/lib/trellis.db")),
      PathBuf::from("/var/lib/trellis.db")
    );
  }
}
