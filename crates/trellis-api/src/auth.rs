//! HTTP Basic-auth extractor for spoke-facing endpoints.
//!
//! A spoke authenticates as `site_name:api_key`; the key is verified against
//! an argon2 PHC hash from server configuration. The authenticated site name
//! is what the ingest handlers trust — never the site field inside a payload.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use trellis_core::store::HubStore;

use crate::{AppState, error::ApiError};

// ─── Registry ────────────────────────────────────────────────────────────────

/// One spoke's credentials, as loaded from server config.
#[derive(Debug, Clone)]
pub struct SpokeCredentials {
  pub site_name: String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub key_hash:  String,
  /// Revoked spokes stay listed so their requests are refused, not unknown.
  pub revoked:   bool,
}

/// All spokes this hub accepts deliveries from.
#[derive(Debug, Clone, Default)]
pub struct SpokeRegistry {
  spokes: Vec<SpokeCredentials>,
}

impl SpokeRegistry {
  pub fn new(spokes: Vec<SpokeCredentials>) -> Self { Self { spokes } }

  pub fn find(&self, site_name: &str) -> Option<&SpokeCredentials> {
    self.spokes.iter().find(|s| s.site_name == site_name)
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// Present in a handler's arguments means the request carried valid spoke
/// credentials. Holds the authenticated site name.
pub struct AuthenticatedSpoke(pub String);

/// Verify credentials directly from headers.
pub fn verify_spoke(
  headers: &HeaderMap,
  registry: &SpokeRegistry,
) -> Result<String, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds =
    std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (site_name, key) =
    creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let spoke = registry.find(site_name).ok_or(ApiError::Unauthorized)?;
  if spoke.revoked {
    tracing::warn!(site = %site_name, "revoked spoke refused");
    return Err(ApiError::Unauthorized);
  }

  let parsed_hash =
    PasswordHash::new(&spoke.key_hash).map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(key.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(site_name.to_owned())
}

impl<S> FromRequestParts<AppState<S>> for AuthenticatedSpoke
where
  S: HubStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let site = verify_spoke(&parts.headers, &state.spokes)?;
    Ok(AuthenticatedSpoke(site))
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::http::header;

  use super::*;

  fn hash(key: &str) -> String {
    use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(key.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  fn registry() -> SpokeRegistry {
    SpokeRegistry::new(vec![
      SpokeCredentials {
        site_name: "farm.site".into(),
        key_hash:  hash("farm-key"),
        revoked:   false,
      },
      SpokeCredentials {
        site_name: "old.site".into(),
        key_hash:  hash("old-key"),
        revoked:   true,
      },
    ])
  }

  fn basic_headers(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let value = format!("Basic {}", B64.encode(format!("{user}:{pass}")));
    headers
      .insert(header::AUTHORIZATION, value.parse().unwrap());
    headers
  }

  #[test]
  fn valid_credentials_yield_the_site_name() {
    let site =
      verify_spoke(&basic_headers("farm.site", "farm-key"), &registry())
        .unwrap();
    assert_eq!(site, "farm.site");
  }

  #[test]
  fn wrong_key_is_refused() {
    assert!(
      verify_spoke(&basic_headers("farm.site", "nope"), &registry()).is_err()
    );
  }

  #[test]
  fn unknown_site_is_refused() {
    assert!(
      verify_spoke(&basic_headers("who.site", "farm-key"), &registry())
        .is_err()
    );
  }

  #[test]
  fn revoked_spoke_is_refused_even_with_the_right_key() {
    assert!(
      verify_spoke(&basic_headers("old.site", "old-key"), &registry())
        .is_err()
    );
  }

  #[test]
  fn missing_or_mangled_header_is_refused() {
    assert!(verify_spoke(&HeaderMap::new(), &registry()).is_err());

    let mut headers = HeaderMap::new();
    headers
      .insert(header::AUTHORIZATION, "Bearer nope".parse().unwrap());
    assert!(verify_spoke(&headers, &registry()).is_err());

    let mut headers = HeaderMap::new();
    headers
      .insert(header::AUTHORIZATION, "Basic !!!not-base64".parse().unwrap());
    assert!(verify_spoke(&headers, &registry()).is_err());
  }
}
