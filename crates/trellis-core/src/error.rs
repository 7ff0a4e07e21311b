//! Error types for `trellis-core`.
//!
//! The rules themselves never fail on well-formed input — skips and staleness
//! rejections are ordinary outcomes, not errors. The only failure paths are
//! precondition violations (an event missing its natural key) and
//! serialization.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("ingest event has no email address")]
  MissingEmail,

  #[error("ingest event has no source site")]
  MissingSite,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
