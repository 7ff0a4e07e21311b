//! Error types for `trellis-import`.
//!
//! Row-level problems are collected per row, not raised; these variants cover
//! batch-level failures only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("missing required column: {0}")]
  MissingColumn(&'static str),

  #[error("core error: {0}")]
  Core(#[from] trellis_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
