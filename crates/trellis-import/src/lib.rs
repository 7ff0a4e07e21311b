//! Batch import for the Trellis hub.
//!
//! Takes a CSV export (Mailchimp-style or a plain spreadsheet dump), parses
//! it into records, and runs the dedup audit — the dry-run preview that
//! classifies every row as create / merge / skip against the current profile
//! set before anything is committed. Committing is just replaying the
//! accepted rows through the normal ingest path.

pub mod audit;
pub mod error;
pub mod parse;

pub use error::{Error, Result};
