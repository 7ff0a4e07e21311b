//! JSON HTTP surface for the Trellis hub.
//!
//! Exposes an axum [`Router`] backed by any [`trellis_core::store::HubStore`].
//! Spoke-facing ingest endpoints authenticate with HTTP Basic (site name +
//! API key); admin read endpoints carry no auth — TLS and operator auth are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", trellis_api::api_router(state))
//! ```

pub mod auth;
pub mod error;
pub mod hygiene;
pub mod ingest;
pub mod profiles;
pub mod rejections;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use trellis_core::store::HubStore;

pub use auth::{SpokeCredentials, SpokeRegistry};
pub use error::ApiError;

/// Shared state handed to every handler.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub spokes: Arc<SpokeRegistry>,
}

// Derived Clone would require S: Clone; the fields are Arcs either way.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), spokes: self.spokes.clone() }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: HubStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Spoke-facing ingest
    .route("/ingest", post(ingest::ingest_event::<S>))
    .route("/ingest/removal", post(ingest::remove_site::<S>))
    // Profiles
    .route("/profiles", get(profiles::list::<S>))
    .route("/profiles/{id}", get(profiles::get_one::<S>))
    .route("/profiles/{id}/events", get(profiles::events::<S>))
    // Dead letter
    .route("/rejections", get(rejections::list::<S>))
    // Hygiene
    .route("/hygiene/purge", post(hygiene::purge::<S>))
    .with_state(state)
}
