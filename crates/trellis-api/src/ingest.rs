//! Handlers for spoke-facing ingest endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/ingest` | Body: [`IngestEvent`]; spoke auth required |
//! | `POST` | `/ingest/removal` | Body: `{"email":"..."}`; spoke auth required |
//!
//! The authenticated spoke's site name overrides whatever `site` the payload
//! claims — a spoke can only ever speak for itself.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use trellis_core::{
  event::IngestEvent,
  store::{HubStore, IngestOutcome},
};

use crate::{AppState, auth::AuthenticatedSpoke, error::ApiError};

// ─── Ingest ──────────────────────────────────────────────────────────────────

/// `POST /ingest`
///
/// Skips and staleness rejections are 200s with the outcome in the body —
/// the spoke delivered correctly, the hub just declined to apply.
pub async fn ingest_event<S>(
  State(state): State<AppState<S>>,
  AuthenticatedSpoke(site): AuthenticatedSpoke,
  Json(mut event): Json<IngestEvent>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HubStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if event.event_id.trim().is_empty() {
    return Err(ApiError::BadRequest("event_id must not be empty".into()));
  }

  event.site = site;

  let outcome = state
    .store
    .ingest(event)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let status = match &outcome {
    IngestOutcome::Created { .. } => StatusCode::CREATED,
    _ => StatusCode::OK,
  };

  Ok((status, Json(outcome)))
}

// ─── Removal ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RemovalBody {
  pub email: String,
}

/// `POST /ingest/removal` — the DELETE-webhook path. Removes the
/// authenticated spoke's membership from the profile; the hub decides whether
/// that fires the hardened delete.
pub async fn remove_site<S>(
  State(state): State<AppState<S>>,
  AuthenticatedSpoke(site): AuthenticatedSpoke,
  Json(body): Json<RemovalBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HubStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if body.email.trim().is_empty() {
    return Err(ApiError::BadRequest("email must not be empty".into()));
  }

  let removal = state
    .store
    .remove_site(&body.email, &site)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no profile for {}", body.email))
    })?;

  Ok(Json(removal))
}
