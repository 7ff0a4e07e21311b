//! Handler for `/hygiene/purge` — the retention cycle trigger.

use axum::{Json, extract::State};
use serde::Deserialize;
use trellis_core::store::{HubStore, PurgeReport};

use crate::{AppState, error::ApiError};

/// Events older than this many days are archived or dropped by default.
const DEFAULT_RETENTION_DAYS: u32 = 90;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PurgeBody {
  pub retention_days: Option<u32>,
}

/// `POST /hygiene/purge` — body: `{"retention_days": 90}` (optional).
pub async fn purge<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<PurgeBody>,
) -> Result<Json<PurgeReport>, ApiError>
where
  S: HubStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let days = body.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
  if days == 0 {
    return Err(ApiError::BadRequest(
      "retention_days must be at least 1".into(),
    ));
  }

  let report = state
    .store
    .purge_events(days)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(report))
}
