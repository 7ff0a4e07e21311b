//! Handler for `/rejections` — dead-letter inspection.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use trellis_core::store::{HubStore, RejectedEvent};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /rejections[?limit=...]` — most recent rejections, newest first.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<RejectedEvent>>, ApiError>
where
  S: HubStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let rejections = state
    .store
    .list_rejections(params.limit.unwrap_or(50))
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(rejections))
}
